//! Graph lifecycle: add, update (nuclear rebuild), remove, list, show.
//!
//! A `(repository, version)` graph unit moves `absent -> building ->
//! ready`; a failed build drops any partially written version-scoped
//! graph and returns to `absent`. The nuclear rebuild replaces all
//! version-scoped data without disturbing stable identities or
//! cross-version references.

use std::collections::{BTreeMap, BTreeSet};

use oxigraph::model::Triple;
use serde::Serialize;
use tracing::info;

use crate::builder::{BuildReport, GraphBuilder};
use crate::config::Config;
use crate::error::{CartographError, Result};
use crate::ontology::vocab;
use crate::progress::{CancellationToken, ProgressObserver};
use crate::repo_store::RepositoryStore;
use crate::store::{schema, TripleStore};
use crate::validation::{validate_identifier, validate_version_tag};

/// Summary of one named graph.
#[derive(Debug, Clone, Serialize)]
pub struct GraphInfo {
    pub graph_uri: String,
    pub triple_count: usize,
    /// Set for version-scoped graphs.
    pub version: Option<String>,
}

/// Graph lifecycle operations.
pub struct GraphManager<'a> {
    config: &'a Config,
    store: &'a TripleStore,
    repos: RepositoryStore,
}

impl<'a> GraphManager<'a> {
    pub fn new(config: &'a Config, store: &'a TripleStore) -> Self {
        GraphManager {
            config,
            store,
            repos: RepositoryStore::new(&config.storage_root, config.max_retries),
        }
    }

    /// Build the graph set for one version; the latest discovered when
    /// `version` is omitted. Fails if graphs already exist, unless
    /// `force`.
    pub fn add(
        &self,
        org: &str,
        repo: &str,
        version: Option<&str>,
        force: bool,
        observer: Option<&ProgressObserver>,
        cancel: &CancellationToken,
    ) -> Result<BuildReport> {
        validate_identifier("organization", org)?;
        validate_identifier("repository", repo)?;

        let version = match version {
            Some(v) => {
                validate_version_tag(v)?;
                v.to_string()
            }
            None => self
                .repos
                .discover_versions(org, repo)?
                .pop()
                .ok_or_else(|| {
                    CartographError::validation(format!(
                        "{org}/{repo} has no discovered versions"
                    ))
                })?,
        };

        let implementations = schema::implementations_graph(org, repo, &version)?;
        if !force && self.store.graph_exists(&implementations)? {
            return Err(CartographError::validation(format!(
                "graphs for {org}/{repo} {version} already exist; pass --force to rebuild"
            )));
        }

        self.build(org, repo, &version, observer, cancel)
    }

    /// Nuclear rebuild of one version: drop the version-scoped graphs,
    /// rebuild them from the current checkout and regenerate the change
    /// events incident on the version. Stable triples are updated by
    /// union, never rewritten.
    pub fn update(
        &self,
        org: &str,
        repo: &str,
        version: &str,
        observer: Option<&ProgressObserver>,
        cancel: &CancellationToken,
    ) -> Result<BuildReport> {
        validate_identifier("organization", org)?;
        validate_identifier("repository", repo)?;
        validate_version_tag(version)?;

        let implementations = schema::implementations_graph(org, repo, version)?;
        if !self.store.graph_exists(&implementations)? {
            return Err(CartographError::validation(format!(
                "no graphs exist for {org}/{repo} {version}; run graph add"
            )));
        }
        self.build(org, repo, version, observer, cancel)
    }

    /// Drop graphs.
    ///
    /// With a version: drop only the version-scoped graphs, rewrite each
    /// affected stable entity's version set to exclude it (removing
    /// entities whose set becomes empty), and drop change events
    /// incident on the version. Without a version: drop every graph of
    /// the repository, stable included.
    pub fn remove(
        &self,
        org: &str,
        repo: &str,
        version: Option<&str>,
        force: bool,
    ) -> Result<()> {
        validate_identifier("organization", org)?;
        validate_identifier("repository", repo)?;
        if self.config.require_confirmation_for_destructive && !force {
            return Err(CartographError::validation(format!(
                "refusing to remove graphs for {org}/{repo} without --force"
            )));
        }

        match version {
            Some(version) => {
                validate_version_tag(version)?;
                self.remove_version(org, repo, version)
            }
            None => {
                let prefix = format!("{}/", schema::repository_base(org, repo)?);
                let dropped = self.store.writer().drop_graphs_with_prefix(&prefix)?;
                info!(org, repo, graphs = dropped, "all graphs removed");
                Ok(())
            }
        }
    }

    /// Summaries of graphs, optionally narrowed to an org or repo.
    pub fn list(&self, org: Option<&str>, repo: Option<&str>) -> Result<Vec<GraphInfo>> {
        let prefix = match (org, repo) {
            (Some(org), Some(repo)) => format!("{}/", schema::repository_base(org, repo)?),
            (Some(org), None) => {
                validate_identifier("organization", org)?;
                format!("{}/repo/{}/", schema::BASE_URI, schema::encode_component(org)?)
            }
            _ => format!("{}/repo/", schema::BASE_URI),
        };
        let mut infos = Vec::new();
        for graph_uri in self.store.list_graphs(Some(&prefix))? {
            infos.push(self.describe(&graph_uri)?);
        }
        Ok(infos)
    }

    /// Graph summaries for one repository; narrowed to one version when
    /// given.
    pub fn show(&self, org: &str, repo: &str, version: Option<&str>) -> Result<Vec<GraphInfo>> {
        let mut infos = self.list(Some(org), Some(repo))?;
        if let Some(version) = version {
            validate_version_tag(version)?;
            infos.retain(|info| info.version.as_deref() == Some(version));
        }
        if infos.is_empty() {
            return Err(CartographError::validation(format!(
                "no graphs found for {org}/{repo}"
            )));
        }
        Ok(infos)
    }

    /// Versions currently ingested for a repository.
    pub fn ingested_versions(&self, org: &str, repo: &str) -> Result<Vec<String>> {
        GraphBuilder::new(self.store, self.config).ingested_versions(org, repo)
    }

    fn build(
        &self,
        org: &str,
        repo: &str,
        version: &str,
        observer: Option<&ProgressObserver>,
        cancel: &CancellationToken,
    ) -> Result<BuildReport> {
        // the checkout directory is owned exclusively by this ingestion
        let _lock = self.repos.acquire_ingest_lock(org, repo)?;
        let checkout = self.repos.checkout_version(org, repo, version)?;
        let git_dir = self.repos.repo_dir(org, repo)?;

        let builder = GraphBuilder::new(self.store, self.config);
        builder.ensure_ontologies()?;
        builder.build_version(
            org,
            repo,
            version,
            &checkout,
            Some(&git_dir),
            observer,
            cancel,
        )
    }

    fn remove_version(&self, org: &str, repo: &str, version: &str) -> Result<()> {
        let stable_graph = schema::stable_functions_graph(org, repo)?;
        let stable_triples = self.store.graph_triples(&stable_graph)?;

        // membership triples to drop, and per-subject remaining versions
        let mut remaining: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for triple in &stable_triples {
            if triple.predicate.as_str() == vocab::woc::EXISTS_IN_VERSION {
                if let oxigraph::model::Term::Literal(l) = &triple.object {
                    remaining
                        .entry(subject_of(triple))
                        .or_default()
                        .insert(l.value().to_string());
                }
            }
        }
        let mut orphaned: BTreeSet<String> = BTreeSet::new();
        for (subject, versions) in &remaining {
            if versions.contains(version) && versions.len() == 1 {
                orphaned.insert(subject.clone());
            }
        }

        let rewritten: Vec<Triple> = stable_triples
            .into_iter()
            .filter(|t| {
                let subject = subject_of(t);
                if orphaned.contains(&subject) {
                    return false;
                }
                // keep everything except this version's membership
                !(t.predicate.as_str() == vocab::woc::EXISTS_IN_VERSION
                    && matches!(&t.object, oxigraph::model::Term::Literal(l) if l.value() == version))
            })
            .collect();

        let builder = GraphBuilder::new(self.store, self.config);
        let writer = self.store.writer();
        writer.drop_graph(&schema::implementations_graph(org, repo, version)?)?;
        writer.drop_graph(&schema::files_graph(org, repo, version)?)?;
        writer.drop_graph(&schema::meta_graph(org, repo, version)?)?;
        writer.upsert_graph(&stable_graph, &rewritten)?;
        builder.rewrite_events_graph(&writer, org, repo, version, &[])?;
        builder.rebuild_evolution_graphs(&writer, org, repo)?;
        drop(writer);

        info!(
            org,
            repo,
            version,
            orphaned_entities = orphaned.len(),
            "version graphs removed"
        );
        Ok(())
    }

    fn describe(&self, graph_uri: &str) -> Result<GraphInfo> {
        let version = ["/functions/implementations", "/files", "/meta"]
            .iter()
            .find_map(|segment| {
                let idx = graph_uri.rfind(segment)?;
                let prefix = &graph_uri[..idx + segment.len()];
                schema::version_from_graph_uri(graph_uri, prefix)
            });
        Ok(GraphInfo {
            graph_uri: graph_uri.to_string(),
            triple_count: self.store.triple_count(graph_uri)?,
            version,
        })
    }
}

fn subject_of(triple: &Triple) -> String {
    match &triple.subject {
        oxigraph::model::Subject::NamedNode(n) => n.as_str().to_string(),
        other => other.to_string(),
    }
}
