//! Graph construction: one `(repository, version)` ingestion.
//!
//! The builder parses the checkout, computes the stable-graph delta,
//! replaces the three version-scoped graphs, appends git provenance and
//! rewrites change events, all while holding the store's writer token so
//! readers never observe a half-applied ingestion. Stable identities are
//! widened by union, never rewritten.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::{Duration, Instant};

use oxigraph::model::Triple;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{CartographError, Result};
use crate::events::{diff_versions, ChangeEvent, ChangeKind, EntityFacts, VersionSnapshot};
use crate::git::{self, GitIntelligence};
use crate::ontology::{self, vocab, CallResolver, VersionContext};
use crate::parse::{self, ParseOptions, ParseOutcome};
use crate::progress::{report, CancellationToken, ProgressObserver, Stage};
use crate::store::{schema, QueryOutcome, TripleStore};
use crate::versions;

/// Outcome of one ingestion.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub org: String,
    pub repo: String,
    pub version: String,
    pub functions: usize,
    pub classes: usize,
    pub modules: usize,
    pub files_parsed: usize,
    pub files_skipped: usize,
    pub commits: usize,
    pub developers: usize,
    pub change_events: usize,
    pub triples_written: usize,
    pub warnings: Vec<String>,
    pub duration: Duration,
}

/// Orchestrates parsing, mapping, git analysis and change events into
/// the full graph set for one version.
pub struct GraphBuilder<'a> {
    store: &'a TripleStore,
    config: &'a Config,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(store: &'a TripleStore, config: &'a Config) -> Self {
        GraphBuilder { store, config }
    }

    /// Load the four shared ontology graphs. Idempotent.
    pub fn ensure_ontologies(&self) -> Result<()> {
        let writer = self.store.writer();
        for (graph_uri, triples) in ontology::ontology_graphs()? {
            writer.upsert_graph(&graph_uri, &triples)?;
        }
        Ok(())
    }

    /// Ingest `version` of `org/repo` from `checkout`.
    ///
    /// `git_dir` is the repository holding the full history; when absent
    /// the four git graphs are left untouched.
    pub fn build_version(
        &self,
        org: &str,
        repo: &str,
        version: &str,
        checkout: &Path,
        git_dir: Option<&Path>,
        observer: Option<&ProgressObserver>,
        cancel: &CancellationToken,
    ) -> Result<BuildReport> {
        let started = Instant::now();
        let deadline = self.config.processing_timeout();

        // 1. Parse the checkout.
        let options = ParseOptions {
            max_file_size_bytes: self.config.max_file_size_bytes(),
            max_concurrent_parsers: self.config.max_concurrent_parsers,
            per_file_timeout: self.config.parse_file_timeout(),
        };
        let outcome = parse::scan_checkout(checkout, &options, observer, cancel)?;
        check_deadline(started, deadline, "parsing")?;

        // 2. Mint URIs and map entities.
        report(observer, 30.0, Stage::Mapping, "mapping entities to triples");
        let ctx = VersionContext { org, repo, version };
        let resolver = CallResolver::from_functions(ctx, &outcome.functions)?;

        let mut stable_by_file: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut mapped = Vec::new();
        for function in &outcome.functions {
            let m = ontology::map_function(ctx, function, &resolver)?;
            stable_by_file
                .entry(function.file.clone())
                .or_default()
                .push(m.stable_uri.clone());
            mapped.push(m);
        }
        for class in &outcome.classes {
            let m = ontology::map_class(ctx, class)?;
            stable_by_file
                .entry(class.file.clone())
                .or_default()
                .push(m.stable_uri.clone());
            mapped.push(m);
        }

        let mut files_triples = Vec::new();
        for module in &outcome.modules {
            files_triples.extend(ontology::map_module(ctx, module)?);
        }
        files_triples.extend(ontology::map_file_records(
            ctx,
            &outcome.modules,
            &outcome.functions,
        )?);

        let meta_triples = ontology::map_build_metadata(
            ctx,
            outcome.functions.len(),
            outcome.classes.len(),
            outcome.modules.len(),
            outcome.files_parsed,
        )?;

        // 3. Stable delta against the entities already known.
        let stable_graph = schema::stable_functions_graph(org, repo)?;
        let known_stable = self.known_stable_uris(&stable_graph)?;
        let mut stable_delta: Vec<Triple> = Vec::new();
        let mut implementation_triples: Vec<Triple> = Vec::new();
        for m in mapped {
            if known_stable.contains(&m.stable_uri) {
                stable_delta.extend(m.stable_widen);
            } else {
                stable_delta.extend(m.stable_intro);
            }
            implementation_triples.extend(m.implementation);
        }

        // 4. Neighbouring versions for change events.
        let ingested = self.ingested_versions(org, repo)?;
        let others: Vec<String> = ingested.iter().filter(|v| *v != version).cloned().collect();
        let lower = versions::nearest_lower(version, &others).cloned();
        let higher = versions::nearest_higher(version, &others).cloned();
        let current_snapshot = snapshot_from_parse(ctx, &outcome)?;
        let lower_snapshot = lower
            .as_deref()
            .map(|v| self.load_version_snapshot(org, repo, v))
            .transpose()?;
        let higher_snapshot = higher
            .as_deref()
            .map(|v| self.load_version_snapshot(org, repo, v))
            .transpose()?;
        check_deadline(started, deadline, "change-event preparation")?;

        // 5. Git intelligence (CPU/IO heavy part runs before the writer
        // token is taken).
        let intelligence = match git_dir {
            Some(dir) => {
                report(observer, 50.0, Stage::GitAnalysis, "reading history");
                Some(git::analyze_repository(dir, cancel)?)
            }
            None => None,
        };
        check_deadline(started, deadline, "git analysis")?;
        cancel.checkpoint(Stage::Writing)?;

        // 6. Apply everything under the writer token. Stable widening is
        // committed before the version-scoped replacement, so a reader
        // that sees the new implementations also sees the updated stable
        // set.
        report(observer, 70.0, Stage::Writing, "writing graphs");
        let implementations_graph = schema::implementations_graph(org, repo, version)?;
        let files_graph = schema::files_graph(org, repo, version)?;
        let meta_graph = schema::meta_graph(org, repo, version)?;

        // Change events incident on this version are regenerated;
        // everything else in the events graph is preserved.
        let attribute = |file: &str| -> Option<String> {
            intelligence
                .as_ref()
                .and_then(|intel| intel.latest_commit_touching(file))
                .map(|c| c.sha.clone())
        };
        let mut change_events: Vec<ChangeEvent> = Vec::new();
        if let Some(lower_snapshot) = &lower_snapshot {
            change_events.extend(diff_versions(lower_snapshot, &current_snapshot, &attribute));
        }
        if let Some(higher_snapshot) = &higher_snapshot {
            change_events.extend(diff_versions(&current_snapshot, higher_snapshot, &attribute));
        }

        let write_result = (|| -> Result<usize> {
            let mut written = 0usize;
            let writer = self.store.writer();

            written += writer.append_to_graph(&stable_graph, &stable_delta)?;
            written += writer.upsert_graph(&implementations_graph, &implementation_triples)?;
            written += writer.upsert_graph(&files_graph, &files_triples)?;
            written += writer.upsert_graph(&meta_graph, &meta_triples)?;

            if let Some(intelligence) = &intelligence {
                written +=
                    self.write_git_graphs(&writer, org, repo, intelligence, &stable_by_file)?;
            }

            written += self.rewrite_events_graph(&writer, org, repo, version, &change_events)?;
            written += self.rebuild_evolution_graphs(&writer, org, repo)?;
            Ok(written)
        })();

        let triples_written = match write_result {
            Ok(written) => written,
            Err(e) => {
                // Failed mid-build: no partial version-scoped graph may
                // survive.
                let writer = self.store.writer();
                let _ = writer.drop_graph(&implementations_graph);
                let _ = writer.drop_graph(&files_graph);
                let _ = writer.drop_graph(&meta_graph);
                return Err(e);
            }
        };

        let report_out = BuildReport {
            org: org.to_string(),
            repo: repo.to_string(),
            version: version.to_string(),
            functions: outcome.functions.len(),
            classes: outcome.classes.len(),
            modules: outcome.modules.len(),
            files_parsed: outcome.files_parsed,
            files_skipped: outcome.files_skipped,
            commits: intelligence.as_ref().map_or(0, |i| i.commits.len()),
            developers: intelligence.as_ref().map_or(0, |i| i.developers.len()),
            change_events: change_events.len(),
            triples_written,
            warnings: outcome.warnings.iter().map(|w| w.describe()).collect(),
            duration: started.elapsed(),
        };
        info!(
            org,
            repo,
            version,
            functions = report_out.functions,
            triples = report_out.triples_written,
            "version ingested"
        );
        report(observer, 100.0, Stage::Writing, "ingestion complete");
        Ok(report_out)
    }

    /// Stable URIs already present in the stable graph.
    fn known_stable_uris(&self, stable_graph: &str) -> Result<BTreeSet<String>> {
        let mut known = BTreeSet::new();
        for triple in self.store.graph_triples(stable_graph)? {
            if triple.predicate.as_str() == vocab::RDF_TYPE {
                known.insert(subject_uri(&triple));
            }
        }
        Ok(known)
    }

    /// Versions with an implementations graph in the store.
    pub fn ingested_versions(&self, org: &str, repo: &str) -> Result<Vec<String>> {
        let root = schema::implementations_root(org, repo)?;
        let mut out = Vec::new();
        for graph in self.store.list_graphs(Some(&root))? {
            if let Some(version) = schema::version_from_graph_uri(&graph, &root) {
                out.push(version);
            }
        }
        versions::sort_ascending(&mut out);
        Ok(out)
    }

    /// Snapshot of one already ingested version, read back from the
    /// store.
    pub fn load_version_snapshot(
        &self,
        org: &str,
        repo: &str,
        version: &str,
    ) -> Result<VersionSnapshot> {
        let graph = schema::implementations_graph(org, repo, version)?;
        let stable_graph = schema::stable_functions_graph(org, repo)?;
        let sparql = format!(
            "SELECT ?stable ?qname ?sig ?hash ?file ?start ?end WHERE {{ \
               GRAPH <{graph}> {{ \
                 ?impl <{sig_p}> ?sig ; <{hash_p}> ?hash ; <{file_p}> ?file ; \
                       <{start_p}> ?start ; <{end_p}> ?end . \
                 {{ ?impl <{impl_f}> ?stable }} UNION {{ ?impl <{impl_c}> ?stable }} \
               }} \
               GRAPH <{stable_graph}> {{ ?stable <{qname_p}> ?qname }} \
             }}",
            sig_p = vocab::woc::HAS_SIGNATURE,
            hash_p = vocab::woc::BODY_HASH,
            file_p = vocab::woc::DEFINED_IN_FILE,
            start_p = vocab::woc::START_LINE,
            end_p = vocab::woc::END_LINE,
            impl_f = vocab::woc::IMPLEMENTS_FUNCTION,
            impl_c = vocab::woc::IMPLEMENTS_CLASS,
            qname_p = vocab::woc::CANONICAL_NAME,
        );
        let mut snapshot = VersionSnapshot::new(version);
        match self.store.query(&sparql, self.config.query_timeout())? {
            QueryOutcome::Rows(rows) => {
                let col = |name: &str| rows.columns.iter().position(|c| c == name);
                let (stable_i, qname_i, sig_i, hash_i, file_i, start_i, end_i) = (
                    col("stable"),
                    col("qname"),
                    col("sig"),
                    col("hash"),
                    col("file"),
                    col("start"),
                    col("end"),
                );
                for row in rows.rows {
                    let get = |i: Option<usize>| -> String {
                        i.and_then(|i| row.get(i).cloned().flatten()).unwrap_or_default()
                    };
                    let stable = get(stable_i);
                    if stable.is_empty() {
                        continue;
                    }
                    snapshot.entities.insert(
                        stable,
                        EntityFacts {
                            qualified_name: get(qname_i),
                            signature: get(sig_i),
                            body_hash: get(hash_i),
                            file: get(file_i),
                            start_line: get(start_i).parse().unwrap_or(0),
                            end_line: get(end_i).parse().unwrap_or(0),
                        },
                    );
                }
            }
            _ => {
                return Err(CartographError::store(
                    "snapshot query returned a non-tabular result".to_string(),
                ))
            }
        }
        Ok(snapshot)
    }

    fn write_git_graphs(
        &self,
        writer: &crate::store::StoreWriter<'_>,
        org: &str,
        repo: &str,
        intelligence: &GitIntelligence,
        stable_by_file: &BTreeMap<String, Vec<String>>,
    ) -> Result<usize> {
        let mut written = 0usize;

        // Commits are immutable and deduplicate by sha, so appending the
        // same history twice is a no-op.
        let mut commit_triples = Vec::new();
        for commit in &intelligence.commits {
            commit_triples.extend(ontology::map_commit(org, repo, commit)?);
            commit_triples.extend(ontology::map_commit_entity_links(
                org,
                repo,
                commit,
                stable_by_file,
            )?);
        }
        written += writer.append_to_graph(&schema::git_commits_graph(org, repo)?, &commit_triples)?;

        // Developer records are aggregates; they are replaced, not
        // appended, so commit counts stay correct.
        let mut developer_triples = Vec::new();
        for developer in &intelligence.developers {
            developer_triples.extend(ontology::map_developer(org, repo, developer)?);
        }
        written +=
            writer.upsert_graph(&schema::git_developers_graph(org, repo)?, &developer_triples)?;

        let mut branch_triples = Vec::new();
        for branch in &intelligence.branches {
            branch_triples.extend(ontology::map_branch(org, repo, branch)?);
        }
        written += writer.upsert_graph(&schema::git_branches_graph(org, repo)?, &branch_triples)?;

        let mut tag_triples = Vec::new();
        for tag in &intelligence.tags {
            tag_triples.extend(ontology::map_tag(org, repo, tag)?);
        }
        written += writer.upsert_graph(&schema::git_tags_graph(org, repo)?, &tag_triples)?;

        Ok(written)
    }

    /// Replace the events graph with: existing events not incident on
    /// `version`, plus `new_events`.
    pub fn rewrite_events_graph(
        &self,
        writer: &crate::store::StoreWriter<'_>,
        org: &str,
        repo: &str,
        version: &str,
        new_events: &[ChangeEvent],
    ) -> Result<usize> {
        let events_graph = schema::events_graph(org, repo)?;
        let existing = self.store.graph_triples(&events_graph)?;

        // Subjects incident on `version`: any event with fromVersion or
        // toVersion equal to it.
        let mut incident: BTreeSet<String> = BTreeSet::new();
        for triple in &existing {
            let predicate = triple.predicate.as_str();
            if predicate == vocab::abc::FROM_VERSION || predicate == vocab::abc::TO_VERSION {
                if literal_value(triple) == Some(version) {
                    incident.insert(subject_uri(triple));
                }
            }
        }

        let mut triples: Vec<Triple> = existing
            .into_iter()
            .filter(|t| !incident.contains(&subject_uri(t)))
            .collect();
        for event in new_events {
            triples.extend(ontology::map_change_event(org, repo, event)?);
        }
        debug!(
            graph = %events_graph,
            dropped_subjects = incident.len(),
            regenerated = new_events.len(),
            "events graph rewritten"
        );
        writer.upsert_graph(&events_graph, &triples)
    }

    /// Recompute the three evolution graphs from current store state.
    ///
    /// Derived data: rebuilding keeps them consistent under nuclear
    /// rebuilds and version removal without selective deletion.
    pub fn rebuild_evolution_graphs(
        &self,
        writer: &crate::store::StoreWriter<'_>,
        org: &str,
        repo: &str,
    ) -> Result<usize> {
        let stable_graph = schema::stable_functions_graph(org, repo)?;
        let mut function_names: Vec<String> = Vec::new();
        let mut is_function: BTreeSet<String> = BTreeSet::new();
        let triples = self.store.graph_triples(&stable_graph)?;
        for triple in &triples {
            if triple.predicate.as_str() == vocab::RDF_TYPE
                && object_uri(triple) == vocab::woc::FUNCTION
            {
                is_function.insert(subject_uri(triple));
            }
        }
        for triple in &triples {
            if triple.predicate.as_str() == vocab::woc::CANONICAL_NAME
                && is_function.contains(&subject_uri(triple))
            {
                if let Some(qname) = literal_value(triple) {
                    let name = qname.rsplit('.').next().unwrap_or(qname);
                    function_names.push(name.to_string());
                }
            }
        }
        function_names.sort();

        let mut written = 0usize;

        // statistics: visibility split over stable functions
        let stats_graph = schema::evolution_statistics_graph(org, repo)?;
        let stats_uri = format!("{stats_graph}#stats");
        let public = function_names.iter().filter(|n| !n.starts_with('_')).count();
        let private = function_names.len() - public;
        let stats = vec![
            uri_triple(&stats_uri, vocab::RDF_TYPE, vocab::evo::STATISTICS)?,
            int_triple(&stats_uri, vocab::evo::TOTAL_FUNCTIONS, function_names.len() as i64)?,
            int_triple(&stats_uri, vocab::evo::PUBLIC_FUNCTIONS, public as i64)?,
            int_triple(&stats_uri, vocab::evo::PRIVATE_FUNCTIONS, private as i64)?,
        ];
        written += writer.upsert_graph(&stats_graph, &stats)?;

        // patterns: shared name prefixes appearing more than once
        let patterns_graph = schema::evolution_patterns_graph(org, repo)?;
        let mut prefix_counts: BTreeMap<String, usize> = BTreeMap::new();
        for name in &function_names {
            if let Some((prefix, _)) = name.split_once('_') {
                if !prefix.is_empty() {
                    *prefix_counts.entry(prefix.to_string()).or_default() += 1;
                }
            }
        }
        let mut pattern_triples = Vec::new();
        for (prefix, count) in prefix_counts.iter().filter(|(_, c)| **c > 1) {
            let uri = format!(
                "{patterns_graph}#pattern_{}",
                schema::encode_component(prefix)?
            );
            pattern_triples.push(uri_triple(&uri, vocab::RDF_TYPE, vocab::evo::PATTERN)?);
            pattern_triples.push(literal_triple(&uri, vocab::evo::PATTERN_NAME, prefix)?);
            pattern_triples.push(int_triple(&uri, vocab::evo::FREQUENCY, *count as i64)?);
        }
        written += writer.upsert_graph(&patterns_graph, &pattern_triples)?;

        // analysis: per ingested version, entity counts
        let analysis_graph = schema::evolution_analysis_graph(org, repo)?;
        let mut analysis_triples = Vec::new();
        for version in self.ingested_versions(org, repo)? {
            let graph = schema::implementations_graph(org, repo, &version)?;
            let mut functions = 0i64;
            let mut classes = 0i64;
            for triple in self.store.graph_triples(&graph)? {
                match triple.predicate.as_str() {
                    p if p == vocab::woc::IMPLEMENTS_FUNCTION => functions += 1,
                    p if p == vocab::woc::IMPLEMENTS_CLASS => classes += 1,
                    _ => {}
                }
            }
            let uri = format!(
                "{analysis_graph}#{}",
                schema::encode_component(&version)?
            );
            analysis_triples.push(uri_triple(&uri, vocab::RDF_TYPE, vocab::evo::ANALYSIS)?);
            analysis_triples.push(literal_triple(&uri, vocab::evo::VERSION, &version)?);
            analysis_triples.push(int_triple(&uri, vocab::evo::FUNCTION_COUNT, functions)?);
            analysis_triples.push(int_triple(&uri, vocab::evo::CLASS_COUNT, classes)?);
        }
        written += writer.upsert_graph(&analysis_graph, &analysis_triples)?;

        Ok(written)
    }
}

/// Snapshot of the version being ingested, straight from the parse.
pub fn snapshot_from_parse(
    ctx: VersionContext<'_>,
    outcome: &ParseOutcome,
) -> Result<VersionSnapshot> {
    let mut snapshot = VersionSnapshot::new(ctx.version);
    for function in &outcome.functions {
        let stable = schema::stable_function_uri(ctx.org, ctx.repo, &function.qualified_name)?;
        snapshot.entities.insert(
            stable,
            EntityFacts {
                qualified_name: function.qualified_name.clone(),
                signature: function.signature.clone(),
                body_hash: function.body_hash.clone(),
                file: function.file.clone(),
                start_line: function.start_line,
                end_line: function.end_line,
            },
        );
    }
    for class in &outcome.classes {
        let stable = schema::stable_class_uri(ctx.org, ctx.repo, &class.qualified_name)?;
        snapshot.entities.insert(
            stable,
            EntityFacts {
                qualified_name: class.qualified_name.clone(),
                signature: class.signature_text(),
                body_hash: class.content_hash(),
                file: class.file.clone(),
                start_line: class.start_line,
                end_line: class.end_line,
            },
        );
    }
    Ok(snapshot)
}

/// Events loaded back from the events graph, for reporting and tests.
pub fn load_events(store: &TripleStore, org: &str, repo: &str) -> Result<Vec<ChangeEvent>> {
    let events_graph = schema::events_graph(org, repo)?;
    let triples = store.graph_triples(&events_graph)?;

    let mut by_subject: BTreeMap<String, ChangeEvent> = BTreeMap::new();
    for triple in &triples {
        let subject = subject_uri(triple);
        let entry = by_subject.entry(subject).or_insert_with(|| ChangeEvent {
            stable_uri: String::new(),
            entity_qualified_name: String::new(),
            from_version: String::new(),
            to_version: String::new(),
            kind: ChangeKind::Added,
            commit_sha: None,
        });
        match triple.predicate.as_str() {
            p if p == vocab::abc::KIND => {
                if let Some(kind) = literal_value(triple).and_then(ChangeKind::parse) {
                    entry.kind = kind;
                }
            }
            p if p == vocab::abc::FROM_VERSION => {
                entry.from_version = literal_value(triple).unwrap_or_default().to_string();
            }
            p if p == vocab::abc::TO_VERSION => {
                entry.to_version = literal_value(triple).unwrap_or_default().to_string();
            }
            p if p == vocab::abc::AFFECTS => {
                entry.stable_uri = object_uri(triple);
            }
            p if p == vocab::abc::INTRODUCED_BY => {
                entry.commit_sha = object_uri(triple)
                    .rsplit('/')
                    .next()
                    .map(|s| s.to_string());
            }
            _ => {}
        }
    }
    Ok(by_subject.into_values().collect())
}

fn check_deadline(started: Instant, deadline: Duration, stage: &str) -> Result<()> {
    let elapsed = started.elapsed();
    if elapsed > deadline {
        return Err(CartographError::timeout(
            format!("ingestion exceeded its deadline during {stage}"),
            elapsed,
        ));
    }
    Ok(())
}

fn subject_uri(triple: &Triple) -> String {
    match &triple.subject {
        oxigraph::model::Subject::NamedNode(n) => n.as_str().to_string(),
        other => other.to_string(),
    }
}

fn object_uri(triple: &Triple) -> String {
    match &triple.object {
        oxigraph::model::Term::NamedNode(n) => n.as_str().to_string(),
        other => other.to_string(),
    }
}

fn literal_value(triple: &Triple) -> Option<&str> {
    match &triple.object {
        oxigraph::model::Term::Literal(l) => Some(l.value()),
        _ => None,
    }
}

fn uri_triple(s: &str, p: &str, o: &str) -> Result<Triple> {
    Ok(Triple::new(
        oxigraph::model::NamedNode::new(s)
            .map_err(|e| CartographError::validation(format!("invalid IRI {s:?}: {e}")))?,
        oxigraph::model::NamedNode::new(p)
            .map_err(|e| CartographError::validation(format!("invalid IRI {p:?}: {e}")))?,
        oxigraph::model::NamedNode::new(o)
            .map_err(|e| CartographError::validation(format!("invalid IRI {o:?}: {e}")))?,
    ))
}

fn literal_triple(s: &str, p: &str, value: &str) -> Result<Triple> {
    Ok(Triple::new(
        oxigraph::model::NamedNode::new(s)
            .map_err(|e| CartographError::validation(format!("invalid IRI {s:?}: {e}")))?,
        oxigraph::model::NamedNode::new(p)
            .map_err(|e| CartographError::validation(format!("invalid IRI {p:?}: {e}")))?,
        oxigraph::model::Literal::new_simple_literal(value),
    ))
}

fn int_triple(s: &str, p: &str, value: i64) -> Result<Triple> {
    Ok(Triple::new(
        oxigraph::model::NamedNode::new(s)
            .map_err(|e| CartographError::validation(format!("invalid IRI {s:?}: {e}")))?,
        oxigraph::model::NamedNode::new(p)
            .map_err(|e| CartographError::validation(format!("invalid IRI {p:?}: {e}")))?,
        oxigraph::model::Literal::from(value),
    ))
}
