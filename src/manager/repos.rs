//! Repository lifecycle: add, update, remove, list, show.
//!
//! Adding a repository clones it and discovers its versions; it never
//! triggers graph construction. Removal deletes both the on-disk
//! checkouts and every graph under the repository's URI prefix.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{CartographError, Result};
use crate::progress::ProgressObserver;
use crate::repo_store::{repository_metadata_path, RepositoryStore};
use crate::store::{schema, TripleStore};
use crate::validation::validate_identifier;
use crate::versions;

/// Repository processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoStatus {
    Ready,
    Processing,
    Error,
}

/// Persistent record of one tracked repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub org: String,
    pub name: String,
    pub url: String,
    /// Known version tags, newest first.
    pub releases: Vec<String>,
    pub status: RepoStatus,
    pub checkout_root: PathBuf,
    /// Versions found by the most recent update; not persisted.
    #[serde(skip)]
    pub newly_discovered: Vec<String>,
}

/// Repository lifecycle operations.
pub struct RepoManager<'a> {
    config: &'a Config,
    store: &'a TripleStore,
    repos: RepositoryStore,
}

impl<'a> RepoManager<'a> {
    pub fn new(config: &'a Config, store: &'a TripleStore) -> Self {
        RepoManager {
            config,
            store,
            repos: RepositoryStore::new(&config.storage_root, config.max_retries),
        }
    }

    /// Clone `org/repo` and discover its versions. Does not build any
    /// graphs.
    pub fn add(
        &self,
        org: &str,
        repo: &str,
        url: Option<&str>,
        observer: Option<&ProgressObserver>,
    ) -> Result<RepositoryRecord> {
        validate_identifier("organization", org)?;
        validate_identifier("repository", repo)?;

        let url = url
            .map(str::to_string)
            .unwrap_or_else(|| RepositoryStore::default_url(org, repo));
        let dir = self.repos.clone_repository(
            org,
            repo,
            &url,
            self.config.auth_token.as_deref(),
            observer,
        )?;

        let mut releases = self.repos.discover_versions(org, repo)?;
        versions::sort_descending(&mut releases);

        let record = RepositoryRecord {
            org: org.to_string(),
            name: repo.to_string(),
            url,
            releases,
            status: RepoStatus::Ready,
            checkout_root: dir,
            newly_discovered: Vec::new(),
        };
        self.persist(&record)?;
        info!(org, repo, releases = record.releases.len(), "repository added");
        Ok(record)
    }

    /// Fetch new refs and report newly available versions.
    pub fn update(&self, org: &str, repo: &str) -> Result<RepositoryRecord> {
        let mut record = self.show(org, repo)?;
        record.status = RepoStatus::Processing;
        self.persist(&record)?;

        let result = (|| -> Result<Vec<String>> {
            let new = self.repos.fetch_updates(org, repo)?;
            Ok(new)
        })();

        match result {
            Ok(new) => {
                let mut releases = self.repos.discover_versions(org, repo)?;
                versions::sort_descending(&mut releases);
                record.releases = releases;
                record.status = RepoStatus::Ready;
                record.newly_discovered = new;
                self.persist(&record)?;
                info!(
                    org,
                    repo,
                    new = record.newly_discovered.len(),
                    "repository updated"
                );
                Ok(record)
            }
            Err(e) => {
                record.status = RepoStatus::Error;
                if let Err(persist_err) = self.persist(&record) {
                    warn!(error = %persist_err, "could not persist error status");
                }
                Err(e)
            }
        }
    }

    /// Delete the on-disk checkouts and every graph whose URI prefix
    /// matches the repository.
    ///
    /// Destructive; requires `force` when confirmation is configured.
    pub fn remove(&self, org: &str, repo: &str, force: bool) -> Result<()> {
        self.confirm_destructive(force, &format!("remove repository {org}/{repo}"))?;
        validate_identifier("organization", org)?;
        validate_identifier("repository", repo)?;

        let prefix = format!("{}/", schema::repository_base(org, repo)?);
        let dropped = self.store.writer().drop_graphs_with_prefix(&prefix)?;
        self.repos.remove_repository(org, repo)?;
        info!(org, repo, graphs_dropped = dropped, "repository removed");
        Ok(())
    }

    /// Records of all tracked repositories, sorted by org/name.
    pub fn list(&self) -> Result<Vec<RepositoryRecord>> {
        let repos_dir = self.config.repos_dir();
        let mut records = Vec::new();
        let Ok(orgs) = fs::read_dir(&repos_dir) else {
            return Ok(records);
        };
        for org_entry in orgs.filter_map(|e| e.ok()) {
            let Ok(repos) = fs::read_dir(org_entry.path()) else {
                continue;
            };
            for repo_entry in repos.filter_map(|e| e.ok()) {
                let metadata = repository_metadata_path(&repo_entry.path());
                if let Ok(text) = fs::read_to_string(&metadata) {
                    match serde_json::from_str::<RepositoryRecord>(&text) {
                        Ok(record) => records.push(record),
                        Err(e) => warn!(path = %metadata.display(), error = %e, "skipping unreadable record"),
                    }
                }
            }
        }
        records.sort_by(|a, b| (&a.org, &a.name).cmp(&(&b.org, &b.name)));
        Ok(records)
    }

    pub fn show(&self, org: &str, repo: &str) -> Result<RepositoryRecord> {
        let dir = self.repos.repo_dir(org, repo)?;
        let metadata = repository_metadata_path(&dir);
        let text = fs::read_to_string(&metadata).map_err(|_| {
            CartographError::validation(format!(
                "{org}/{repo} is not tracked; run repo add first"
            ))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            CartographError::store(format!(
                "corrupt repository record {}: {e}",
                metadata.display()
            ))
        })
    }

    fn persist(&self, record: &RepositoryRecord) -> Result<()> {
        let dir = self.repos.repo_dir(&record.org, &record.name)?;
        fs::create_dir_all(&dir).map_err(|e| {
            CartographError::store(format!("cannot create {}: {e}", dir.display()))
        })?;
        let path = repository_metadata_path(&dir);
        let text = serde_json::to_string_pretty(record)
            .map_err(|e| CartographError::store(format!("serialize record: {e}")))?;
        fs::write(&path, text)
            .map_err(|e| CartographError::store(format!("cannot write {}: {e}", path.display())))
    }

    fn confirm_destructive(&self, force: bool, what: &str) -> Result<()> {
        if self.config.require_confirmation_for_destructive && !force {
            return Err(CartographError::validation(format!(
                "refusing to {what} without --force"
            )));
        }
        Ok(())
    }
}
