//! On-disk layout of source checkouts.
//!
//! ```text
//! {root}/repos/{org}/{repo}/.git         clone with full history
//! {root}/repos/{org}/{repo}/{version}/   working tree of that tag
//! ```
//!
//! Every path is validated against the storage root before use; a
//! resolved path escaping it is a security error. Checkouts for one
//! `(repo, version)` are owned exclusively by the ingestion in progress,
//! enforced by an advisory lock in the repository directory.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;
use tracing::{debug, info, warn};

use crate::error::{CartographError, Result};
use crate::git::run_git;
use crate::progress::{report, ProgressObserver, Stage};
use crate::validation::{validate_identifier, validate_path_within_root, validate_version_tag};
use crate::versions;

/// Backoff base for remote fetch retries.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// Manages clones and per-version working trees under the storage root.
pub struct RepositoryStore {
    storage_root: PathBuf,
    max_retries: u32,
}

/// Advisory lock over one repository's checkouts; released on drop.
pub struct IngestLock {
    file: File,
    path: PathBuf,
}

impl Drop for IngestLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        let _ = fs::remove_file(&self.path);
    }
}

impl RepositoryStore {
    pub fn new(storage_root: impl Into<PathBuf>, max_retries: u32) -> Self {
        RepositoryStore {
            storage_root: storage_root.into(),
            max_retries,
        }
    }

    /// `{root}/repos/{org}/{repo}`, identifiers validated.
    pub fn repo_dir(&self, org: &str, repo: &str) -> Result<PathBuf> {
        validate_identifier("organization", org)?;
        validate_identifier("repository", repo)?;
        Ok(self.storage_root.join("repos").join(org).join(repo))
    }

    /// `{root}/repos/{org}/{repo}/{version}`, tag validated.
    pub fn checkout_dir(&self, org: &str, repo: &str, version: &str) -> Result<PathBuf> {
        validate_version_tag(version)?;
        Ok(self.repo_dir(org, repo)?.join(version))
    }

    /// Default clone URL for an org/repo pair.
    pub fn default_url(org: &str, repo: &str) -> String {
        format!("https://github.com/{org}/{repo}.git")
    }

    /// Clone a repository (once). A bearer token, when given, is woven
    /// into https URLs for private fetches and never logged.
    pub fn clone_repository(
        &self,
        org: &str,
        repo: &str,
        url: &str,
        auth_token: Option<&str>,
        observer: Option<&ProgressObserver>,
    ) -> Result<PathBuf> {
        let dir = self.repo_dir(org, repo)?;
        if dir.join(".git").exists() {
            debug!(org, repo, "repository already cloned");
            return Ok(dir);
        }
        if let Some(parent) = dir.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CartographError::git(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let fetch_url = authenticated_url(url, auth_token);
        report(observer, 0.0, Stage::Cloning, format!("cloning {org}/{repo}"));
        self.with_network_retries("clone", || {
            let output = std::process::Command::new("git")
                .arg("clone")
                .arg(&fetch_url)
                .arg(&dir)
                .output()
                .map_err(|e| CartographError::git(format!("failed to execute git: {e}")))?;
            if output.status.success() {
                Ok(())
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(CartographError::network(format!(
                    "clone of {org}/{repo} failed: {}",
                    stderr.trim()
                )))
            }
        })?;
        report(observer, 100.0, Stage::Cloning, "clone complete");
        info!(org, repo, "repository cloned");
        Ok(dir)
    }

    /// Fetch new refs; returns version tags not previously known.
    pub fn fetch_updates(&self, org: &str, repo: &str) -> Result<Vec<String>> {
        let dir = self.require_repo_dir(org, repo)?;
        let before = self.discover_versions(org, repo)?;
        self.with_network_retries("fetch", || {
            run_git(&dir, &["fetch", "--tags", "--prune", "origin"])
                .map(|_| ())
                .map_err(|e| CartographError::network(e.to_string()))
        })?;
        let after = self.discover_versions(org, repo)?;
        let new: Vec<String> = after
            .into_iter()
            .filter(|v| !before.contains(v))
            .collect();
        Ok(new)
    }

    /// All version tags of the clone, ascending natural order.
    pub fn discover_versions(&self, org: &str, repo: &str) -> Result<Vec<String>> {
        let dir = self.require_repo_dir(org, repo)?;
        let output = run_git(&dir, &["tag", "--list"])?;
        let mut tags: Vec<String> = output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .filter(|l| validate_version_tag(l).is_ok())
            .map(|l| l.to_string())
            .collect();
        versions::sort_ascending(&mut tags);
        Ok(tags)
    }

    /// Materialize `version` into its own working tree and return the
    /// validated checkout path.
    pub fn checkout_version(&self, org: &str, repo: &str, version: &str) -> Result<PathBuf> {
        let repo_dir = self.require_repo_dir(org, repo)?;
        let target = self.checkout_dir(org, repo, version)?;
        if target.join(".git").exists() || target.is_dir() {
            // existing worktrees are reused; content follows the tag
            return validate_path_within_root(&target, &self.storage_root);
        }
        run_git(
            &repo_dir,
            &[
                "worktree",
                "add",
                "--detach",
                target.to_string_lossy().as_ref(),
                version,
            ],
        )?;
        let validated = validate_path_within_root(&target, &self.storage_root)?;
        info!(org, repo, version, "version checked out");
        Ok(validated)
    }

    /// Remove one version's working tree.
    pub fn prune_version(&self, org: &str, repo: &str, version: &str) -> Result<()> {
        let repo_dir = self.require_repo_dir(org, repo)?;
        let target = self.checkout_dir(org, repo, version)?;
        if !target.exists() {
            return Ok(());
        }
        validate_path_within_root(&target, &self.storage_root)?;
        if let Err(e) = run_git(
            &repo_dir,
            &[
                "worktree",
                "remove",
                "--force",
                target.to_string_lossy().as_ref(),
            ],
        ) {
            warn!(org, repo, version, error = %e, "worktree removal failed, deleting directory");
            fs::remove_dir_all(&target).map_err(|e| {
                CartographError::git(format!("cannot remove {}: {e}", target.display()))
            })?;
        }
        Ok(())
    }

    /// Delete a repository's entire on-disk state.
    pub fn remove_repository(&self, org: &str, repo: &str) -> Result<()> {
        let dir = self.repo_dir(org, repo)?;
        if !dir.exists() {
            return Ok(());
        }
        validate_path_within_root(&dir, &self.storage_root)?;
        fs::remove_dir_all(&dir)
            .map_err(|e| CartographError::git(format!("cannot remove {}: {e}", dir.display())))?;
        info!(org, repo, "repository removed from disk");
        Ok(())
    }

    /// Take the per-repository ingestion lock.
    ///
    /// Fails immediately when another ingestion holds it; the checkout
    /// directory is owned exclusively by one ingestion at a time.
    pub fn acquire_ingest_lock(&self, org: &str, repo: &str) -> Result<IngestLock> {
        let dir = self.require_repo_dir(org, repo)?;
        let path = dir.join(".ingest.lock");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                CartographError::store(format!("cannot open lock {}: {e}", path.display()))
            })?;
        file.try_lock_exclusive().map_err(|_| {
            CartographError::store(format!(
                "another ingestion is running for {org}/{repo}; wait for it to finish"
            ))
        })?;
        Ok(IngestLock { file, path })
    }

    fn require_repo_dir(&self, org: &str, repo: &str) -> Result<PathBuf> {
        let dir = self.repo_dir(org, repo)?;
        if !dir.join(".git").exists() {
            return Err(CartographError::git(format!(
                "{org}/{repo} is not cloned; run repo add first"
            )));
        }
        Ok(dir)
    }

    /// Retry a network operation with exponential backoff up to the
    /// configured budget, then surface the last error.
    fn with_network_retries(
        &self,
        what: &str,
        mut op: impl FnMut() -> Result<()>,
    ) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            match op() {
                Ok(()) => return Ok(()),
                Err(e) if e.is_recoverable() && attempt < self.max_retries => {
                    let delay = RETRY_BASE_DELAY * 2u32.saturating_pow(attempt);
                    warn!(what, attempt, delay_ms = delay.as_millis() as u64, "retrying after failure");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Weave a bearer token into an https URL. Non-https URLs pass through.
fn authenticated_url(url: &str, token: Option<&str>) -> String {
    match token {
        Some(token) if url.starts_with("https://") => {
            format!("https://{token}@{}", &url["https://".len()..])
        }
        _ => url.to_string(),
    }
}

/// Paths helper used by tests and the managers.
pub fn repository_metadata_path(repo_dir: &Path) -> PathBuf {
    repo_dir.join(".cartograph.json")
}
