//! Git intelligence: commits, developers, branches and tags read from a
//! repository's history via the `git` CLI.
//!
//! Author emails are opaque strings end to end; they are never parsed as
//! anything else. Developer records are aggregates derived from the
//! commit stream.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CartographError, Result};
use crate::progress::{CancellationToken, Stage};

/// Field and record separators for `git log` parsing; neither occurs in
/// commit metadata.
const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';

/// Commits are checked against the cancellation token in batches of this
/// size.
const CANCEL_BATCH: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: String,
    pub author_name: String,
    /// Verbatim author email; a numeric-looking email stays a string.
    pub author_email: String,
    /// ISO-8601 author timestamp.
    pub timestamp: String,
    pub message: String,
    /// Repository-relative paths touched by the commit.
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeveloperRecord {
    pub email: String,
    pub name: String,
    pub commit_count: usize,
    pub first_seen: String,
    pub last_seen: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRecord {
    pub name: String,
    pub target_sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub name: String,
    pub target_sha: String,
}

/// Everything extracted from one repository's history.
#[derive(Debug, Clone, Default)]
pub struct GitIntelligence {
    pub commits: Vec<CommitRecord>,
    pub developers: Vec<DeveloperRecord>,
    pub branches: Vec<BranchRecord>,
    pub tags: Vec<TagRecord>,
}

impl GitIntelligence {
    /// Most recent commit touching `file`, by author timestamp.
    pub fn latest_commit_touching(&self, file: &str) -> Option<&CommitRecord> {
        self.commits
            .iter()
            .filter(|c| c.files.iter().any(|f| f == file))
            .max_by_key(|c| parse_timestamp(&c.timestamp))
    }
}

/// Run a git subcommand in `dir` and return stdout.
pub fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .map_err(|e| CartographError::git(format!("failed to execute git: {e}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CartographError::git(format!(
            "git {} failed: {}",
            args.first().unwrap_or(&""),
            stderr.trim()
        )));
    }
    String::from_utf8(output.stdout)
        .map_err(|e| CartographError::git(format!("git output is not UTF-8: {e}")))
}

/// Extract the full history of the repository at `repo_dir`.
pub fn analyze_repository(
    repo_dir: &Path,
    cancel: &CancellationToken,
) -> Result<GitIntelligence> {
    cancel.checkpoint(Stage::GitAnalysis)?;
    let commits = read_commits(repo_dir, cancel)?;
    let developers = aggregate_developers(&commits);
    let branches = read_branches(repo_dir)?;
    let tags = read_tags(repo_dir)?;
    debug!(
        commits = commits.len(),
        developers = developers.len(),
        branches = branches.len(),
        tags = tags.len(),
        "history analyzed"
    );
    Ok(GitIntelligence {
        commits,
        developers,
        branches,
        tags,
    })
}

fn read_commits(repo_dir: &Path, cancel: &CancellationToken) -> Result<Vec<CommitRecord>> {
    let format = "--pretty=format:%x1e%H%x1f%an%x1f%ae%x1f%aI%x1f%s";
    let output = run_git(repo_dir, &["log", "--all", format, "--name-only"])?;

    let mut commits = Vec::new();
    for (index, block) in output.split(RECORD_SEP).enumerate() {
        if index % CANCEL_BATCH == 0 {
            cancel.checkpoint(Stage::GitAnalysis)?;
        }
        let block = block.trim_matches('\n');
        if block.is_empty() {
            continue;
        }
        let mut lines = block.lines();
        let header = match lines.next() {
            Some(h) => h,
            None => continue,
        };
        let fields: Vec<&str> = header.split(FIELD_SEP).collect();
        if fields.len() != 5 {
            return Err(CartographError::git(format!(
                "unexpected log record: {header:?}"
            )));
        }
        let files: Vec<String> = lines
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.trim().replace('\\', "/"))
            .collect();
        commits.push(CommitRecord {
            sha: fields[0].to_string(),
            author_name: fields[1].to_string(),
            author_email: fields[2].to_string(),
            timestamp: fields[3].to_string(),
            message: fields[4].to_string(),
            files,
        });
    }
    Ok(commits)
}

/// Aggregate per-email authorship stats from the commit stream.
pub fn aggregate_developers(commits: &[CommitRecord]) -> Vec<DeveloperRecord> {
    let mut by_email: BTreeMap<String, DeveloperRecord> = BTreeMap::new();
    for commit in commits {
        let entry = by_email
            .entry(commit.author_email.clone())
            .or_insert_with(|| DeveloperRecord {
                email: commit.author_email.clone(),
                name: commit.author_name.clone(),
                commit_count: 0,
                first_seen: commit.timestamp.clone(),
                last_seen: commit.timestamp.clone(),
            });
        entry.commit_count += 1;
        if parse_timestamp(&commit.timestamp) < parse_timestamp(&entry.first_seen) {
            entry.first_seen = commit.timestamp.clone();
        }
        if parse_timestamp(&commit.timestamp) > parse_timestamp(&entry.last_seen) {
            entry.last_seen = commit.timestamp.clone();
            entry.name = commit.author_name.clone();
        }
    }
    by_email.into_values().collect()
}

fn read_branches(repo_dir: &Path) -> Result<Vec<BranchRecord>> {
    let output = run_git(
        repo_dir,
        &[
            "for-each-ref",
            "refs/heads",
            "--format=%(objectname) %(refname:short)",
        ],
    )?;
    let mut branches = Vec::new();
    for line in output.lines() {
        if let Some((sha, name)) = line.split_once(' ') {
            branches.push(BranchRecord {
                name: name.to_string(),
                target_sha: sha.to_string(),
            });
        }
    }
    Ok(branches)
}

fn read_tags(repo_dir: &Path) -> Result<Vec<TagRecord>> {
    // %(*objectname) dereferences annotated tags to the commit they mark
    let output = run_git(
        repo_dir,
        &[
            "for-each-ref",
            "refs/tags",
            "--format=%(objectname) %(*objectname) %(refname:short)",
        ],
    )?;
    let mut tags = Vec::new();
    for line in output.lines() {
        let mut parts = line.splitn(3, ' ');
        let object = parts.next().unwrap_or_default();
        let peeled = parts.next().unwrap_or_default();
        let name = match parts.next() {
            Some(n) if !n.is_empty() => n,
            _ => continue,
        };
        let target = if peeled.is_empty() { object } else { peeled };
        tags.push(TagRecord {
            name: name.to_string(),
            target_sha: target.to_string(),
        });
    }
    Ok(tags)
}

fn parse_timestamp(iso: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(iso).unwrap_or_else(|_| {
        DateTime::parse_from_rfc3339("1970-01-01T00:00:00+00:00")
            .expect("epoch timestamp parses")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(sha: &str, email: &str, ts: &str, files: &[&str]) -> CommitRecord {
        CommitRecord {
            sha: sha.to_string(),
            author_name: "Dev".to_string(),
            author_email: email.to_string(),
            timestamp: ts.to_string(),
            message: "change".to_string(),
            files: files.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn developers_aggregate_counts_and_range() {
        let commits = vec![
            commit("a", "dev@example.com", "2024-01-01T10:00:00+00:00", &[]),
            commit("b", "dev@example.com", "2024-03-01T10:00:00+00:00", &[]),
            commit("c", "other@example.com", "2024-02-01T10:00:00+00:00", &[]),
        ];
        let developers = aggregate_developers(&commits);
        assert_eq!(developers.len(), 2);
        let dev = developers
            .iter()
            .find(|d| d.email == "dev@example.com")
            .unwrap();
        assert_eq!(dev.commit_count, 2);
        assert_eq!(dev.first_seen, "2024-01-01T10:00:00+00:00");
        assert_eq!(dev.last_seen, "2024-03-01T10:00:00+00:00");
    }

    #[test]
    fn numeric_looking_email_stays_verbatim() {
        let commits = vec![commit("a", "1234567@users.example", "2024-01-01T10:00:00+00:00", &[])];
        let developers = aggregate_developers(&commits);
        assert_eq!(developers[0].email, "1234567@users.example");
    }

    #[test]
    fn latest_commit_touching_picks_newest() {
        let intel = GitIntelligence {
            commits: vec![
                commit("old", "d@e", "2024-01-01T10:00:00+00:00", &["core.py"]),
                commit("new", "d@e", "2024-02-01T10:00:00+00:00", &["core.py"]),
                commit("other", "d@e", "2024-03-01T10:00:00+00:00", &["readme.md"]),
            ],
            ..GitIntelligence::default()
        };
        assert_eq!(intel.latest_commit_touching("core.py").unwrap().sha, "new");
        assert!(intel.latest_commit_touching("missing.py").is_none());
    }
}
