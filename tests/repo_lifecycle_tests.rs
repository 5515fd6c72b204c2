//! Repository lifecycle against real git fixtures.
//!
//! Each test creates an upstream repository with `git` on disk, clones
//! it through the repo manager and drives the graph manager the way the
//! CLI does.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use cartograph::manager::{GraphManager, RepoManager};
use cartograph::repo_store::RepositoryStore;
use cartograph::store::{schema, TripleStore};
use cartograph::{CancellationToken, Config, RepoStatus};
use tempfile::TempDir;

const ORG: &str = "acme";
const REPO: &str = "lib";

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .expect("git runs");
    assert!(
        status.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&status.stderr)
    );
}

/// Create an upstream repository with tags v1 and v2; v2 renames
/// `create` to `make`.
fn make_upstream() -> (TempDir, PathBuf) {
    let upstream = TempDir::new().unwrap();
    let dir = upstream.path().join("origin");
    fs::create_dir_all(&dir).unwrap();
    git(&dir, &["init", "--initial-branch=main"]);
    git(&dir, &["config", "user.email", "dev@example.com"]);
    git(&dir, &["config", "user.name", "Dev"]);

    let package = dir.join("acme").join("lib");
    fs::create_dir_all(&package).unwrap();
    fs::write(
        package.join("core.py"),
        "def create(path):\n    \"\"\"Create a thing.\"\"\"\n    return path\n",
    )
    .unwrap();
    git(&dir, &["add", "."]);
    git(&dir, &["commit", "-m", "initial"]);
    git(&dir, &["tag", "v1"]);

    fs::write(
        package.join("core.py"),
        "def make(path):\n    \"\"\"Make a thing.\"\"\"\n    return path\n",
    )
    .unwrap();
    git(&dir, &["add", "."]);
    git(&dir, &["commit", "-m", "rename create to make"]);
    git(&dir, &["tag", "v2"]);

    (upstream, dir)
}

fn test_config(root: &Path) -> Config {
    let mut config = Config::with_root(root);
    config.require_confirmation_for_destructive = false;
    config
}

#[test]
fn repo_add_discovers_releases_without_building_graphs() {
    let (_upstream, origin) = make_upstream();
    let root = TempDir::new().unwrap();
    let config = test_config(root.path());
    let store = TripleStore::open_in_memory().unwrap();

    let manager = RepoManager::new(&config, &store);
    let record = manager
        .add(ORG, REPO, Some(origin.to_string_lossy().as_ref()), None)
        .unwrap();

    assert_eq!(record.status, RepoStatus::Ready);
    // releases in descending order
    assert_eq!(record.releases, vec!["v2".to_string(), "v1".to_string()]);

    // no graphs exist yet
    let prefix = format!("{}/", schema::repository_base(ORG, REPO).unwrap());
    assert!(store.list_graphs(Some(&prefix)).unwrap().is_empty());

    // record is persisted and listable
    let listed = manager.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, REPO);
}

#[test]
fn graph_add_builds_and_links_git_provenance() {
    let (_upstream, origin) = make_upstream();
    let root = TempDir::new().unwrap();
    let config = test_config(root.path());
    let store = TripleStore::open_in_memory().unwrap();

    RepoManager::new(&config, &store)
        .add(ORG, REPO, Some(origin.to_string_lossy().as_ref()), None)
        .unwrap();

    let graphs = GraphManager::new(&config, &store);
    let cancel = CancellationToken::new();
    let report = graphs.add(ORG, REPO, Some("v1"), false, None, &cancel).unwrap();
    assert_eq!(report.functions, 1);
    assert!(report.commits >= 1);
    assert!(report.developers >= 1);

    // commits graph references the stable entity, never the
    // implementation record
    let commits_graph = schema::git_commits_graph(ORG, REPO).unwrap();
    let commit_triples = store.graph_triples(&commits_graph).unwrap();
    assert!(!commit_triples.is_empty());
    for triple in &commit_triples {
        assert!(
            !triple.to_string().contains("#v1"),
            "commit triple mentions an implementation URI: {triple}"
        );
    }

    // tags graph carries both version tags
    let tags_graph = schema::git_tags_graph(ORG, REPO).unwrap();
    assert!(store.triple_count(&tags_graph).unwrap() >= 4);
}

#[test]
fn graph_add_twice_requires_force() {
    let (_upstream, origin) = make_upstream();
    let root = TempDir::new().unwrap();
    let config = test_config(root.path());
    let store = TripleStore::open_in_memory().unwrap();

    RepoManager::new(&config, &store)
        .add(ORG, REPO, Some(origin.to_string_lossy().as_ref()), None)
        .unwrap();

    let graphs = GraphManager::new(&config, &store);
    let cancel = CancellationToken::new();
    graphs.add(ORG, REPO, Some("v1"), false, None, &cancel).unwrap();

    let err = graphs
        .add(ORG, REPO, Some("v1"), false, None, &cancel)
        .unwrap_err();
    assert_eq!(err.kind(), cartograph::ErrorKind::Validation);

    // with force the rebuild succeeds
    graphs.add(ORG, REPO, Some("v1"), true, None, &cancel).unwrap();
}

#[test]
fn graph_add_defaults_to_latest_version() {
    let (_upstream, origin) = make_upstream();
    let root = TempDir::new().unwrap();
    let config = test_config(root.path());
    let store = TripleStore::open_in_memory().unwrap();

    RepoManager::new(&config, &store)
        .add(ORG, REPO, Some(origin.to_string_lossy().as_ref()), None)
        .unwrap();

    let graphs = GraphManager::new(&config, &store);
    let report = graphs
        .add(ORG, REPO, None, false, None, &CancellationToken::new())
        .unwrap();
    assert_eq!(report.version, "v2");
}

#[test]
fn nuclear_update_requires_existing_graphs() {
    let (_upstream, origin) = make_upstream();
    let root = TempDir::new().unwrap();
    let config = test_config(root.path());
    let store = TripleStore::open_in_memory().unwrap();

    RepoManager::new(&config, &store)
        .add(ORG, REPO, Some(origin.to_string_lossy().as_ref()), None)
        .unwrap();

    let graphs = GraphManager::new(&config, &store);
    let cancel = CancellationToken::new();
    let err = graphs.update(ORG, REPO, "v1", None, &cancel).unwrap_err();
    assert_eq!(err.kind(), cartograph::ErrorKind::Validation);

    graphs.add(ORG, REPO, Some("v1"), false, None, &cancel).unwrap();
    let report = graphs.update(ORG, REPO, "v1", None, &cancel).unwrap();
    assert_eq!(report.version, "v1");
}

#[test]
fn repo_remove_deletes_disk_and_graphs() {
    let (_upstream, origin) = make_upstream();
    let root = TempDir::new().unwrap();
    let config = test_config(root.path());
    let store = TripleStore::open_in_memory().unwrap();

    let repos = RepoManager::new(&config, &store);
    repos
        .add(ORG, REPO, Some(origin.to_string_lossy().as_ref()), None)
        .unwrap();
    GraphManager::new(&config, &store)
        .add(ORG, REPO, Some("v1"), false, None, &CancellationToken::new())
        .unwrap();

    repos.remove(ORG, REPO, true).unwrap();

    let prefix = format!("{}/", schema::repository_base(ORG, REPO).unwrap());
    assert!(store.list_graphs(Some(&prefix)).unwrap().is_empty());
    assert!(!config.repos_dir().join(ORG).join(REPO).exists());
}

#[test]
fn repository_store_checkout_and_prune() {
    let (_upstream, origin) = make_upstream();
    let root = TempDir::new().unwrap();
    let config = test_config(root.path());
    let store = TripleStore::open_in_memory().unwrap();

    RepoManager::new(&config, &store)
        .add(ORG, REPO, Some(origin.to_string_lossy().as_ref()), None)
        .unwrap();

    let repos = RepositoryStore::new(root.path(), 3);
    let versions = repos.discover_versions(ORG, REPO).unwrap();
    assert_eq!(versions, vec!["v1".to_string(), "v2".to_string()]);

    let checkout = repos.checkout_version(ORG, REPO, "v1").unwrap();
    assert!(checkout.join("acme/lib/core.py").exists());
    // v1 still carries `create`
    let content = fs::read_to_string(checkout.join("acme/lib/core.py")).unwrap();
    assert!(content.contains("def create"));

    repos.prune_version(ORG, REPO, "v1").unwrap();
    assert!(!checkout.exists());
}

#[test]
fn ingest_lock_is_exclusive() {
    let (_upstream, origin) = make_upstream();
    let root = TempDir::new().unwrap();
    let config = test_config(root.path());
    let store = TripleStore::open_in_memory().unwrap();

    RepoManager::new(&config, &store)
        .add(ORG, REPO, Some(origin.to_string_lossy().as_ref()), None)
        .unwrap();

    let repos = RepositoryStore::new(root.path(), 3);
    let lock = repos.acquire_ingest_lock(ORG, REPO).unwrap();
    assert!(repos.acquire_ingest_lock(ORG, REPO).is_err());
    drop(lock);
    repos.acquire_ingest_lock(ORG, REPO).unwrap();
}
