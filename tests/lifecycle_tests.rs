//! Graph lifecycle tests: version removal and the guarantees around
//! stable identities and cross-graph references.

use std::fs;
use std::path::Path;
use std::time::Duration;

use cartograph::builder::GraphBuilder;
use cartograph::manager::GraphManager;
use cartograph::ontology::vocab;
use cartograph::store::{schema, QueryOutcome, TripleStore};
use cartograph::{CancellationToken, Config};
use tempfile::TempDir;

const ORG: &str = "acme";
const REPO: &str = "lib";

fn test_config(root: &Path) -> Config {
    let mut config = Config::with_root(root);
    config.require_confirmation_for_destructive = false;
    config
}

fn write_module(dir: &Path, body: &str) {
    let package = dir.join("acme").join("lib");
    fs::create_dir_all(&package).unwrap();
    fs::write(package.join("core.py"), body).unwrap();
}

fn build(store: &TripleStore, config: &Config, version: &str, checkout: &Path) {
    let builder = GraphBuilder::new(store, config);
    builder.ensure_ontologies().unwrap();
    builder
        .build_version(
            ORG,
            REPO,
            version,
            checkout,
            None,
            None,
            &CancellationToken::new(),
        )
        .unwrap();
}

fn ask(store: &TripleStore, sparql: &str) -> bool {
    match store.query(sparql, Duration::from_secs(10)).unwrap() {
        QueryOutcome::Boolean(value) => value,
        other => panic!("expected boolean, got {other:?}"),
    }
}

/// Two versions sharing `keep` while only v1 has `only_v1`.
fn build_two_versions(store: &TripleStore, config: &Config) {
    let v1 = TempDir::new().unwrap();
    write_module(
        v1.path(),
        "def keep(x):\n    return x\n\ndef only_v1(x):\n    return x\n",
    );
    build(store, config, "v1", v1.path());

    let v2 = TempDir::new().unwrap();
    write_module(v2.path(), "def keep(x):\n    return x\n");
    build(store, config, "v2", v2.path());
}

#[test]
fn removing_a_version_scrubs_its_uris_and_memberships() {
    let root = TempDir::new().unwrap();
    let store = TripleStore::open_in_memory().unwrap();
    let config = test_config(root.path());
    build_two_versions(&store, &config);

    let manager = GraphManager::new(&config, &store);
    manager.remove(ORG, REPO, Some("v1"), true).unwrap();

    // no triple mentioning a ...#v1 URI remains in any graph
    for line in store.snapshot().unwrap() {
        assert!(
            !line.contains("#v1>"),
            "version-scoped URI survived removal: {line}"
        );
    }

    // shared entity keeps its other membership; v1-only entity is gone
    let stable_graph = schema::stable_functions_graph(ORG, REPO).unwrap();
    assert!(ask(
        &store,
        &format!(
            "ASK {{ GRAPH <{stable_graph}> {{ <function:acme/lib/acme.lib.core.keep> <{}> \"v2\" }} }}",
            vocab::woc::EXISTS_IN_VERSION
        ),
    ));
    assert!(!ask(
        &store,
        &format!(
            "ASK {{ GRAPH <{stable_graph}> {{ <function:acme/lib/acme.lib.core.keep> <{}> \"v1\" }} }}",
            vocab::woc::EXISTS_IN_VERSION
        ),
    ));
    assert!(!ask(
        &store,
        &format!(
            "ASK {{ GRAPH <{stable_graph}> {{ <function:acme/lib/acme.lib.core.only_v1> ?p ?o }} }}"
        ),
    ));

    // events incident on v1 are gone
    let events = cartograph::builder::load_events(&store, ORG, REPO).unwrap();
    assert!(events
        .iter()
        .all(|e| e.from_version != "v1" && e.to_version != "v1"));
}

#[test]
fn removing_the_whole_repository_drops_every_graph() {
    let root = TempDir::new().unwrap();
    let store = TripleStore::open_in_memory().unwrap();
    let config = test_config(root.path());
    build_two_versions(&store, &config);

    let manager = GraphManager::new(&config, &store);
    manager.remove(ORG, REPO, None, true).unwrap();

    let prefix = format!("{}/", schema::repository_base(ORG, REPO).unwrap());
    assert!(store.list_graphs(Some(&prefix)).unwrap().is_empty());
}

#[test]
fn destructive_removal_requires_force_when_configured() {
    let root = TempDir::new().unwrap();
    let store = TripleStore::open_in_memory().unwrap();
    let mut config = test_config(root.path());
    config.require_confirmation_for_destructive = true;

    let manager = GraphManager::new(&config, &store);
    let err = manager.remove(ORG, REPO, None, false).unwrap_err();
    assert_eq!(err.kind(), cartograph::ErrorKind::Validation);
}

#[test]
fn rebuild_keeps_cross_graph_references_resolvable() {
    // after a nuclear rebuild, every event still points at a stable URI
    // that exists in the stable graph
    let root = TempDir::new().unwrap();
    let store = TripleStore::open_in_memory().unwrap();
    let config = test_config(root.path());
    build_two_versions(&store, &config);

    // rebuild v2 in place
    let v2 = TempDir::new().unwrap();
    write_module(v2.path(), "def keep(x):\n    return x\n");
    build(&store, &config, "v2", v2.path());

    let stable_graph = schema::stable_functions_graph(ORG, REPO).unwrap();
    let events_graph = schema::events_graph(ORG, REPO).unwrap();
    let dangling = format!(
        "ASK {{ GRAPH <{events_graph}> {{ ?e <{affects}> ?stable }} \
           FILTER NOT EXISTS {{ GRAPH <{stable_graph}> {{ ?stable ?p ?o }} }} }}",
        affects = vocab::abc::AFFECTS,
    );
    assert!(!ask(&store, &dangling));
}

#[test]
fn version_scoped_graphs_exist_and_die_together() {
    let root = TempDir::new().unwrap();
    let store = TripleStore::open_in_memory().unwrap();
    let config = test_config(root.path());

    let v1 = TempDir::new().unwrap();
    write_module(v1.path(), "def f(x):\n    return x\n");
    build(&store, &config, "v1", v1.path());

    let graphs = [
        schema::implementations_graph(ORG, REPO, "v1").unwrap(),
        schema::files_graph(ORG, REPO, "v1").unwrap(),
        schema::meta_graph(ORG, REPO, "v1").unwrap(),
    ];
    for graph in &graphs {
        assert!(store.graph_exists(graph).unwrap(), "{graph} missing after build");
    }

    let manager = GraphManager::new(&config, &store);
    manager.remove(ORG, REPO, Some("v1"), true).unwrap();
    for graph in &graphs {
        assert!(!store.graph_exists(graph).unwrap(), "{graph} survived removal");
    }
}

#[test]
fn evolution_graphs_track_current_state() {
    let root = TempDir::new().unwrap();
    let store = TripleStore::open_in_memory().unwrap();
    let config = test_config(root.path());
    build_two_versions(&store, &config);

    // analysis rows exist for both versions
    let analysis_graph = schema::evolution_analysis_graph(ORG, REPO).unwrap();
    assert!(ask(
        &store,
        &format!(
            "ASK {{ GRAPH <{analysis_graph}> {{ ?a <{}> \"v1\" }} }}",
            vocab::evo::VERSION
        ),
    ));

    // after removing v1 the analysis row for it disappears
    let manager = GraphManager::new(&config, &store);
    manager.remove(ORG, REPO, Some("v1"), true).unwrap();
    assert!(!ask(
        &store,
        &format!(
            "ASK {{ GRAPH <{analysis_graph}> {{ ?a <{}> \"v1\" }} }}",
            vocab::evo::VERSION
        ),
    ));
}
