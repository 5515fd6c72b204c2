//! Query front-door tests: safety gate, result shapes, graph listing.

use std::fs;

use cartograph::builder::GraphBuilder;
use cartograph::manager::GraphManager;
use cartograph::query;
use cartograph::store::{schema, QueryOutcome, TripleStore};
use cartograph::{CancellationToken, Config};
use tempfile::TempDir;

const ORG: &str = "acme";
const REPO: &str = "lib";

fn build_fixture(store: &TripleStore, config: &Config) {
    let checkout = TempDir::new().unwrap();
    let package = checkout.path().join("acme").join("lib");
    fs::create_dir_all(&package).unwrap();
    fs::write(
        package.join("core.py"),
        "def create(path):\n    return path\n\ndef make(path):\n    return path\n",
    )
    .unwrap();

    let builder = GraphBuilder::new(store, config);
    builder.ensure_ontologies().unwrap();
    builder
        .build_version(
            ORG,
            REPO,
            "v1",
            checkout.path(),
            None,
            None,
            &CancellationToken::new(),
        )
        .unwrap();
}

#[test]
fn select_count_over_stable_functions() {
    let root = TempDir::new().unwrap();
    let config = Config::with_root(root.path());
    let store = TripleStore::open_in_memory().unwrap();
    build_fixture(&store, &config);

    let stable_graph = schema::stable_functions_graph(ORG, REPO).unwrap();
    let sparql = format!(
        "SELECT (COUNT(*) AS ?n) WHERE {{ GRAPH <{stable_graph}> {{ \
           ?f <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> \
              <http://rdf.webofcode.org/woc/Function> }} }}"
    );
    match query::run(&store, &config, &sparql).unwrap() {
        QueryOutcome::Rows(rows) => {
            assert_eq!(rows.rows.len(), 1);
            assert_eq!(rows.rows[0][0].as_deref(), Some("2"));
        }
        other => panic!("expected rows, got {other:?}"),
    }
}

#[test]
fn update_forms_are_rejected_before_any_store_call() {
    let root = TempDir::new().unwrap();
    let config = Config::with_root(root.path());
    let store = TripleStore::open_in_memory().unwrap();

    for sparql in [
        "INSERT DATA { <a:s> <a:p> <a:o> }",
        "DELETE WHERE { ?s ?p ?o }",
        "CLEAR ALL",
        "DROP GRAPH <http://cartograph.dev/repo/acme/lib/functions/stable>",
    ] {
        let err = query::run(&store, &config, sparql).unwrap_err();
        assert_eq!(err.kind(), cartograph::ErrorKind::Security, "query: {sparql}");
    }
}

#[test]
fn construct_returns_triples() {
    let root = TempDir::new().unwrap();
    let config = Config::with_root(root.path());
    let store = TripleStore::open_in_memory().unwrap();
    build_fixture(&store, &config);

    let stable_graph = schema::stable_functions_graph(ORG, REPO).unwrap();
    let sparql = format!(
        "CONSTRUCT {{ ?f ?p ?o }} WHERE {{ GRAPH <{stable_graph}> {{ ?f ?p ?o }} }}"
    );
    match query::run(&store, &config, &sparql).unwrap() {
        QueryOutcome::Triples(triples) => assert!(!triples.is_empty()),
        other => panic!("expected triples, got {other:?}"),
    }
}

#[test]
fn graph_listing_reports_version_scoped_graphs() {
    let root = TempDir::new().unwrap();
    let config = Config::with_root(root.path());
    let store = TripleStore::open_in_memory().unwrap();
    build_fixture(&store, &config);

    let manager = GraphManager::new(&config, &store);
    let infos = manager.list(Some(ORG), Some(REPO)).unwrap();
    assert!(!infos.is_empty());

    let versioned: Vec<_> = infos
        .iter()
        .filter(|info| info.version.as_deref() == Some("v1"))
        .collect();
    // implementations, files and meta graphs for v1
    assert_eq!(versioned.len(), 3);

    let shown = manager.show(ORG, REPO, Some("v1")).unwrap();
    assert_eq!(shown.len(), 3);
}
