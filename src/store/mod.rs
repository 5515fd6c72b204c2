//! Triple store adapter over an embedded oxigraph store.
//!
//! The store is a single-writer / many-reader resource: every mutation
//! goes through the writer token (an exclusive guard), reads run against
//! the latest committed snapshot. `upsert_graph` is drop+insert inside
//! one transaction, so readers never observe a partially replaced graph.
//!
//! Duplicate triples within a graph are idempotent (RDF set semantics).
//! Queries are read-only; update forms are rejected before the query
//! engine sees them.

pub mod schema;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use oxigraph::model::{GraphName, NamedNode, NamedOrBlankNode, Quad, Term, Triple};
use oxigraph::sparql::{Query, QueryResults};
use oxigraph::store::{StorageError, Store};
use tracing::{debug, warn};

use crate::error::{CartographError, Result};
use crate::validation::validate_sparql_query;

/// Tabular result of a SELECT query.
#[derive(Debug, Clone)]
pub struct QueryRows {
    pub columns: Vec<String>,
    /// One entry per row; `None` marks an unbound variable.
    pub rows: Vec<Vec<Option<String>>>,
}

/// Result of a read-only query.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    /// SELECT solutions.
    Rows(QueryRows),
    /// ASK result.
    Boolean(bool),
    /// CONSTRUCT triples, serialized in N-Triples form.
    Triples(Vec<String>),
}

/// Named-graph RDF store with a single-writer discipline.
pub struct TripleStore {
    store: Store,
    writer: Mutex<()>,
}

/// Exclusive write access to the store.
///
/// Holding the guard across several graph operations makes the sequence
/// serializable against every other writer; readers continue against the
/// last committed snapshot.
pub struct StoreWriter<'a> {
    store: &'a Store,
    _token: MutexGuard<'a, ()>,
}

impl TripleStore {
    /// Open (or create) the store at `path`.
    ///
    /// An unavailable store is fatal to the caller.
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path).map_err(|e| {
            CartographError::store(format!("cannot create store directory {}: {e}", path.display()))
        })?;
        let store = Store::open(path)
            .map_err(|e| CartographError::store(format!("cannot open store at {}: {e}", path.display())))?;
        Ok(TripleStore {
            store,
            writer: Mutex::new(()),
        })
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let store = Store::new()
            .map_err(|e| CartographError::store(format!("cannot open in-memory store: {e}")))?;
        Ok(TripleStore {
            store,
            writer: Mutex::new(()),
        })
    }

    /// Acquire the writer token.
    pub fn writer(&self) -> StoreWriter<'_> {
        StoreWriter {
            store: &self.store,
            _token: self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner()),
        }
    }

    /// Replace the entire contents of `graph_uri` with `triples`
    /// atomically.
    pub fn upsert_graph(&self, graph_uri: &str, triples: &[Triple]) -> Result<usize> {
        self.writer().upsert_graph(graph_uri, triples)
    }

    /// Add triples to `graph_uri`; duplicates are idempotent.
    pub fn append_to_graph(&self, graph_uri: &str, triples: &[Triple]) -> Result<usize> {
        self.writer().append_to_graph(graph_uri, triples)
    }

    /// Remove a graph and all its triples. No-op if absent; returns
    /// whether the graph existed.
    pub fn drop_graph(&self, graph_uri: &str) -> Result<bool> {
        self.writer().drop_graph(graph_uri)
    }

    /// Enumerate graph URIs, optionally restricted to a prefix, sorted.
    pub fn list_graphs(&self, prefix: Option<&str>) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for graph in self.store.named_graphs() {
            let graph = graph
                .map_err(|e| CartographError::store(format!("graph enumeration failed: {e}")))?;
            if let NamedOrBlankNode::NamedNode(node) = graph {
                let uri = node.into_string();
                if prefix.map_or(true, |p| uri.starts_with(p)) {
                    names.push(uri);
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Whether the named graph exists.
    pub fn graph_exists(&self, graph_uri: &str) -> Result<bool> {
        let node = parse_graph_uri(graph_uri)?;
        self.store
            .contains_named_graph(node.as_ref())
            .map_err(|e| CartographError::store(format!("graph lookup failed: {e}")))
    }

    /// Number of triples in a graph (0 if absent).
    pub fn triple_count(&self, graph_uri: &str) -> Result<usize> {
        let node = parse_graph_uri(graph_uri)?;
        let graph = GraphName::NamedNode(node);
        let mut count = 0usize;
        for quad in self
            .store
            .quads_for_pattern(None, None, None, Some(graph.as_ref()))
        {
            quad.map_err(|e| CartographError::store(format!("triple scan failed: {e}")))?;
            count += 1;
        }
        Ok(count)
    }

    /// Execute a read-only SPARQL query with a per-call deadline.
    ///
    /// Update forms are rejected before execution; syntax errors come back
    /// as typed errors carrying the parser's position report; exceeding
    /// the deadline yields a typed timeout carrying the elapsed duration.
    pub fn query(&self, sparql: &str, timeout: Duration) -> Result<QueryOutcome> {
        validate_sparql_query(sparql)?;
        // parse first so syntax errors surface with the reported position
        Query::parse(sparql, None).map_err(|e| CartographError::query_syntax(e.to_string()))?;

        let started = Instant::now();
        let results = self
            .store
            .query(sparql)
            .map_err(|e| CartographError::store(format!("query evaluation failed: {e}")))?;

        match results {
            QueryResults::Solutions(solutions) => {
                let columns: Vec<String> = solutions
                    .variables()
                    .iter()
                    .map(|v| v.as_str().to_string())
                    .collect();
                let mut rows = Vec::new();
                for solution in solutions {
                    check_deadline(started, timeout)?;
                    let solution = solution.map_err(|e| {
                        CartographError::store(format!("query evaluation failed: {e}"))
                    })?;
                    let row = columns
                        .iter()
                        .map(|name| solution.get(name.as_str()).map(term_value))
                        .collect();
                    rows.push(row);
                }
                Ok(QueryOutcome::Rows(QueryRows { columns, rows }))
            }
            QueryResults::Boolean(value) => Ok(QueryOutcome::Boolean(value)),
            QueryResults::Graph(triples) => {
                let mut out = Vec::new();
                for triple in triples {
                    check_deadline(started, timeout)?;
                    let triple = triple.map_err(|e| {
                        CartographError::store(format!("query evaluation failed: {e}"))
                    })?;
                    out.push(format!("{triple} ."));
                }
                Ok(QueryOutcome::Triples(out))
            }
        }
    }

    /// Run a SELECT in batches of `batch_size` rows using LIMIT/OFFSET.
    ///
    /// The query must have a stable ordering key (an ORDER BY clause);
    /// pagination with an unstable order can skip or repeat rows.
    pub fn query_paged<F>(
        &self,
        sparql: &str,
        batch_size: usize,
        timeout: Duration,
        mut on_row: F,
    ) -> Result<usize>
    where
        F: FnMut(&QueryRows, &[Option<String>]) -> Result<()>,
    {
        let mut offset = 0usize;
        let mut total = 0usize;
        loop {
            let page = format!("{sparql} LIMIT {batch_size} OFFSET {offset}");
            let outcome = self.query(&page, timeout)?;
            let rows = match outcome {
                QueryOutcome::Rows(rows) => rows,
                _ => {
                    return Err(CartographError::store(
                        "paged query must be a SELECT".to_string(),
                    ))
                }
            };
            let fetched = rows.rows.len();
            for row in &rows.rows {
                on_row(&rows, row)?;
            }
            total += fetched;
            if fetched < batch_size {
                return Ok(total);
            }
            offset += batch_size;
        }
    }

    /// All triples of one graph, preserving term types and datatypes.
    pub fn graph_triples(&self, graph_uri: &str) -> Result<Vec<Triple>> {
        let node = parse_graph_uri(graph_uri)?;
        let graph = GraphName::NamedNode(node);
        let mut triples = Vec::new();
        for quad in self
            .store
            .quads_for_pattern(None, None, None, Some(graph.as_ref()))
        {
            let quad = quad.map_err(|e| CartographError::store(format!("triple scan failed: {e}")))?;
            triples.push(Triple::new(quad.subject, quad.predicate, quad.object));
        }
        triples.sort_by_cached_key(|t| t.to_string());
        Ok(triples)
    }

    /// Sorted serialization of every quad in the store.
    ///
    /// Two stores with identical contents produce identical snapshots;
    /// used by verification and the idempotence tests.
    pub fn snapshot(&self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        for quad in self.store.iter() {
            let quad = quad.map_err(|e| CartographError::store(format!("store scan failed: {e}")))?;
            lines.push(quad.to_string());
        }
        lines.sort();
        Ok(lines)
    }
}

impl StoreWriter<'_> {
    /// Drop+insert `graph_uri` within one transaction.
    pub fn upsert_graph(&self, graph_uri: &str, triples: &[Triple]) -> Result<usize> {
        let node = parse_graph_uri(graph_uri)?;
        let graph = GraphName::NamedNode(node.clone());
        let quads: Vec<Quad> = triples
            .iter()
            .map(|t| Quad::new(t.subject.clone(), t.predicate.clone(), t.object.clone(), graph.clone()))
            .collect();

        let run = || {
            self.store.transaction(|mut txn| {
                txn.remove_named_graph(node.as_ref())?;
                // Keep the graph listed even when the new content is empty.
                txn.insert_named_graph(node.as_ref())?;
                for quad in &quads {
                    txn.insert(quad.as_ref())?;
                }
                Ok::<_, StorageError>(())
            })
        };
        retry_once(run).map_err(|e| {
            CartographError::store(format!("upsert of {graph_uri} failed: {e}"))
        })?;
        debug!(graph = graph_uri, triples = quads.len(), "graph replaced");
        Ok(quads.len())
    }

    /// Insert triples into `graph_uri` within one transaction.
    pub fn append_to_graph(&self, graph_uri: &str, triples: &[Triple]) -> Result<usize> {
        let node = parse_graph_uri(graph_uri)?;
        let graph = GraphName::NamedNode(node.clone());
        let quads: Vec<Quad> = triples
            .iter()
            .map(|t| Quad::new(t.subject.clone(), t.predicate.clone(), t.object.clone(), graph.clone()))
            .collect();

        let run = || {
            self.store.transaction(|mut txn| {
                txn.insert_named_graph(node.as_ref())?;
                for quad in &quads {
                    txn.insert(quad.as_ref())?;
                }
                Ok::<_, StorageError>(())
            })
        };
        retry_once(run).map_err(|e| {
            CartographError::store(format!("append to {graph_uri} failed: {e}"))
        })?;
        debug!(graph = graph_uri, triples = quads.len(), "triples appended");
        Ok(quads.len())
    }

    /// Remove a graph and its triples; no-op if absent.
    pub fn drop_graph(&self, graph_uri: &str) -> Result<bool> {
        let node = parse_graph_uri(graph_uri)?;
        let existed = retry_once(|| self.store.remove_named_graph(node.as_ref()))
            .map_err(|e| CartographError::store(format!("drop of {graph_uri} failed: {e}")))?;
        if existed {
            debug!(graph = graph_uri, "graph dropped");
        }
        Ok(existed)
    }

    /// Drop every graph whose URI starts with `prefix`.
    pub fn drop_graphs_with_prefix(&self, prefix: &str) -> Result<usize> {
        let mut dropped = 0usize;
        let mut targets = Vec::new();
        for graph in self.store.named_graphs() {
            let graph = graph
                .map_err(|e| CartographError::store(format!("graph enumeration failed: {e}")))?;
            if let NamedOrBlankNode::NamedNode(node) = graph {
                if node.as_str().starts_with(prefix) {
                    targets.push(node);
                }
            }
        }
        for node in targets {
            retry_once(|| self.store.remove_named_graph(node.as_ref())).map_err(|e| {
                CartographError::store(format!("drop of {} failed: {e}", node.as_str()))
            })?;
            dropped += 1;
        }
        Ok(dropped)
    }
}

/// Retry a store operation once on failure; transient backend errors
/// (lock contention, interrupted IO) usually clear on the second attempt.
fn retry_once<T, E: std::fmt::Display>(
    mut op: impl FnMut() -> std::result::Result<T, E>,
) -> std::result::Result<T, E> {
    match op() {
        Ok(value) => Ok(value),
        Err(first) => {
            warn!(error = %first, "store operation failed, retrying once");
            op()
        }
    }
}

fn parse_graph_uri(graph_uri: &str) -> Result<NamedNode> {
    NamedNode::new(graph_uri)
        .map_err(|e| CartographError::validation(format!("invalid graph URI {graph_uri:?}: {e}")))
}

fn check_deadline(started: Instant, timeout: Duration) -> Result<()> {
    let elapsed = started.elapsed();
    if elapsed > timeout {
        return Err(CartographError::query_timeout(elapsed));
    }
    Ok(())
}

/// Plain value of a term: IRI text, literal lexical form, or blank node id.
pub fn term_value(term: &Term) -> String {
    match term {
        Term::NamedNode(node) => node.as_str().to_string(),
        Term::BlankNode(node) => node.as_str().to_string(),
        Term::Literal(literal) => literal.value().to_string(),
        Term::Triple(triple) => triple.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::model::{Literal, NamedNode};

    fn triple(s: &str, p: &str, o: &str) -> Triple {
        Triple::new(
            NamedNode::new(s).unwrap(),
            NamedNode::new(p).unwrap(),
            Literal::new_simple_literal(o),
        )
    }

    const GRAPH: &str = "http://cartograph.dev/repo/t/r/functions/stable";

    #[test]
    fn append_is_idempotent_for_duplicates() {
        let store = TripleStore::open_in_memory().unwrap();
        let t = triple("http://x/s", "http://x/p", "o");
        store.append_to_graph(GRAPH, &[t.clone()]).unwrap();
        store.append_to_graph(GRAPH, &[t]).unwrap();
        assert_eq!(store.triple_count(GRAPH).unwrap(), 1);
    }

    #[test]
    fn upsert_replaces_contents() {
        let store = TripleStore::open_in_memory().unwrap();
        store
            .upsert_graph(GRAPH, &[triple("http://x/a", "http://x/p", "1")])
            .unwrap();
        store
            .upsert_graph(GRAPH, &[triple("http://x/b", "http://x/p", "2")])
            .unwrap();
        assert_eq!(store.triple_count(GRAPH).unwrap(), 1);

        let outcome = store
            .query(
                &format!("SELECT ?s WHERE {{ GRAPH <{GRAPH}> {{ ?s ?p ?o }} }}"),
                Duration::from_secs(5),
            )
            .unwrap();
        match outcome {
            QueryOutcome::Rows(rows) => {
                assert_eq!(rows.rows.len(), 1);
                assert_eq!(rows.rows[0][0].as_deref(), Some("http://x/b"));
            }
            _ => panic!("expected rows"),
        }
    }

    #[test]
    fn drop_graph_is_noop_when_absent() {
        let store = TripleStore::open_in_memory().unwrap();
        assert!(!store.drop_graph(GRAPH).unwrap());
        store
            .append_to_graph(GRAPH, &[triple("http://x/s", "http://x/p", "o")])
            .unwrap();
        assert!(store.drop_graph(GRAPH).unwrap());
        assert!(!store.graph_exists(GRAPH).unwrap());
    }

    #[test]
    fn list_graphs_filters_by_prefix() {
        let store = TripleStore::open_in_memory().unwrap();
        store
            .append_to_graph(
                "http://cartograph.dev/repo/a/x/files/v1",
                &[triple("http://x/s", "http://x/p", "o")],
            )
            .unwrap();
        store
            .append_to_graph(
                "http://cartograph.dev/repo/b/y/files/v1",
                &[triple("http://x/s", "http://x/p", "o")],
            )
            .unwrap();
        let graphs = store
            .list_graphs(Some("http://cartograph.dev/repo/a/"))
            .unwrap();
        assert_eq!(graphs, vec!["http://cartograph.dev/repo/a/x/files/v1"]);
        assert_eq!(store.list_graphs(None).unwrap().len(), 2);
    }

    #[test]
    fn ask_query_returns_boolean() {
        let store = TripleStore::open_in_memory().unwrap();
        store
            .append_to_graph(GRAPH, &[triple("http://x/s", "http://x/p", "o")])
            .unwrap();
        let outcome = store
            .query(
                &format!("ASK {{ GRAPH <{GRAPH}> {{ ?s ?p ?o }} }}"),
                Duration::from_secs(5),
            )
            .unwrap();
        assert!(matches!(outcome, QueryOutcome::Boolean(true)));
    }

    #[test]
    fn update_forms_rejected_before_execution() {
        let store = TripleStore::open_in_memory().unwrap();
        let err = store
            .query("DROP GRAPH <http://x/g>", Duration::from_secs(5))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Security);
    }

    #[test]
    fn syntax_errors_are_typed() {
        let store = TripleStore::open_in_memory().unwrap();
        let err = store
            .query("SELECT ?x WHERE { broken", Duration::from_secs(5))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Store);
        assert!(matches!(err, CartographError::QuerySyntax { .. }));
    }

    #[test]
    fn paged_query_visits_every_row() {
        let store = TripleStore::open_in_memory().unwrap();
        let triples: Vec<Triple> = (0..7)
            .map(|i| triple(&format!("http://x/s{i}"), "http://x/p", "o"))
            .collect();
        store.append_to_graph(GRAPH, &triples).unwrap();

        let mut seen = Vec::new();
        let total = store
            .query_paged(
                &format!("SELECT ?s WHERE {{ GRAPH <{GRAPH}> {{ ?s ?p ?o }} }} ORDER BY ?s"),
                3,
                Duration::from_secs(5),
                |_, row| {
                    seen.push(row[0].clone().unwrap());
                    Ok(())
                },
            )
            .unwrap();
        assert_eq!(total, 7);
        assert_eq!(seen.len(), 7);
        let mut sorted = seen.clone();
        sorted.sort();
        assert_eq!(seen, sorted);
    }

    #[test]
    fn snapshot_is_sorted_and_stable() {
        let store = TripleStore::open_in_memory().unwrap();
        store
            .append_to_graph(GRAPH, &[triple("http://x/b", "http://x/p", "2")])
            .unwrap();
        store
            .append_to_graph(GRAPH, &[triple("http://x/a", "http://x/p", "1")])
            .unwrap();
        let first = store.snapshot().unwrap();
        let second = store.snapshot().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert!(first[0] < first[1]);
    }

    #[test]
    fn upsert_with_empty_contents_keeps_graph_listed() {
        let store = TripleStore::open_in_memory().unwrap();
        store.upsert_graph(GRAPH, &[]).unwrap();
        assert!(store.graph_exists(GRAPH).unwrap());
        assert_eq!(store.triple_count(GRAPH).unwrap(), 0);
    }
}
