//! Read-only SPARQL front door.
//!
//! Accepts SPARQL 1.1 SELECT, ASK and CONSTRUCT. Update forms are
//! rejected with a security error before any store call; results are
//! rendered into plain JSON for callers outside the library.

use std::time::Duration;

use serde_json::json;

use crate::config::Config;
use crate::error::Result;
use crate::store::{QueryOutcome, TripleStore};
use crate::validation::validate_sparql_query;

/// Execute a read-only query with the configured default timeout.
pub fn run(store: &TripleStore, config: &Config, sparql: &str) -> Result<QueryOutcome> {
    run_with_timeout(store, sparql, config.query_timeout())
}

/// Execute a read-only query with an explicit per-call timeout.
pub fn run_with_timeout(
    store: &TripleStore,
    sparql: &str,
    timeout: Duration,
) -> Result<QueryOutcome> {
    // rejected here first so hostile text never reaches the engine
    validate_sparql_query(sparql)?;
    store.query(sparql, timeout)
}

/// Render a query outcome as a JSON value for CLI output.
pub fn to_json(outcome: &QueryOutcome) -> serde_json::Value {
    match outcome {
        QueryOutcome::Rows(rows) => {
            let rendered: Vec<serde_json::Value> = rows
                .rows
                .iter()
                .map(|row| {
                    let mut object = serde_json::Map::new();
                    for (column, value) in rows.columns.iter().zip(row.iter()) {
                        object.insert(
                            column.clone(),
                            value
                                .as_ref()
                                .map(|v| json!(v))
                                .unwrap_or(serde_json::Value::Null),
                        );
                    }
                    serde_json::Value::Object(object)
                })
                .collect();
            json!({"columns": rows.columns, "rows": rendered, "count": rows.rows.len()})
        }
        QueryOutcome::Boolean(value) => json!({"boolean": value}),
        QueryOutcome::Triples(triples) => {
            json!({"triples": triples, "count": triples.len()})
        }
    }
}
