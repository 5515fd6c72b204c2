//! `cartograph query <SPARQL>` command.

use std::time::Duration;

use cartograph::{query, CartographError, Config, TripleStore};

pub fn run(config: &Config, store: &TripleStore, args: &[&str]) -> Result<(), CartographError> {
    let sparql = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .copied()
        .ok_or_else(|| {
            CartographError::validation("usage: cartograph query <SPARQL> [--timeout <SECONDS>]")
        })?;

    let timeout = match crate::repo_cmd::flag_value(args, "--timeout") {
        Some(raw) => {
            let seconds: u64 = raw.parse().map_err(|_| {
                CartographError::validation(format!("--timeout must be an integer (got {raw:?})"))
            })?;
            if !(5..=300).contains(&seconds) {
                return Err(CartographError::validation(
                    "--timeout must be between 5 and 300 seconds",
                ));
            }
            Duration::from_secs(seconds)
        }
        None => config.query_timeout(),
    };

    let outcome = query::run_with_timeout(store, sparql, timeout)?;
    println!("{}", serde_json::to_string_pretty(&query::to_json(&outcome)).unwrap_or_default());
    Ok(())
}
