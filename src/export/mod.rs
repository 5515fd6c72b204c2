//! Streaming export of semantic artifacts.
//!
//! Two formats: a hierarchical outline for humans and a line-delimited
//! compact form for machine consumption. Both read through paged SPARQL
//! queries and never mutate the store; a failed export removes its
//! partial output file.

pub mod compact;
pub mod outline;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::Config;

pub use compact::CompactExporter;
pub use outline::OutlineExporter;

/// Outcome of one export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub path: PathBuf,
    pub records_written: usize,
    pub functions_exported: usize,
    pub classes_exported: usize,
    pub modules_exported: usize,
}

/// Default destination `{root}/exports/{org}/{repo}/{version}.{ext}`.
pub fn default_export_path(
    config: &Config,
    org: &str,
    repo: &str,
    version: &str,
    extension: &str,
) -> PathBuf {
    config
        .exports_dir()
        .join(org)
        .join(repo)
        .join(format!("{version}.{extension}"))
}

/// Deduplicating table for verbose strings that recur across records
/// (module paths, file paths). Records reference entries by index; each
/// entry is emitted once, on first use.
#[derive(Debug, Default)]
pub struct StringTable {
    indexes: BTreeMap<String, usize>,
}

impl StringTable {
    pub fn new() -> Self {
        StringTable::default()
    }

    /// Index for `value`; `Some(index)` on first sight means the caller
    /// must emit the table entry before referencing it.
    pub fn intern(&mut self, value: &str) -> (usize, bool) {
        if let Some(&index) = self.indexes.get(value) {
            return (index, false);
        }
        let index = self.indexes.len();
        self.indexes.insert(value.to_string(), index);
        (index, true)
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}

/// Remove a partial output file, ignoring secondary failures.
pub(crate) fn discard_partial(path: &Path) {
    let _ = std::fs::remove_file(path);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_table_interns_once() {
        let mut table = StringTable::new();
        let (a, fresh_a) = table.intern("acme.core");
        let (b, fresh_b) = table.intern("acme.core");
        let (c, fresh_c) = table.intern("acme.util");
        assert_eq!(a, b);
        assert!(fresh_a);
        assert!(!fresh_b);
        assert_ne!(a, c);
        assert!(fresh_c);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn default_path_shape() {
        let config = Config::with_root("/data");
        let path = default_export_path(&config, "acme", "lib", "v2", "jsonl");
        assert_eq!(path, PathBuf::from("/data/exports/acme/lib/v2.jsonl"));
    }
}
