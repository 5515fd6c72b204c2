//! Compact line-delimited export.
//!
//! One JSON record per line: header, repository, string-table entries
//! interleaved on first use, per-function, per-class, per-module,
//! per-pattern, per-cluster, footer with aggregate stats. Field names
//! are short; module and file strings go through the string table. The
//! output is consumable with any structured-query tool.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::json;
use tracing::info;

use super::{discard_partial, ExportReport, StringTable};
use crate::config::Config;
use crate::error::{CartographError, Result};
use crate::ontology::vocab;
use crate::progress::{report, ProgressObserver, Stage};
use crate::store::{schema, TripleStore};
use crate::validation::{validate_identifier, validate_version_tag};

pub struct CompactExporter<'a> {
    store: &'a TripleStore,
    config: &'a Config,
}

impl<'a> CompactExporter<'a> {
    pub fn new(store: &'a TripleStore, config: &'a Config) -> Self {
        CompactExporter { store, config }
    }

    /// Export one version to `output`.
    pub fn export(
        &self,
        org: &str,
        repo: &str,
        version: &str,
        output: &Path,
        observer: Option<&ProgressObserver>,
    ) -> Result<ExportReport> {
        validate_identifier("organization", org)?;
        validate_identifier("repository", repo)?;
        validate_version_tag(version)?;

        let implementations = schema::implementations_graph(org, repo, version)?;
        if !self.store.graph_exists(&implementations)? {
            return Err(CartographError::export(format!(
                "no graphs exist for {org}/{repo} {version}; run graph add first"
            )));
        }

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CartographError::export(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let file = File::create(output).map_err(|e| {
            CartographError::export(format!("cannot create {}: {e}", output.display()))
        })?;
        let mut writer = BufWriter::new(file);

        match self.write_records(org, repo, version, &mut writer, observer) {
            Ok(mut export_report) => {
                writer
                    .flush()
                    .map_err(|e| CartographError::export(format!("flush failed: {e}")))?;
                export_report.path = output.to_path_buf();
                info!(
                    org,
                    repo,
                    version,
                    records = export_report.records_written,
                    "compact export written"
                );
                Ok(export_report)
            }
            Err(e) => {
                // exports never leave partial artifacts behind
                drop(writer);
                discard_partial(output);
                Err(e)
            }
        }
    }

    fn write_records(
        &self,
        org: &str,
        repo: &str,
        version: &str,
        writer: &mut BufWriter<File>,
        observer: Option<&ProgressObserver>,
    ) -> Result<ExportReport> {
        let implementations = schema::implementations_graph(org, repo, version)?;
        let files_graph = schema::files_graph(org, repo, version)?;
        let stable_graph = schema::stable_functions_graph(org, repo)?;
        let batch = self.config.export_batch_size;
        let timeout = self.config.query_timeout();

        let mut strings = StringTable::new();
        let mut records = 0usize;

        emit(writer, &mut records,
            json!({"type": "header", "repo": format!("{org}/{repo}"), "release": version}),
        )?;
        emit(writer, &mut records,
            json!({
                "type": "repository",
                "org_repo": format!("{org}/{repo}"),
                "release": version,
                "name": repo,
                "organization": org,
            }),
        )?;

        report(observer, 20.0, Stage::Exporting, "exporting functions");
        let mut function_names: Vec<String> = Vec::new();
        let mut functions_exported = 0usize;
        {
            let sparql = format!(
                "SELECT ?name ?sig ?module ?file ?line ?end ?loc ?cat ?refactor WHERE {{ \
                   GRAPH <{implementations}> {{ \
                     ?impl <{rdf_type}> <{fn_impl}> ; \
                           <{has_name}> ?name ; \
                           <{has_sig}> ?sig ; \
                           <{in_file}> ?file ; \
                           <{start_line}> ?line ; \
                           <{end_line}> ?end ; \
                           <{body_lines}> ?loc ; \
                           <{category}> ?cat ; \
                           <{refactor}> ?refactor ; \
                           <{impl_fn}> ?stable . \
                   }} \
                   GRAPH <{stable_graph}> {{ ?stable <{module_path}> ?module }} \
                 }} ORDER BY ?name ?file",
                rdf_type = vocab::RDF_TYPE,
                fn_impl = vocab::woc::FUNCTION_IMPLEMENTATION,
                has_name = vocab::woc::HAS_NAME,
                has_sig = vocab::woc::HAS_SIGNATURE,
                in_file = vocab::woc::DEFINED_IN_FILE,
                start_line = vocab::woc::START_LINE,
                end_line = vocab::woc::END_LINE,
                body_lines = vocab::woc::BODY_LINES,
                category = vocab::woc::CATEGORY,
                refactor = vocab::woc::REFACTOR_SCORE,
                impl_fn = vocab::woc::IMPLEMENTS_FUNCTION,
                module_path = vocab::woc::MODULE_PATH,
            );
            let mut rows_buffer: Vec<Vec<Option<String>>> = Vec::new();
            let mut columns: Vec<String> = Vec::new();
            self.store.query_paged(&sparql, batch, timeout, |rows, row| {
                if columns.is_empty() {
                    columns = rows.columns.clone();
                }
                rows_buffer.push(row.to_vec());
                Ok(())
            })?;
            let col = |name: &str| columns.iter().position(|c| c == name);
            let (name_i, sig_i, module_i, file_i, line_i, end_i, loc_i, cat_i, refactor_i) = (
                col("name"),
                col("sig"),
                col("module"),
                col("file"),
                col("line"),
                col("end"),
                col("loc"),
                col("cat"),
                col("refactor"),
            );
            for row in rows_buffer {
                let get = |i: Option<usize>| -> String {
                    i.and_then(|i| row.get(i).cloned().flatten()).unwrap_or_default()
                };
                let name = get(name_i);
                let module = get(module_i);
                let file = get(file_i);
                let (module_id, module_fresh) = strings.intern(&module);
                if module_fresh {
                    emit(writer, &mut records, json!({"type": "str", "i": module_id, "v": module}))?;
                }
                let (file_id, file_fresh) = strings.intern(&file);
                if file_fresh {
                    emit(writer, &mut records, json!({"type": "str", "i": file_id, "v": file}))?;
                }
                let start = get(line_i).parse::<u64>().unwrap_or(0);
                let end = get(end_i).parse::<u64>().unwrap_or(0);
                // source links are generated here, never stored
                let link = schema::github_link(
                    org,
                    repo,
                    version,
                    &file,
                    Some(start as usize),
                    Some(end as usize),
                );
                emit(writer, &mut records,
                    json!({
                        "type": "function",
                        "n": name.as_str(),
                        "s": get(sig_i),
                        "m": module_id,
                        "f": file_id,
                        "l": start,
                        "loc": get(loc_i).parse::<u64>().unwrap_or(0),
                        "cat": get(cat_i),
                        "refactor": get(refactor_i),
                        "gh": link,
                    }),
                )?;
                functions_exported += 1;
                function_names.push(name);
            }
        }

        report(observer, 50.0, Stage::Exporting, "exporting classes");
        let mut classes_exported = 0usize;
        {
            let sparql = format!(
                "SELECT ?name ?cat ?refactor ?module ?file ?line ?end \
                        (GROUP_CONCAT(DISTINCT ?parent; SEPARATOR=\",\") AS ?parents) \
                        (COUNT(DISTINCT ?method) AS ?methods) WHERE {{ \
                   GRAPH <{implementations}> {{ \
                     ?impl <{rdf_type}> <{class_impl}> ; \
                           <{has_name}> ?name ; \
                           <{in_file}> ?file ; \
                           <{start_line}> ?line ; \
                           <{end_line}> ?end ; \
                           <{category}> ?cat ; \
                           <{refactor}> ?refactor ; \
                           <{impl_class}> ?stable . \
                     OPTIONAL {{ ?impl <{parent_class}> ?parent }} \
                     OPTIONAL {{ ?impl <{has_method}> ?method }} \
                   }} \
                   GRAPH <{stable_graph}> {{ ?stable <{module_path}> ?module }} \
                 }} GROUP BY ?name ?cat ?refactor ?module ?file ?line ?end ORDER BY ?name",
                rdf_type = vocab::RDF_TYPE,
                class_impl = vocab::woc::CLASS_IMPLEMENTATION,
                has_name = vocab::woc::HAS_NAME,
                in_file = vocab::woc::DEFINED_IN_FILE,
                start_line = vocab::woc::START_LINE,
                end_line = vocab::woc::END_LINE,
                category = vocab::woc::CATEGORY,
                refactor = vocab::woc::REFACTOR_SCORE,
                impl_class = vocab::woc::IMPLEMENTS_CLASS,
                parent_class = vocab::woc::PARENT_CLASS,
                has_method = vocab::woc::HAS_METHOD,
                module_path = vocab::woc::MODULE_PATH,
            );
            let mut rows_buffer: Vec<Vec<Option<String>>> = Vec::new();
            let mut columns: Vec<String> = Vec::new();
            self.store.query_paged(&sparql, batch, timeout, |rows, row| {
                if columns.is_empty() {
                    columns = rows.columns.clone();
                }
                rows_buffer.push(row.to_vec());
                Ok(())
            })?;
            let col = |name: &str| columns.iter().position(|c| c == name);
            let (name_i, cat_i, refactor_i, module_i, file_i, line_i, end_i, parents_i, methods_i) = (
                col("name"),
                col("cat"),
                col("refactor"),
                col("module"),
                col("file"),
                col("line"),
                col("end"),
                col("parents"),
                col("methods"),
            );
            for row in rows_buffer {
                let get = |i: Option<usize>| -> String {
                    i.and_then(|i| row.get(i).cloned().flatten()).unwrap_or_default()
                };
                let module = get(module_i);
                let (module_id, module_fresh) = strings.intern(&module);
                if module_fresh {
                    emit(writer, &mut records, json!({"type": "str", "i": module_id, "v": module}))?;
                }
                let link = schema::github_link(
                    org,
                    repo,
                    version,
                    &get(file_i),
                    get(line_i).parse::<usize>().ok(),
                    get(end_i).parse::<usize>().ok(),
                );
                emit(writer, &mut records,
                    json!({
                        "type": "class",
                        "n": get(name_i),
                        "m": module_id,
                        "inherits": get(parents_i),
                        "methods": get(methods_i).parse::<u64>().unwrap_or(0),
                        "cat": get(cat_i),
                        "refactor": get(refactor_i),
                        "gh": link,
                    }),
                )?;
                classes_exported += 1;
            }
        }

        report(observer, 70.0, Stage::Exporting, "exporting modules");
        let mut modules_exported = 0usize;
        let mut module_paths: Vec<String> = Vec::new();
        {
            let sparql = format!(
                "SELECT ?path ?file ?count ?cat WHERE {{ \
                   GRAPH <{files_graph}> {{ \
                     ?module <{rdf_type}> <{module_type}> ; \
                             <{module_path}> ?path ; \
                             <{in_file}> ?file ; \
                             <{fn_count}> ?count ; \
                             <{category}> ?cat . \
                   }} \
                 }} ORDER BY ?path",
                rdf_type = vocab::RDF_TYPE,
                module_type = vocab::woc::MODULE,
                module_path = vocab::woc::MODULE_PATH,
                in_file = vocab::woc::DEFINED_IN_FILE,
                fn_count = vocab::woc::FUNCTION_COUNT,
                category = vocab::woc::CATEGORY,
            );
            let mut rows_buffer: Vec<Vec<Option<String>>> = Vec::new();
            let mut columns: Vec<String> = Vec::new();
            self.store.query_paged(&sparql, batch, timeout, |rows, row| {
                if columns.is_empty() {
                    columns = rows.columns.clone();
                }
                rows_buffer.push(row.to_vec());
                Ok(())
            })?;
            let col = |name: &str| columns.iter().position(|c| c == name);
            let (path_i, file_i, count_i, cat_i) =
                (col("path"), col("file"), col("count"), col("cat"));
            for row in rows_buffer {
                let get = |i: Option<usize>| -> String {
                    i.and_then(|i| row.get(i).cloned().flatten()).unwrap_or_default()
                };
                let path = get(path_i);
                emit(writer, &mut records,
                    json!({
                        "type": "module",
                        "name": path.as_str(),
                        "path": get(file_i),
                        "function_count": get(count_i).parse::<u64>().unwrap_or(0),
                        "category": get(cat_i),
                    }),
                )?;
                modules_exported += 1;
                module_paths.push(path);
            }
        }

        // patterns: shared name prefixes over this version's functions
        let mut patterns_exported = 0usize;
        {
            let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for name in &function_names {
                if let Some((prefix, _)) = name.split_once('_') {
                    if !prefix.is_empty() {
                        groups.entry(prefix.to_string()).or_default().push(name.clone());
                    }
                }
            }
            for (prefix, members) in groups.into_iter().filter(|(_, m)| m.len() > 1) {
                emit(writer, &mut records,
                    json!({
                        "type": "pattern",
                        "name": prefix.as_str(),
                        "functions": members.iter().take(10).collect::<Vec<_>>(),
                        "function_count": members.len(),
                        "category": pattern_category(&prefix),
                    }),
                )?;
                patterns_exported += 1;
            }
        }

        // clusters: modules grouped by their top-level package
        let mut clusters_exported = 0usize;
        {
            let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for path in &module_paths {
                let top = path.split('.').next().unwrap_or(path).to_string();
                groups.entry(top).or_default().push(path.clone());
            }
            for (name, members) in groups {
                emit(writer, &mut records,
                    json!({
                        "type": "cluster",
                        "name": name,
                        "modules": members.iter().take(5).collect::<Vec<_>>(),
                        "module_count": members.len(),
                    }),
                )?;
                clusters_exported += 1;
            }
        }

        let footer = json!({
            "type": "footer",
            "stats": {
                "functions_exported": functions_exported,
                "classes_exported": classes_exported,
                "modules_exported": modules_exported,
                "patterns_exported": patterns_exported,
                "clusters_exported": clusters_exported,
                "strings_interned": strings.len(),
                "total_entities": records + 1,
            },
        });
        emit(writer, &mut records, footer)?;
        report(observer, 100.0, Stage::Exporting, "export complete");

        Ok(ExportReport {
            path: Default::default(),
            records_written: records,
            functions_exported,
            classes_exported,
            modules_exported,
        })
    }
}

/// Write one JSON record line and bump the record counter.
fn emit(
    writer: &mut BufWriter<File>,
    records: &mut usize,
    value: serde_json::Value,
) -> Result<()> {
    serde_json::to_writer(&mut *writer, &value)
        .map_err(|e| CartographError::export(format!("write failed: {e}")))?;
    writer
        .write_all(b"\n")
        .map_err(|e| CartographError::export(format!("write failed: {e}")))?;
    *records += 1;
    Ok(())
}

fn pattern_category(prefix: &str) -> &'static str {
    let prefix = prefix.to_lowercase();
    if prefix.contains("crud") || prefix.contains("db") || prefix.contains("database") {
        "data_access"
    } else if prefix.contains("api") || prefix.contains("endpoint") {
        "api_pattern"
    } else if prefix.contains("util") || prefix.contains("helper") {
        "utility_pattern"
    } else {
        "domain_pattern"
    }
}
