//! Outline export: a hierarchical text tree of module -> class ->
//! function with per-entity name, signature and docstring first line.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use super::{discard_partial, ExportReport};
use crate::config::Config;
use crate::error::{CartographError, Result};
use crate::ontology::vocab;
use crate::progress::{report, ProgressObserver, Stage};
use crate::store::{schema, TripleStore};
use crate::validation::{validate_identifier, validate_version_tag};

#[derive(Debug, Default)]
struct OutlineFunction {
    qualified_name: String,
    signature: String,
    doc: String,
}

#[derive(Debug, Default)]
struct OutlineClass {
    qualified_name: String,
    signature: String,
    doc: String,
    methods: Vec<OutlineFunction>,
}

#[derive(Debug, Default)]
struct OutlineModule {
    file: String,
    classes: Vec<OutlineClass>,
    functions: Vec<OutlineFunction>,
}

pub struct OutlineExporter<'a> {
    store: &'a TripleStore,
    config: &'a Config,
}

impl<'a> OutlineExporter<'a> {
    pub fn new(store: &'a TripleStore, config: &'a Config) -> Self {
        OutlineExporter { store, config }
    }

    /// Export one version's outline to `output`.
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

        report(observer, 10.0, Stage::Exporting, "collecting outline");
        let modules = self.collect(org, repo, version)?;

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CartographError::export(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let file = File::create(output).map_err(|e| {
            CartographError::export(format!("cannot create {}: {e}", output.display()))
        })?;
        let mut writer = BufWriter::new(file);

        let result = write_outline(&mut writer, org, repo, version, &modules);
        match result {
            Ok(stats) => {
                writer
                    .flush()
                    .map_err(|e| CartographError::export(format!("flush failed: {e}")))?;
                report(observer, 100.0, Stage::Exporting, "outline written");
                info!(org, repo, version, modules = modules.len(), "outline export written");
                Ok(ExportReport {
                    path: output.to_path_buf(),
                    records_written: stats.0,
                    functions_exported: stats.1,
                    classes_exported: stats.2,
                    modules_exported: modules.len(),
                })
            }
            Err(e) => {
                drop(writer);
                discard_partial(output);
                Err(e)
            }
        }
    }

    /// Gather the version's entities grouped per module.
    fn collect(
        &self,
        org: &str,
        repo: &str,
        version: &str,
    ) -> Result<BTreeMap<String, OutlineModule>> {
        let implementations = schema::implementations_graph(org, repo, version)?;
        let files_graph = schema::files_graph(org, repo, version)?;
        let stable_graph = schema::stable_functions_graph(org, repo)?;
        let batch = self.config.export_batch_size;
        let timeout = self.config.query_timeout();

        let mut modules: BTreeMap<String, OutlineModule> = BTreeMap::new();

        // module skeletons
        let sparql = format!(
            "SELECT ?path ?file WHERE {{ GRAPH <{files_graph}> {{ \
               ?m <{rdf_type}> <{module_type}> ; <{module_path}> ?path ; <{in_file}> ?file . \
             }} }} ORDER BY ?path",
            rdf_type = vocab::RDF_TYPE,
            module_type = vocab::woc::MODULE,
            module_path = vocab::woc::MODULE_PATH,
            in_file = vocab::woc::DEFINED_IN_FILE,
        );
        self.store.query_paged(&sparql, batch, timeout, |rows, row| {
            let value = |name: &str| -> String {
                rows.columns
                    .iter()
                    .position(|c| c == name)
                    .and_then(|i| row.get(i).cloned().flatten())
                    .unwrap_or_default()
            };
            modules.entry(value("path")).or_default().file = value("file");
            Ok(())
        })?;

        // classes, with their qualified names for method grouping
        let sparql = format!(
            "SELECT ?qname ?name ?sig ?doc ?module WHERE {{ \
               GRAPH <{implementations}> {{ \
                 ?impl <{rdf_type}> <{class_impl}> ; <{has_name}> ?name ; \
                       <{has_sig}> ?sig ; <{impl_class}> ?stable . \
                 OPTIONAL {{ ?impl <{comment}> ?doc }} \
               }} \
               GRAPH <{stable_graph}> {{ ?stable <{qname_p}> ?qname ; <{module_path}> ?module }} \
             }} ORDER BY ?qname",
            rdf_type = vocab::RDF_TYPE,
            class_impl = vocab::woc::CLASS_IMPLEMENTATION,
            has_name = vocab::woc::HAS_NAME,
            has_sig = vocab::woc::HAS_SIGNATURE,
            impl_class = vocab::woc::IMPLEMENTS_CLASS,
            comment = vocab::RDFS_COMMENT,
            qname_p = vocab::woc::CANONICAL_NAME,
            module_path = vocab::woc::MODULE_PATH,
        );
        self.store.query_paged(&sparql, batch, timeout, |rows, row| {
            let value = |name: &str| -> String {
                rows.columns
                    .iter()
                    .position(|c| c == name)
                    .and_then(|i| row.get(i).cloned().flatten())
                    .unwrap_or_default()
            };
            let module = modules.entry(value("module")).or_default();
            module.classes.push(OutlineClass {
                qualified_name: value("qname"),
                signature: value("sig"),
                doc: first_line(&value("doc")),
                methods: Vec::new(),
            });
            Ok(())
        })?;

        // functions, routed to their class when one encloses them
        let sparql = format!(
            "SELECT ?qname ?sig ?doc ?module WHERE {{ \
               GRAPH <{implementations}> {{ \
                 ?impl <{rdf_type}> <{fn_impl}> ; <{has_sig}> ?sig ; <{impl_fn}> ?stable . \
                 OPTIONAL {{ ?impl <{comment}> ?doc }} \
               }} \
               GRAPH <{stable_graph}> {{ ?stable <{qname_p}> ?qname ; <{module_path}> ?module }} \
             }} ORDER BY ?qname",
            rdf_type = vocab::RDF_TYPE,
            fn_impl = vocab::woc::FUNCTION_IMPLEMENTATION,
            has_sig = vocab::woc::HAS_SIGNATURE,
            impl_fn = vocab::woc::IMPLEMENTS_FUNCTION,
            comment = vocab::RDFS_COMMENT,
            qname_p = vocab::woc::CANONICAL_NAME,
            module_path = vocab::woc::MODULE_PATH,
        );
        self.store.query_paged(&sparql, batch, timeout, |rows, row| {
            let value = |name: &str| -> String {
                rows.columns
                    .iter()
                    .position(|c| c == name)
                    .and_then(|i| row.get(i).cloned().flatten())
                    .unwrap_or_default()
            };
            let function = OutlineFunction {
                qualified_name: value("qname"),
                signature: value("sig"),
                doc: first_line(&value("doc")),
            };
            let module = modules.entry(value("module")).or_default();
            let owner = module.classes.iter_mut().find(|class| {
                function
                    .qualified_name
                    .strip_prefix(&format!("{}.", class.qualified_name))
                    .map_or(false, |rest| !rest.contains('.'))
            });
            match owner {
                Some(class) => class.methods.push(function),
                None => module.functions.push(function),
            }
            Ok(())
        })?;

        Ok(modules)
    }
}

/// Render the tree. Returns (lines, functions, classes).
fn write_outline(
    writer: &mut BufWriter<File>,
    org: &str,
    repo: &str,
    version: &str,
    modules: &BTreeMap<String, OutlineModule>,
) -> Result<(usize, usize, usize)> {
    let mut lines = 0usize;
    let mut functions = 0usize;
    let mut classes = 0usize;
    let mut out = |text: String| -> Result<()> {
        writer
            .write_all(text.as_bytes())
            .and_then(|_| writer.write_all(b"\n"))
            .map_err(|e| CartographError::export(format!("write failed: {e}")))
    };

    out(format!("# {org}/{repo} {version}"))?;
    lines += 1;

    for (path, module) in modules {
        if path.is_empty() {
            continue;
        }
        out(format!("module {path} ({})", module.file))?;
        lines += 1;
        for class in &module.classes {
            let doc = doc_suffix(&class.doc);
            out(format!("  {}{doc}", class.signature))?;
            lines += 1;
            classes += 1;
            for method in &class.methods {
                let doc = doc_suffix(&method.doc);
                out(format!("    {}{doc}", method.signature))?;
                lines += 1;
                functions += 1;
            }
        }
        for function in &module.functions {
            let doc = doc_suffix(&function.doc);
            out(format!("  {}{doc}", function.signature))?;
            lines += 1;
            functions += 1;
        }
    }

    Ok((lines, functions, classes))
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or("").to_string()
}

fn doc_suffix(doc: &str) -> String {
    if doc.is_empty() {
        String::new()
    } else {
        format!("  # {doc}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_suffix_only_when_present() {
        assert_eq!(doc_suffix(""), "");
        assert_eq!(doc_suffix("Does a thing."), "  # Does a thing.");
    }

    #[test]
    fn first_line_truncates() {
        assert_eq!(first_line("one\ntwo"), "one");
        assert_eq!(first_line(""), "");
    }
}
