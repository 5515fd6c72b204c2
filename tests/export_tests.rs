//! Exporter tests: compact record stream and outline tree.

use std::fs;
use std::path::Path;

use cartograph::builder::GraphBuilder;
use cartograph::export::{CompactExporter, OutlineExporter};
use cartograph::store::TripleStore;
use cartograph::{CancellationToken, Config};
use serde_json::Value;
use tempfile::TempDir;

const ORG: &str = "acme";
const REPO: &str = "lib";

fn build_fixture(store: &TripleStore, config: &Config, version: &str, body: &str) {
    let checkout = TempDir::new().unwrap();
    let package = checkout.path().join("acme").join("lib");
    fs::create_dir_all(&package).unwrap();
    fs::write(package.join("core.py"), body).unwrap();

    let builder = GraphBuilder::new(store, config);
    builder.ensure_ontologies().unwrap();
    builder
        .build_version(
            ORG,
            REPO,
            version,
            checkout.path(),
            None,
            None,
            &CancellationToken::new(),
        )
        .unwrap();
}

fn read_records(path: &Path) -> Vec<Value> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).expect("every line is valid JSON"))
        .collect()
}

#[test]
fn compact_export_emits_header_function_and_footer() {
    let root = TempDir::new().unwrap();
    let config = Config::with_root(root.path());
    let store = TripleStore::open_in_memory().unwrap();
    build_fixture(
        &store,
        &config,
        "v2",
        "def make(path):\n    \"\"\"Make a thing.\"\"\"\n    return path\n",
    );

    let output = root.path().join("out.jsonl");
    let report = CompactExporter::new(&store, &config)
        .export(ORG, REPO, "v2", &output, None)
        .unwrap();
    assert_eq!(report.functions_exported, 1);

    let records = read_records(&output);
    assert_eq!(records[0]["type"], "header");
    assert_eq!(records[0]["repo"], "acme/lib");
    assert_eq!(records[0]["release"], "v2");
    assert_eq!(records.last().unwrap()["type"], "footer");

    let functions: Vec<&Value> = records.iter().filter(|r| r["type"] == "function").collect();
    assert_eq!(functions.len(), 1);
    assert_eq!(functions[0]["n"], "make");
    // the body is under 50 lines
    assert_eq!(functions[0]["refactor"], "small");
    // source link generated from the record's file and line span
    assert_eq!(
        functions[0]["gh"],
        "https://github.com/acme/lib/blob/v2/acme/lib/core.py#L1-L3"
    );

    let footer = records.last().unwrap();
    assert_eq!(footer["stats"]["functions_exported"], 1);
}

#[test]
fn compact_export_references_the_string_table() {
    let root = TempDir::new().unwrap();
    let config = Config::with_root(root.path());
    let store = TripleStore::open_in_memory().unwrap();
    build_fixture(
        &store,
        &config,
        "v1",
        "def first(x):\n    return x\n\ndef second(x):\n    return x\n",
    );

    let output = root.path().join("out.jsonl");
    CompactExporter::new(&store, &config)
        .export(ORG, REPO, "v1", &output, None)
        .unwrap();

    let records = read_records(&output);
    let strings: Vec<&Value> = records.iter().filter(|r| r["type"] == "str").collect();
    let functions: Vec<&Value> = records.iter().filter(|r| r["type"] == "function").collect();
    assert_eq!(functions.len(), 2);

    // the module string is interned once; both functions reference it
    let module_entries: Vec<&&Value> = strings
        .iter()
        .filter(|s| s["v"] == "acme.lib.core")
        .collect();
    assert_eq!(module_entries.len(), 1);
    let module_id = &module_entries[0]["i"];
    assert_eq!(&functions[0]["m"], module_id);
    assert_eq!(&functions[1]["m"], module_id);

    let footer = records.last().unwrap();
    assert!(footer["stats"]["strings_interned"].as_u64().unwrap() >= 2);
}

#[test]
fn compact_export_covers_classes_modules_patterns_clusters() {
    let root = TempDir::new().unwrap();
    let config = Config::with_root(root.path());
    let store = TripleStore::open_in_memory().unwrap();
    build_fixture(
        &store,
        &config,
        "v1",
        "\
class Thing(Base):
    def get_one(self):
        return 1

    def get_two(self):
        return 2
",
    );

    let output = root.path().join("out.jsonl");
    CompactExporter::new(&store, &config)
        .export(ORG, REPO, "v1", &output, None)
        .unwrap();

    let records = read_records(&output);
    let classes: Vec<&Value> = records.iter().filter(|r| r["type"] == "class").collect();
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0]["n"], "Thing");
    assert_eq!(classes[0]["inherits"], "Base");
    assert_eq!(classes[0]["methods"], 2);
    assert_eq!(classes[0]["refactor"], "simple");
    assert!(classes[0]["gh"]
        .as_str()
        .unwrap()
        .starts_with("https://github.com/acme/lib/blob/v1/acme/lib/core.py#L"));

    let modules: Vec<&Value> = records.iter().filter(|r| r["type"] == "module").collect();
    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0]["name"], "acme.lib.core");
    assert_eq!(modules[0]["function_count"], 2);

    // get_one/get_two share the `get` prefix
    let patterns: Vec<&Value> = records.iter().filter(|r| r["type"] == "pattern").collect();
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0]["name"], "get");
    assert_eq!(patterns[0]["function_count"], 2);

    let clusters: Vec<&Value> = records.iter().filter(|r| r["type"] == "cluster").collect();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0]["name"], "acme");
}

#[test]
fn compact_export_fails_for_unknown_version_without_artifacts() {
    let root = TempDir::new().unwrap();
    let config = Config::with_root(root.path());
    let store = TripleStore::open_in_memory().unwrap();

    let output = root.path().join("missing.jsonl");
    let err = CompactExporter::new(&store, &config)
        .export(ORG, REPO, "v9", &output, None)
        .unwrap_err();
    assert_eq!(err.kind(), cartograph::ErrorKind::Export);
    assert!(!output.exists());
}

#[test]
fn outline_export_renders_module_class_function_tree() {
    let root = TempDir::new().unwrap();
    let config = Config::with_root(root.path());
    let store = TripleStore::open_in_memory().unwrap();
    build_fixture(
        &store,
        &config,
        "v1",
        "\
class Thing(Base):
    \"\"\"A thing.\"\"\"

    def start(self):
        \"\"\"Start it.\"\"\"
        return 1


def create(path):
    \"\"\"Create a thing.

    Longer description.
    \"\"\"
    return path
",
    );

    let output = root.path().join("outline.txt");
    let report = OutlineExporter::new(&store, &config)
        .export(ORG, REPO, "v1", &output, None)
        .unwrap();
    assert_eq!(report.modules_exported, 1);
    assert_eq!(report.classes_exported, 1);
    assert_eq!(report.functions_exported, 2);

    let text = fs::read_to_string(&output).unwrap();
    assert!(text.starts_with("# acme/lib v1"));
    assert!(text.contains("module acme.lib.core (acme/lib/core.py)"));
    assert!(text.contains("class Thing(Base)  # A thing."));
    // the method is nested deeper than the class
    assert!(text.contains("    def start(self)  # Start it."));
    // docstring first line only
    assert!(text.contains("def create(path)  # Create a thing."));
    assert!(!text.contains("Longer description."));
}
