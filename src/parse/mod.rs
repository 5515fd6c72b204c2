//! Source parsing: extracts functions, classes and modules from a
//! single-version checkout.
//!
//! The walk collects candidate files first, reads and parses them on a
//! bounded worker pool, then merges results in sorted file order so the
//! output is deterministic. Syntactically invalid files are skipped with
//! a warning; binary and oversized files are skipped before parsing.

pub mod pool;
pub mod python;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CartographError, Result};
use crate::progress::{report, CancellationToken, ProgressObserver, Stage};
use crate::validation::validate_path_within_root;

/// One function parameter: name, declared type text, default text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedParameter {
    pub name: String,
    pub type_text: Option<String>,
    pub default_text: Option<String>,
}

impl ParsedParameter {
    /// Parameters without a default are required.
    pub fn required(&self) -> bool {
        self.default_text.is_none()
    }
}

/// A function extracted from source.
///
/// Pure data; no behavior beyond derived tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFunction {
    /// Dotted qualified name including module path and enclosing classes.
    pub qualified_name: String,
    /// Unqualified name.
    pub name: String,
    /// Dotted module path derived from the file path.
    pub module_path: String,
    pub parameters: Vec<ParsedParameter>,
    pub return_type: Option<String>,
    pub docstring: Option<String>,
    /// Signature text, e.g. `def create(path: str) -> Thing`.
    pub signature: String,
    /// Defining file, relative to the checkout root, forward slashes.
    pub file: String,
    /// 1-indexed lines.
    pub start_line: usize,
    pub end_line: usize,
    /// Lexical body size in lines.
    pub body_lines: usize,
    /// SHA-256 over the body text, hex.
    pub body_hash: String,
    /// Names syntactically called from within the body.
    pub calls: BTreeSet<String>,
}

impl ParsedFunction {
    pub fn refactor_score(&self) -> FunctionScore {
        FunctionScore::from_body_lines(self.body_lines)
    }

    pub fn category(&self) -> &'static str {
        function_category(&self.name, &self.module_path)
    }

    /// Public unless the unqualified name is underscore-prefixed.
    pub fn visibility(&self) -> &'static str {
        if self.name.starts_with('_') && !(self.name.starts_with("__") && self.name.ends_with("__"))
        {
            "private"
        } else {
            "public"
        }
    }
}

/// A class extracted from source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedClass {
    pub qualified_name: String,
    pub name: String,
    pub module_path: String,
    /// Parent class names as written in source.
    pub parents: Vec<String>,
    /// Qualified names of enclosed methods.
    pub methods: Vec<String>,
    pub docstring: Option<String>,
    pub file: String,
    pub start_line: usize,
    pub end_line: usize,
}

impl ParsedClass {
    pub fn refactor_score(&self) -> ClassScore {
        ClassScore::from_method_count(self.methods.len())
    }

    /// Synthesized signature text, comparable across versions.
    pub fn signature_text(&self) -> String {
        if self.parents.is_empty() {
            format!("class {}", self.name)
        } else {
            format!("class {}({})", self.name, self.parents.join(", "))
        }
    }

    /// Hash over the class surface (method list), used for change
    /// detection the same way function body hashes are.
    pub fn content_hash(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        for method in &self.methods {
            hasher.update(method.as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// A module record, one per parsed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedModule {
    /// Dotted path, e.g. `acme.lib.core`.
    pub path: String,
    pub file: String,
    pub function_count: usize,
    pub class_count: usize,
    /// Names of top-level entities in the module.
    pub top_level: BTreeSet<String>,
}

impl ParsedModule {
    pub fn refactor_score(&self) -> ModuleScore {
        ModuleScore::from_function_count(self.function_count)
    }

    pub fn category(&self) -> &'static str {
        module_category(&self.path)
    }
}

/// Tagged-variant representation of parsed entities; downstream code
/// branches on the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParsedEntity {
    Function(ParsedFunction),
    Class(ParsedClass),
    Module(ParsedModule),
}

/// Refactor score for a function, by body line count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionScore {
    Small,
    Good,
    MediumFunction,
    LargeFunction,
    MonsterFunction,
}

impl FunctionScore {
    pub fn from_body_lines(lines: usize) -> Self {
        match lines {
            0..=49 => FunctionScore::Small,
            50..=99 => FunctionScore::Good,
            100..=199 => FunctionScore::MediumFunction,
            200..=399 => FunctionScore::LargeFunction,
            _ => FunctionScore::MonsterFunction,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FunctionScore::Small => "small",
            FunctionScore::Good => "good",
            FunctionScore::MediumFunction => "medium_function",
            FunctionScore::LargeFunction => "large_function",
            FunctionScore::MonsterFunction => "monster_function",
        }
    }
}

/// Refactor score for a class, by method count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassScore {
    Simple,
    Good,
    MediumClass,
    LargeClass,
    GodClass,
}

impl ClassScore {
    pub fn from_method_count(methods: usize) -> Self {
        match methods {
            0..=9 => ClassScore::Simple,
            10..=19 => ClassScore::Good,
            20..=29 => ClassScore::MediumClass,
            30..=49 => ClassScore::LargeClass,
            _ => ClassScore::GodClass,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClassScore::Simple => "simple",
            ClassScore::Good => "good",
            ClassScore::MediumClass => "medium_class",
            ClassScore::LargeClass => "large_class",
            ClassScore::GodClass => "god_class",
        }
    }
}

/// Refactor score for a module, by function count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleScore {
    Simple,
    Good,
    ModerateFunctions,
    ManyFunctions,
    ExcessiveFunctions,
}

impl ModuleScore {
    pub fn from_function_count(functions: usize) -> Self {
        match functions {
            0..=2 => ModuleScore::Simple,
            3..=9 => ModuleScore::Good,
            10..=19 => ModuleScore::ModerateFunctions,
            20..=29 => ModuleScore::ManyFunctions,
            _ => ModuleScore::ExcessiveFunctions,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModuleScore::Simple => "simple",
            ModuleScore::Good => "good",
            ModuleScore::ModerateFunctions => "moderate_functions",
            ModuleScore::ManyFunctions => "many_functions",
            ModuleScore::ExcessiveFunctions => "excessive_functions",
        }
    }
}

/// Coarse implementation category from name and module keywords.
///
/// One of `api`, `core`, `util`, `test`, `io`, `internal`.
pub fn function_category(name: &str, module: &str) -> &'static str {
    let name = name.to_lowercase();
    let module = module.to_lowercase();
    if name.contains("test") || module.contains("test") {
        "test"
    } else if ["create", "get", "list", "update", "delete"]
        .iter()
        .any(|w| name.contains(w))
    {
        "api"
    } else if ["read", "write", "load", "save", "open", "export", "import", "fetch"]
        .iter()
        .any(|w| name.contains(w))
    {
        "io"
    } else if ["util", "helper", "common"].iter().any(|w| module.contains(w)) {
        "util"
    } else if module.contains("core") || module.contains("engine") {
        "core"
    } else {
        "internal"
    }
}

/// Coarse module category from the module path; same value set as
/// [`function_category`].
pub fn module_category(module: &str) -> &'static str {
    let lowered = module.to_lowercase();
    if lowered.contains("api") || lowered.contains("client") {
        "api"
    } else if lowered.contains("test") {
        "test"
    } else if ["util", "helper", "common"].iter().any(|w| lowered.contains(w)) {
        "util"
    } else if lowered
        .split('.')
        .any(|segment| matches!(segment, "io" | "net" | "fs" | "storage" | "files"))
    {
        "io"
    } else if lowered.contains("core") || lowered.contains("engine") {
        "core"
    } else {
        "internal"
    }
}

/// Why a file was skipped or flagged during the scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    Oversized { size: u64, limit: u64 },
    Binary,
    SyntaxError,
    ParseTimeout,
    ReadError(String),
    OutsideRoot,
    DuplicateEntity(String),
}

/// A per-file warning surfaced in the parse outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub file: String,
    pub reason: SkipReason,
}

impl ParseWarning {
    pub fn describe(&self) -> String {
        match &self.reason {
            SkipReason::Oversized { size, limit } => format!(
                "{}: skipped, {size} bytes exceeds the {limit} byte limit",
                self.file
            ),
            SkipReason::Binary => format!("{}: skipped, binary content", self.file),
            SkipReason::SyntaxError => format!("{}: skipped, file does not parse", self.file),
            SkipReason::ParseTimeout => format!("{}: skipped, parse timed out", self.file),
            SkipReason::ReadError(e) => format!("{}: skipped, read failed: {e}", self.file),
            SkipReason::OutsideRoot => format!("{}: skipped, resolves outside the checkout", self.file),
            SkipReason::DuplicateEntity(name) => {
                format!("{}: duplicate entity {name}, first occurrence kept", self.file)
            }
        }
    }
}

/// Parse outcome for a whole checkout.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub functions: Vec<ParsedFunction>,
    pub classes: Vec<ParsedClass>,
    pub modules: Vec<ParsedModule>,
    pub warnings: Vec<ParseWarning>,
    pub files_parsed: usize,
    pub files_skipped: usize,
}

impl ParseOutcome {
    /// All entities as the tagged-variant sequence the mapper consumes.
    pub fn entities(&self) -> impl Iterator<Item = ParsedEntity> + '_ {
        self.functions
            .iter()
            .cloned()
            .map(ParsedEntity::Function)
            .chain(self.classes.iter().cloned().map(ParsedEntity::Class))
            .chain(self.modules.iter().cloned().map(ParsedEntity::Module))
    }
}

/// Scan limits and worker settings.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub max_file_size_bytes: u64,
    pub max_concurrent_parsers: usize,
    pub per_file_timeout: Duration,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            max_file_size_bytes: 10 * 1024 * 1024,
            max_concurrent_parsers: 4,
            per_file_timeout: Duration::from_secs(60),
        }
    }
}

/// Result of reading+parsing one file on the worker pool.
struct FileParse {
    file: String,
    module_path: String,
    functions: Vec<ParsedFunction>,
    classes: Vec<ParsedClass>,
    warning: Option<ParseWarning>,
    parsed: bool,
}

/// Parse every Python source file under `root`.
///
/// # Guarantees
/// - Files outside `root` are never read
/// - Output order is deterministic (sorted file order, first parse-order
///   occurrence wins on duplicate identities)
/// - Errors on individual files become warnings; the scan continues
pub fn scan_checkout(
    root: &Path,
    options: &ParseOptions,
    observer: Option<&ProgressObserver>,
    cancel: &CancellationToken,
) -> Result<ParseOutcome> {
    let mut candidates: Vec<(PathBuf, String)> = Vec::new();
    let mut warnings: Vec<ParseWarning> = Vec::new();

    for entry in walkdir::WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e.path()))
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_dir() || path.extension().map_or(true, |ext| ext != "py") {
            continue;
        }
        let rel = relative_path(path, root);
        match validate_path_within_root(path, root) {
            Ok(_) => candidates.push((path.to_path_buf(), rel)),
            Err(_) => {
                warnings.push(ParseWarning {
                    file: rel,
                    reason: SkipReason::OutsideRoot,
                });
            }
        }
    }

    cancel.checkpoint(Stage::Parsing)?;
    let total = candidates.len();
    report(
        observer,
        0.0,
        Stage::Parsing,
        format!("parsing {total} files"),
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.max_concurrent_parsers.max(1))
        .build()
        .map_err(|e| CartographError::source(format!("cannot build parser pool: {e}")))?;

    let parses: Vec<FileParse> = pool.install(|| {
        candidates
            .par_iter()
            .map(|(path, rel)| parse_one_file(path, rel, options, cancel))
            .collect()
    });

    cancel.checkpoint(Stage::Parsing)?;

    let mut outcome = ParseOutcome {
        warnings,
        ..ParseOutcome::default()
    };

    // Sequential merge in sorted file order keeps identity tie-breaks
    // deterministic: first parse-order occurrence wins.
    let mut seen: BTreeMap<(String, String), String> = BTreeMap::new();
    let mut modules: Vec<ParsedModule> = Vec::new();

    for parse in parses {
        if let Some(warning) = parse.warning {
            warn!(file = %warning.file, "{}", warning.describe());
            outcome.warnings.push(warning);
        }
        if !parse.parsed {
            outcome.files_skipped += 1;
            continue;
        }
        outcome.files_parsed += 1;

        let mut top_level = BTreeSet::new();
        let mut function_count = 0usize;
        let mut class_count = 0usize;

        for function in parse.functions {
            let key = (function.module_path.clone(), function.qualified_name.clone());
            if let Some(first_file) = seen.get(&key) {
                outcome.warnings.push(ParseWarning {
                    file: function.file.clone(),
                    reason: SkipReason::DuplicateEntity(format!(
                        "{} (first seen in {first_file})",
                        function.qualified_name
                    )),
                });
                continue;
            }
            seen.insert(key, function.file.clone());
            function_count += 1;
            if function.qualified_name
                == format!("{}.{}", function.module_path, function.name)
            {
                top_level.insert(function.name.clone());
            }
            outcome.functions.push(function);
        }

        for class in parse.classes {
            let key = (class.module_path.clone(), class.qualified_name.clone());
            if let Some(first_file) = seen.get(&key) {
                outcome.warnings.push(ParseWarning {
                    file: class.file.clone(),
                    reason: SkipReason::DuplicateEntity(format!(
                        "{} (first seen in {first_file})",
                        class.qualified_name
                    )),
                });
                continue;
            }
            seen.insert(key, class.file.clone());
            class_count += 1;
            if class.qualified_name == format!("{}.{}", class.module_path, class.name) {
                top_level.insert(class.name.clone());
            }
            outcome.classes.push(class);
        }

        modules.push(ParsedModule {
            path: parse.module_path,
            file: parse.file,
            function_count,
            class_count,
            top_level,
        });
    }

    modules.sort_by(|a, b| a.path.cmp(&b.path));
    outcome.modules = modules;

    report(
        observer,
        100.0,
        Stage::Parsing,
        format!(
            "parsed {} files, skipped {}",
            outcome.files_parsed, outcome.files_skipped
        ),
    );
    Ok(outcome)
}

fn parse_one_file(
    path: &Path,
    rel: &str,
    options: &ParseOptions,
    cancel: &CancellationToken,
) -> FileParse {
    let module_path = module_path_for(rel);
    let empty = |warning: Option<ParseWarning>| FileParse {
        file: rel.to_string(),
        module_path: module_path.clone(),
        functions: Vec::new(),
        classes: Vec::new(),
        warning,
        parsed: false,
    };

    if cancel.is_cancelled() {
        return empty(None);
    }

    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) => {
            return empty(Some(ParseWarning {
                file: rel.to_string(),
                reason: SkipReason::ReadError(e.to_string()),
            }))
        }
    };
    if metadata.len() > options.max_file_size_bytes {
        return empty(Some(ParseWarning {
            file: rel.to_string(),
            reason: SkipReason::Oversized {
                size: metadata.len(),
                limit: options.max_file_size_bytes,
            },
        }));
    }

    let source = match std::fs::read(path) {
        Ok(s) => s,
        Err(e) => {
            return empty(Some(ParseWarning {
                file: rel.to_string(),
                reason: SkipReason::ReadError(e.to_string()),
            }))
        }
    };
    if source.contains(&0u8) {
        return empty(Some(ParseWarning {
            file: rel.to_string(),
            reason: SkipReason::Binary,
        }));
    }

    match python::extract_entities(rel, &module_path, &source, options.per_file_timeout) {
        Ok(Some((functions, classes))) => FileParse {
            file: rel.to_string(),
            module_path,
            functions,
            classes,
            warning: None,
            parsed: true,
        },
        Ok(None) => empty(Some(ParseWarning {
            file: rel.to_string(),
            reason: SkipReason::SyntaxError,
        })),
        Err(_) => empty(Some(ParseWarning {
            file: rel.to_string(),
            reason: SkipReason::ParseTimeout,
        })),
    }
}

/// Dotted module path for a checkout-relative file path.
///
/// `pkg/core.py` -> `pkg.core`; `pkg/__init__.py` -> `pkg`;
/// a top-level `__init__.py` keeps its stem.
pub fn module_path_for(rel_path: &str) -> String {
    let normalized = rel_path.replace('\\', "/");
    let without_ext = normalized.strip_suffix(".py").unwrap_or(&normalized);
    let mut parts: Vec<&str> = without_ext.split('/').filter(|p| !p.is_empty()).collect();
    if parts.len() > 1 && parts.last() == Some(&"__init__") {
        parts.pop();
    }
    parts.join(".")
}

fn relative_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.') && n != "." && n != "..")
        .unwrap_or(false)
}
