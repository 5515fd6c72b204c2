//! Ontology vocabulary and the mapping from parsed entities to RDF
//! triples.
//!
//! The mapper is stateless and deterministic: identical inputs yield
//! identical triple sets. Triples for stable identities are separated
//! from version-scoped triples so the builder can route them to the
//! right graphs. Nothing here touches the store.

use std::collections::BTreeMap;

use oxigraph::model::{Literal, NamedNode, Triple};

use crate::error::{CartographError, Result};
use crate::events::ChangeEvent;
use crate::git::{BranchRecord, CommitRecord, DeveloperRecord, TagRecord};
use crate::parse::{ParsedClass, ParsedFunction, ParsedModule};
use crate::store::schema;

/// Vocabulary IRIs used across all data graphs.
pub mod vocab {
    pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    pub const RDFS_COMMENT: &str = "http://www.w3.org/2000/01/rdf-schema#comment";
    pub const OWL_CLASS: &str = "http://www.w3.org/2002/07/owl#Class";
    pub const OWL_DATATYPE_PROPERTY: &str = "http://www.w3.org/2002/07/owl#DatatypeProperty";
    pub const OWL_OBJECT_PROPERTY: &str = "http://www.w3.org/2002/07/owl#ObjectProperty";

    /// Web of Code: code-entity classes and properties.
    pub mod woc {
        pub const NS: &str = "http://rdf.webofcode.org/woc/";
        pub const FUNCTION: &str = "http://rdf.webofcode.org/woc/Function";
        pub const CLASS: &str = "http://rdf.webofcode.org/woc/Class";
        pub const MODULE: &str = "http://rdf.webofcode.org/woc/Module";
        pub const FUNCTION_IMPLEMENTATION: &str =
            "http://rdf.webofcode.org/woc/FunctionImplementation";
        pub const CLASS_IMPLEMENTATION: &str =
            "http://rdf.webofcode.org/woc/ClassImplementation";
        pub const PARAMETER: &str = "http://rdf.webofcode.org/woc/Parameter";

        pub const CANONICAL_NAME: &str = "http://rdf.webofcode.org/woc/canonicalName";
        pub const MODULE_PATH: &str = "http://rdf.webofcode.org/woc/modulePath";
        pub const EXISTS_IN_VERSION: &str = "http://rdf.webofcode.org/woc/existsInVersion";
        pub const FIRST_SEEN_IN: &str = "http://rdf.webofcode.org/woc/firstSeenIn";
        pub const IMPLEMENTS_FUNCTION: &str = "http://rdf.webofcode.org/woc/implementsFunction";
        pub const IMPLEMENTS_CLASS: &str = "http://rdf.webofcode.org/woc/implementsClass";
        pub const BELONGS_TO_VERSION: &str = "http://rdf.webofcode.org/woc/belongsToVersion";
        pub const HAS_NAME: &str = "http://rdf.webofcode.org/woc/hasName";
        pub const HAS_SIGNATURE: &str = "http://rdf.webofcode.org/woc/hasSignature";
        pub const DEFINED_IN_FILE: &str = "http://rdf.webofcode.org/woc/definedInFile";
        pub const START_LINE: &str = "http://rdf.webofcode.org/woc/startLine";
        pub const END_LINE: &str = "http://rdf.webofcode.org/woc/endLine";
        pub const BODY_LINES: &str = "http://rdf.webofcode.org/woc/bodyLines";
        pub const BODY_HASH: &str = "http://rdf.webofcode.org/woc/bodyHash";
        pub const HAS_RETURN_TYPE: &str = "http://rdf.webofcode.org/woc/hasReturnType";
        pub const HAS_PARAMETER: &str = "http://rdf.webofcode.org/woc/hasParameter";
        pub const HAS_TYPE: &str = "http://rdf.webofcode.org/woc/hasType";
        pub const HAS_DEFAULT: &str = "http://rdf.webofcode.org/woc/hasDefault";
        pub const IS_REQUIRED: &str = "http://rdf.webofcode.org/woc/isRequired";
        pub const VISIBILITY: &str = "http://rdf.webofcode.org/woc/hasVisibility";
        pub const CATEGORY: &str = "http://rdf.webofcode.org/woc/category";
        pub const REFACTOR_SCORE: &str = "http://rdf.webofcode.org/woc/refactorScore";
        pub const CALLS: &str = "http://rdf.webofcode.org/woc/calls";
        pub const PARENT_CLASS: &str = "http://rdf.webofcode.org/woc/parentClass";
        pub const HAS_METHOD: &str = "http://rdf.webofcode.org/woc/hasMethod";
        pub const FUNCTION_COUNT: &str = "http://rdf.webofcode.org/woc/functionCount";
        pub const CLASS_COUNT: &str = "http://rdf.webofcode.org/woc/classCount";
    }

    /// Git provenance.
    pub mod git {
        pub const NS: &str = "http://cartograph.dev/git/";
        pub const COMMIT: &str = "http://cartograph.dev/git/Commit";
        pub const DEVELOPER: &str = "http://cartograph.dev/git/Developer";
        pub const BRANCH: &str = "http://cartograph.dev/git/Branch";
        pub const TAG: &str = "http://cartograph.dev/git/Tag";
        pub const SHA: &str = "http://cartograph.dev/git/sha";
        pub const MESSAGE: &str = "http://cartograph.dev/git/message";
        pub const DATE: &str = "http://cartograph.dev/git/date";
        pub const AUTHOR: &str = "http://cartograph.dev/git/author";
        pub const AUTHOR_NAME: &str = "http://cartograph.dev/git/authorName";
        pub const AUTHOR_EMAIL: &str = "http://cartograph.dev/git/authorEmail";
        pub const MODIFIES_FILE: &str = "http://cartograph.dev/git/modifiesFile";
        pub const MODIFIES: &str = "http://cartograph.dev/git/modifies";
        pub const NAME: &str = "http://cartograph.dev/git/name";
        pub const EMAIL: &str = "http://cartograph.dev/git/email";
        pub const TARGET: &str = "http://cartograph.dev/git/target";
        pub const COMMIT_COUNT: &str = "http://cartograph.dev/git/commitCount";
        pub const FIRST_COMMIT: &str = "http://cartograph.dev/git/firstCommit";
        pub const LAST_COMMIT: &str = "http://cartograph.dev/git/lastCommit";
    }

    /// Change events between versions.
    pub mod abc {
        pub const NS: &str = "http://cartograph.dev/abc/";
        pub const CHANGE_EVENT: &str = "http://cartograph.dev/abc/ChangeEvent";
        pub const KIND: &str = "http://cartograph.dev/abc/kind";
        pub const FROM_VERSION: &str = "http://cartograph.dev/abc/fromVersion";
        pub const TO_VERSION: &str = "http://cartograph.dev/abc/toVersion";
        pub const AFFECTS: &str = "http://cartograph.dev/abc/affects";
        pub const INTRODUCED_BY: &str = "http://cartograph.dev/abc/introducedBy";
    }

    /// Evolution analytics.
    pub mod evo {
        pub const NS: &str = "http://cartograph.dev/evolution/";
        pub const STATISTICS: &str = "http://cartograph.dev/evolution/Statistics";
        pub const PATTERN: &str = "http://cartograph.dev/evolution/Pattern";
        pub const ANALYSIS: &str = "http://cartograph.dev/evolution/Analysis";
        pub const TOTAL_FUNCTIONS: &str = "http://cartograph.dev/evolution/totalFunctionCount";
        pub const PUBLIC_FUNCTIONS: &str = "http://cartograph.dev/evolution/publicFunctionCount";
        pub const PRIVATE_FUNCTIONS: &str =
            "http://cartograph.dev/evolution/privateFunctionCount";
        pub const PATTERN_NAME: &str = "http://cartograph.dev/evolution/patternName";
        pub const FREQUENCY: &str = "http://cartograph.dev/evolution/frequency";
        pub const VERSION: &str = "http://cartograph.dev/evolution/version";
        pub const FUNCTION_COUNT: &str = "http://cartograph.dev/evolution/functionCount";
        pub const CLASS_COUNT: &str = "http://cartograph.dev/evolution/classCount";
    }

    /// File structure.
    pub mod files {
        pub const NS: &str = "http://cartograph.dev/files/";
        pub const SOURCE_FILE: &str = "http://cartograph.dev/files/SourceFile";
        pub const PATH: &str = "http://cartograph.dev/files/path";
        pub const CONTAINS_FUNCTION: &str = "http://cartograph.dev/files/containsFunction";
    }

    /// Build metadata.
    pub mod meta {
        pub const BUILD_RECORD: &str = "http://cartograph.dev/meta/BuildRecord";
        pub const VERSION: &str = "http://cartograph.dev/meta/version";
        pub const FUNCTIONS_FOUND: &str = "http://cartograph.dev/meta/functionsFound";
        pub const CLASSES_FOUND: &str = "http://cartograph.dev/meta/classesFound";
        pub const MODULES_FOUND: &str = "http://cartograph.dev/meta/modulesFound";
        pub const FILES_PROCESSED: &str = "http://cartograph.dev/meta/filesProcessed";
    }
}

/// Identity of the version being mapped.
#[derive(Debug, Clone, Copy)]
pub struct VersionContext<'a> {
    pub org: &'a str,
    pub repo: &'a str,
    pub version: &'a str,
}

fn node(uri: &str) -> Result<NamedNode> {
    NamedNode::new(uri)
        .map_err(|e| CartographError::validation(format!("invalid IRI {uri:?}: {e}")))
}

fn obj(subject: &str, predicate: &str, object: &str) -> Result<Triple> {
    Ok(Triple::new(node(subject)?, node(predicate)?, node(object)?))
}

fn lit(subject: &str, predicate: &str, value: &str) -> Result<Triple> {
    Ok(Triple::new(
        node(subject)?,
        node(predicate)?,
        Literal::new_simple_literal(value),
    ))
}

fn int(subject: &str, predicate: &str, value: i64) -> Result<Triple> {
    Ok(Triple::new(
        node(subject)?,
        node(predicate)?,
        Literal::from(value),
    ))
}

fn boolean(subject: &str, predicate: &str, value: bool) -> Result<Triple> {
    Ok(Triple::new(
        node(subject)?,
        node(predicate)?,
        Literal::from(value),
    ))
}

fn datetime(subject: &str, predicate: &str, iso: &str) -> Result<Triple> {
    Ok(Triple::new(
        node(subject)?,
        node(predicate)?,
        Literal::new_typed_literal(iso, oxigraph::model::vocab::xsd::DATE_TIME),
    ))
}

/// Resolves syntactically called names to stable function URIs.
///
/// A name resolves when it matches a qualified name exactly, or when
/// exactly one qualified name in the version ends with `.{name}`.
/// Ambiguous and unknown names do not resolve; their edges are omitted.
pub struct CallResolver {
    exact: BTreeMap<String, String>,
    by_suffix: BTreeMap<String, Vec<String>>,
}

impl CallResolver {
    pub fn from_functions(
        ctx: VersionContext<'_>,
        functions: &[ParsedFunction],
    ) -> Result<Self> {
        let mut exact = BTreeMap::new();
        let mut by_suffix: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for function in functions {
            let uri = schema::stable_function_uri(ctx.org, ctx.repo, &function.qualified_name)?;
            exact.insert(function.qualified_name.clone(), uri.clone());
            by_suffix
                .entry(function.name.clone())
                .or_default()
                .push(uri);
        }
        Ok(CallResolver { exact, by_suffix })
    }

    pub fn resolve(&self, called: &str) -> Option<&str> {
        if let Some(uri) = self.exact.get(called) {
            return Some(uri);
        }
        // last path segment of a dotted call like `core.create`
        let tail = called.rsplit('.').next().unwrap_or(called);
        match self.by_suffix.get(tail) {
            Some(uris) if uris.len() == 1 => {
                // a dotted call must be consistent with the qualified name
                if called.contains('.') {
                    let qname = self
                        .exact
                        .iter()
                        .find(|(_, uri)| *uri == &uris[0])
                        .map(|(q, _)| q.as_str())?;
                    if !qname.ends_with(&format!(".{called}")) && qname != called {
                        return None;
                    }
                }
                Some(&uris[0])
            }
            _ => None,
        }
    }
}

/// Triples for a function, split by destination graph.
#[derive(Debug, Default)]
pub struct MappedEntity {
    pub stable_uri: String,
    /// Full introduction of a stable identity new to the repository.
    pub stable_intro: Vec<Triple>,
    /// Version-set widening for an already known identity.
    pub stable_widen: Vec<Triple>,
    /// Version-scoped record for the implementations graph.
    pub implementation: Vec<Triple>,
}

/// Map one function for `ctx`. Pure; resolution comes from `calls`.
pub fn map_function(
    ctx: VersionContext<'_>,
    function: &ParsedFunction,
    calls: &CallResolver,
) -> Result<MappedEntity> {
    let stable = schema::stable_function_uri(ctx.org, ctx.repo, &function.qualified_name)?;
    let implementation =
        schema::function_implementation_uri(ctx.org, ctx.repo, &function.qualified_name, ctx.version)?;

    let mut intro = vec![
        obj(&stable, vocab::RDF_TYPE, vocab::woc::FUNCTION)?,
        lit(&stable, vocab::woc::CANONICAL_NAME, &function.qualified_name)?,
        lit(&stable, vocab::woc::MODULE_PATH, &function.module_path)?,
        lit(&stable, vocab::woc::FIRST_SEEN_IN, ctx.version)?,
        lit(&stable, vocab::woc::EXISTS_IN_VERSION, ctx.version)?,
    ];
    let widen = vec![lit(&stable, vocab::woc::EXISTS_IN_VERSION, ctx.version)?];

    let mut impl_triples = vec![
        obj(&implementation, vocab::RDF_TYPE, vocab::woc::FUNCTION_IMPLEMENTATION)?,
        obj(&implementation, vocab::woc::IMPLEMENTS_FUNCTION, &stable)?,
        lit(&implementation, vocab::woc::BELONGS_TO_VERSION, ctx.version)?,
        lit(&implementation, vocab::woc::HAS_NAME, &function.name)?,
        lit(&implementation, vocab::woc::HAS_SIGNATURE, &function.signature)?,
        lit(&implementation, vocab::woc::DEFINED_IN_FILE, &function.file)?,
        int(&implementation, vocab::woc::START_LINE, function.start_line as i64)?,
        int(&implementation, vocab::woc::END_LINE, function.end_line as i64)?,
        int(&implementation, vocab::woc::BODY_LINES, function.body_lines as i64)?,
        lit(&implementation, vocab::woc::BODY_HASH, &function.body_hash)?,
        lit(&implementation, vocab::woc::CATEGORY, function.category())?,
        lit(
            &implementation,
            vocab::woc::REFACTOR_SCORE,
            function.refactor_score().as_str(),
        )?,
        lit(&implementation, vocab::woc::VISIBILITY, function.visibility())?,
    ];
    if let Some(docstring) = &function.docstring {
        impl_triples.push(lit(&implementation, vocab::RDFS_COMMENT, docstring)?);
    }
    if let Some(return_type) = &function.return_type {
        impl_triples.push(lit(&implementation, vocab::woc::HAS_RETURN_TYPE, return_type)?);
    }

    for parameter in &function.parameters {
        let param_uri = format!(
            "{implementation}/param/{}",
            schema::encode_component(&parameter.name)?
        );
        impl_triples.push(obj(&param_uri, vocab::RDF_TYPE, vocab::woc::PARAMETER)?);
        impl_triples.push(obj(&implementation, vocab::woc::HAS_PARAMETER, &param_uri)?);
        impl_triples.push(lit(&param_uri, vocab::woc::HAS_NAME, &parameter.name)?);
        if let Some(type_text) = &parameter.type_text {
            impl_triples.push(lit(&param_uri, vocab::woc::HAS_TYPE, type_text)?);
        }
        if let Some(default_text) = &parameter.default_text {
            impl_triples.push(lit(&param_uri, vocab::woc::HAS_DEFAULT, default_text)?);
        }
        impl_triples.push(boolean(&param_uri, vocab::woc::IS_REQUIRED, parameter.required())?);
    }

    // calls resolve to stable URIs or are omitted
    for called in &function.calls {
        if let Some(target) = calls.resolve(called) {
            if target != stable {
                impl_triples.push(obj(&implementation, vocab::woc::CALLS, target)?);
            }
        }
    }

    intro.sort_by_cached_key(|t| t.to_string());
    Ok(MappedEntity {
        stable_uri: stable,
        stable_intro: intro,
        stable_widen: widen,
        implementation: impl_triples,
    })
}

/// Map one class; same split as functions.
pub fn map_class(ctx: VersionContext<'_>, class: &ParsedClass) -> Result<MappedEntity> {
    let stable = schema::stable_class_uri(ctx.org, ctx.repo, &class.qualified_name)?;
    let implementation =
        schema::class_implementation_uri(ctx.org, ctx.repo, &class.qualified_name, ctx.version)?;

    let mut intro = vec![
        obj(&stable, vocab::RDF_TYPE, vocab::woc::CLASS)?,
        lit(&stable, vocab::woc::CANONICAL_NAME, &class.qualified_name)?,
        lit(&stable, vocab::woc::MODULE_PATH, &class.module_path)?,
        lit(&stable, vocab::woc::FIRST_SEEN_IN, ctx.version)?,
        lit(&stable, vocab::woc::EXISTS_IN_VERSION, ctx.version)?,
    ];
    let widen = vec![lit(&stable, vocab::woc::EXISTS_IN_VERSION, ctx.version)?];

    let mut impl_triples = vec![
        obj(&implementation, vocab::RDF_TYPE, vocab::woc::CLASS_IMPLEMENTATION)?,
        obj(&implementation, vocab::woc::IMPLEMENTS_CLASS, &stable)?,
        lit(&implementation, vocab::woc::BELONGS_TO_VERSION, ctx.version)?,
        lit(&implementation, vocab::woc::HAS_NAME, &class.name)?,
        lit(&implementation, vocab::woc::HAS_SIGNATURE, &class.signature_text())?,
        lit(&implementation, vocab::woc::BODY_HASH, &class.content_hash())?,
        lit(&implementation, vocab::woc::DEFINED_IN_FILE, &class.file)?,
        int(&implementation, vocab::woc::START_LINE, class.start_line as i64)?,
        int(&implementation, vocab::woc::END_LINE, class.end_line as i64)?,
        lit(
            &implementation,
            vocab::woc::CATEGORY,
            crate::parse::module_category(&class.module_path),
        )?,
        lit(
            &implementation,
            vocab::woc::REFACTOR_SCORE,
            class.refactor_score().as_str(),
        )?,
    ];
    if let Some(docstring) = &class.docstring {
        impl_triples.push(lit(&implementation, vocab::RDFS_COMMENT, docstring)?);
    }
    for parent in &class.parents {
        impl_triples.push(lit(&implementation, vocab::woc::PARENT_CLASS, parent)?);
    }
    for method in &class.methods {
        impl_triples.push(lit(&implementation, vocab::woc::HAS_METHOD, method)?);
    }

    intro.sort_by_cached_key(|t| t.to_string());
    Ok(MappedEntity {
        stable_uri: stable,
        stable_intro: intro,
        stable_widen: widen,
        implementation: impl_triples,
    })
}

/// Map one module record; destined for the version's files graph.
pub fn map_module(ctx: VersionContext<'_>, module: &ParsedModule) -> Result<Vec<Triple>> {
    let uri = schema::module_uri(ctx.org, ctx.repo, &module.path, ctx.version)?;
    Ok(vec![
        obj(&uri, vocab::RDF_TYPE, vocab::woc::MODULE)?,
        lit(&uri, vocab::woc::MODULE_PATH, &module.path)?,
        lit(&uri, vocab::woc::DEFINED_IN_FILE, &module.file)?,
        lit(&uri, vocab::woc::BELONGS_TO_VERSION, ctx.version)?,
        int(&uri, vocab::woc::FUNCTION_COUNT, module.function_count as i64)?,
        int(&uri, vocab::woc::CLASS_COUNT, module.class_count as i64)?,
        lit(&uri, vocab::woc::CATEGORY, module.category())?,
        lit(
            &uri,
            vocab::woc::REFACTOR_SCORE,
            module.refactor_score().as_str(),
        )?,
    ])
}

/// File records for the version's files graph: one SourceFile per parsed
/// file, linked to the implementations it contains.
pub fn map_file_records(
    ctx: VersionContext<'_>,
    modules: &[ParsedModule],
    functions: &[ParsedFunction],
) -> Result<Vec<Triple>> {
    let mut triples = Vec::new();
    for module in modules {
        let file_uri = schema::file_uri(ctx.org, ctx.repo, ctx.version, &module.file)?;
        triples.push(obj(&file_uri, vocab::RDF_TYPE, vocab::files::SOURCE_FILE)?);
        triples.push(lit(&file_uri, vocab::files::PATH, &module.file)?);
        for function in functions.iter().filter(|f| f.file == module.file) {
            let impl_uri = schema::function_implementation_uri(
                ctx.org,
                ctx.repo,
                &function.qualified_name,
                ctx.version,
            )?;
            triples.push(obj(&file_uri, vocab::files::CONTAINS_FUNCTION, &impl_uri)?);
        }
    }
    Ok(triples)
}

/// Build-record triples for the version's metadata graph.
///
/// Deterministic by construction: ingesting the same checkout twice
/// writes the same record.
pub fn map_build_metadata(
    ctx: VersionContext<'_>,
    functions: usize,
    classes: usize,
    modules: usize,
    files: usize,
) -> Result<Vec<Triple>> {
    let uri = format!(
        "{}#build",
        schema::meta_graph(ctx.org, ctx.repo, ctx.version)?
    );
    Ok(vec![
        obj(&uri, vocab::RDF_TYPE, vocab::meta::BUILD_RECORD)?,
        lit(&uri, vocab::meta::VERSION, ctx.version)?,
        int(&uri, vocab::meta::FUNCTIONS_FOUND, functions as i64)?,
        int(&uri, vocab::meta::CLASSES_FOUND, classes as i64)?,
        int(&uri, vocab::meta::MODULES_FOUND, modules as i64)?,
        int(&uri, vocab::meta::FILES_PROCESSED, files as i64)?,
    ])
}

/// Commit triples. The author email is always a plain string literal.
pub fn map_commit(org: &str, repo: &str, commit: &CommitRecord) -> Result<Vec<Triple>> {
    let uri = schema::commit_uri(org, repo, &commit.sha)?;
    let mut triples = vec![
        obj(&uri, vocab::RDF_TYPE, vocab::git::COMMIT)?,
        lit(&uri, vocab::git::SHA, &commit.sha)?,
        lit(&uri, vocab::git::MESSAGE, &commit.message)?,
        datetime(&uri, vocab::git::DATE, &commit.timestamp)?,
        lit(&uri, vocab::git::AUTHOR_NAME, &commit.author_name)?,
        lit(&uri, vocab::git::AUTHOR_EMAIL, &commit.author_email)?,
    ];
    let author = schema::developer_uri(org, repo, &commit.author_email)?;
    triples.push(obj(&uri, vocab::git::AUTHOR, &author)?);
    for file in &commit.files {
        triples.push(lit(&uri, vocab::git::MODIFIES_FILE, file)?);
    }
    Ok(triples)
}

/// `git:modifies` edges from a commit to stable entities whose defining
/// files it touched. Edges terminate at stable URIs only.
pub fn map_commit_entity_links(
    org: &str,
    repo: &str,
    commit: &CommitRecord,
    stable_by_file: &BTreeMap<String, Vec<String>>,
) -> Result<Vec<Triple>> {
    let uri = schema::commit_uri(org, repo, &commit.sha)?;
    let mut triples = Vec::new();
    for file in &commit.files {
        if let Some(stable_uris) = stable_by_file.get(file) {
            for stable in stable_uris {
                triples.push(obj(&uri, vocab::git::MODIFIES, stable)?);
            }
        }
    }
    Ok(triples)
}

pub fn map_developer(org: &str, repo: &str, developer: &DeveloperRecord) -> Result<Vec<Triple>> {
    let uri = schema::developer_uri(org, repo, &developer.email)?;
    Ok(vec![
        obj(&uri, vocab::RDF_TYPE, vocab::git::DEVELOPER)?,
        lit(&uri, vocab::git::NAME, &developer.name)?,
        lit(&uri, vocab::git::EMAIL, &developer.email)?,
        int(&uri, vocab::git::COMMIT_COUNT, developer.commit_count as i64)?,
        datetime(&uri, vocab::git::FIRST_COMMIT, &developer.first_seen)?,
        datetime(&uri, vocab::git::LAST_COMMIT, &developer.last_seen)?,
    ])
}

pub fn map_branch(org: &str, repo: &str, branch: &BranchRecord) -> Result<Vec<Triple>> {
    let uri = format!(
        "{}#{}",
        schema::git_branches_graph(org, repo)?,
        schema::encode_component(&branch.name)?
    );
    Ok(vec![
        obj(&uri, vocab::RDF_TYPE, vocab::git::BRANCH)?,
        lit(&uri, vocab::git::NAME, &branch.name)?,
        lit(&uri, vocab::git::TARGET, &branch.target_sha)?,
    ])
}

pub fn map_tag(org: &str, repo: &str, tag: &TagRecord) -> Result<Vec<Triple>> {
    let uri = format!(
        "{}#{}",
        schema::git_tags_graph(org, repo)?,
        schema::encode_component(&tag.name)?
    );
    Ok(vec![
        obj(&uri, vocab::RDF_TYPE, vocab::git::TAG)?,
        lit(&uri, vocab::git::NAME, &tag.name)?,
        lit(&uri, vocab::git::TARGET, &tag.target_sha)?,
    ])
}

/// Change-event triples. Events reference stable URIs only.
pub fn map_change_event(org: &str, repo: &str, event: &ChangeEvent) -> Result<Vec<Triple>> {
    let uri = schema::event_uri(
        org,
        repo,
        &event.entity_qualified_name,
        &event.from_version,
        &event.to_version,
        event.kind.as_str(),
    )?;
    let mut triples = vec![
        obj(&uri, vocab::RDF_TYPE, vocab::abc::CHANGE_EVENT)?,
        lit(&uri, vocab::abc::KIND, event.kind.as_str())?,
        lit(&uri, vocab::abc::FROM_VERSION, &event.from_version)?,
        lit(&uri, vocab::abc::TO_VERSION, &event.to_version)?,
        obj(&uri, vocab::abc::AFFECTS, &event.stable_uri)?,
    ];
    if let Some(sha) = &event.commit_sha {
        let commit = schema::commit_uri(org, repo, sha)?;
        triples.push(obj(&uri, vocab::abc::INTRODUCED_BY, &commit)?);
    }
    Ok(triples)
}

/// Seed triples for the four shared ontology graphs, loaded once.
pub fn ontology_graphs() -> Result<Vec<(String, Vec<Triple>)>> {
    let classes = |uris: &[&str]| -> Result<Vec<Triple>> {
        uris.iter().map(|u| obj(u, vocab::RDF_TYPE, vocab::OWL_CLASS)).collect()
    };
    let props = |uris: &[&str], kind: &str| -> Result<Vec<Triple>> {
        uris.iter().map(|u| obj(u, vocab::RDF_TYPE, kind)).collect()
    };

    let mut code = classes(&[
        vocab::woc::FUNCTION,
        vocab::woc::CLASS,
        vocab::woc::MODULE,
        vocab::woc::FUNCTION_IMPLEMENTATION,
        vocab::woc::CLASS_IMPLEMENTATION,
        vocab::woc::PARAMETER,
    ])?;
    code.extend(props(
        &[
            vocab::woc::CANONICAL_NAME,
            vocab::woc::MODULE_PATH,
            vocab::woc::EXISTS_IN_VERSION,
            vocab::woc::FIRST_SEEN_IN,
            vocab::woc::BELONGS_TO_VERSION,
            vocab::woc::HAS_NAME,
            vocab::woc::HAS_SIGNATURE,
            vocab::woc::DEFINED_IN_FILE,
            vocab::woc::START_LINE,
            vocab::woc::END_LINE,
            vocab::woc::BODY_LINES,
            vocab::woc::BODY_HASH,
            vocab::woc::CATEGORY,
            vocab::woc::REFACTOR_SCORE,
        ],
        vocab::OWL_DATATYPE_PROPERTY,
    )?);
    code.extend(props(
        &[
            vocab::woc::IMPLEMENTS_FUNCTION,
            vocab::woc::IMPLEMENTS_CLASS,
            vocab::woc::HAS_PARAMETER,
            vocab::woc::CALLS,
        ],
        vocab::OWL_OBJECT_PROPERTY,
    )?);

    let mut git = classes(&[
        vocab::git::COMMIT,
        vocab::git::DEVELOPER,
        vocab::git::BRANCH,
        vocab::git::TAG,
    ])?;
    git.extend(props(
        &[
            vocab::git::SHA,
            vocab::git::MESSAGE,
            vocab::git::DATE,
            vocab::git::AUTHOR_NAME,
            vocab::git::AUTHOR_EMAIL,
            vocab::git::NAME,
            vocab::git::EMAIL,
            vocab::git::TARGET,
            vocab::git::COMMIT_COUNT,
        ],
        vocab::OWL_DATATYPE_PROPERTY,
    )?);
    git.extend(props(
        &[vocab::git::AUTHOR, vocab::git::MODIFIES],
        vocab::OWL_OBJECT_PROPERTY,
    )?);

    let mut evolution = classes(&[
        vocab::abc::CHANGE_EVENT,
        vocab::evo::STATISTICS,
        vocab::evo::PATTERN,
        vocab::evo::ANALYSIS,
    ])?;
    evolution.extend(props(
        &[
            vocab::abc::KIND,
            vocab::abc::FROM_VERSION,
            vocab::abc::TO_VERSION,
            vocab::evo::PATTERN_NAME,
            vocab::evo::FREQUENCY,
        ],
        vocab::OWL_DATATYPE_PROPERTY,
    )?);
    evolution.extend(props(
        &[vocab::abc::AFFECTS, vocab::abc::INTRODUCED_BY],
        vocab::OWL_OBJECT_PROPERTY,
    )?);

    let mut files = classes(&[vocab::files::SOURCE_FILE])?;
    files.extend(props(&[vocab::files::PATH], vocab::OWL_DATATYPE_PROPERTY)?);
    files.extend(props(
        &[vocab::files::CONTAINS_FUNCTION],
        vocab::OWL_OBJECT_PROPERTY,
    )?);

    Ok(vec![
        (schema::ontology_code_graph(), code),
        (schema::ontology_git_graph(), git),
        (schema::ontology_evolution_graph(), evolution),
        (schema::ontology_files_graph(), files),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{ParsedParameter, ParsedFunction};
    use std::collections::BTreeSet;

    fn sample_function() -> ParsedFunction {
        ParsedFunction {
            qualified_name: "acme.lib.core.create".to_string(),
            name: "create".to_string(),
            module_path: "acme.lib.core".to_string(),
            parameters: vec![ParsedParameter {
                name: "path".to_string(),
                type_text: Some("str".to_string()),
                default_text: None,
            }],
            return_type: Some("Thing".to_string()),
            docstring: Some("Create a thing.".to_string()),
            signature: "def create(path: str) -> Thing".to_string(),
            file: "core.py".to_string(),
            start_line: 10,
            end_line: 20,
            body_lines: 10,
            body_hash: "abc123".to_string(),
            calls: BTreeSet::new(),
        }
    }

    fn ctx() -> VersionContext<'static> {
        VersionContext {
            org: "acme",
            repo: "lib",
            version: "v1",
        }
    }

    #[test]
    fn mapper_is_deterministic() {
        let function = sample_function();
        let resolver = CallResolver::from_functions(ctx(), &[function.clone()]).unwrap();
        let a = map_function(ctx(), &function, &resolver).unwrap();
        let b = map_function(ctx(), &function, &resolver).unwrap();
        let fmt = |triples: &[Triple]| -> Vec<String> {
            triples.iter().map(|t| t.to_string()).collect()
        };
        assert_eq!(fmt(&a.stable_intro), fmt(&b.stable_intro));
        assert_eq!(fmt(&a.implementation), fmt(&b.implementation));
    }

    #[test]
    fn implementation_references_stable_identity() {
        let function = sample_function();
        let resolver = CallResolver::from_functions(ctx(), &[function.clone()]).unwrap();
        let mapped = map_function(ctx(), &function, &resolver).unwrap();
        assert_eq!(mapped.stable_uri, "function:acme/lib/acme.lib.core.create");

        let impl_subject = "function:acme/lib/acme.lib.core.create#v1";
        let has_link = mapped.implementation.iter().any(|t| {
            t.subject.to_string().contains(impl_subject)
                && t.predicate.as_str() == vocab::woc::IMPLEMENTS_FUNCTION
        });
        assert!(has_link, "implementation must link its stable identity");
    }

    #[test]
    fn stable_intro_never_mentions_implementation_uri() {
        let function = sample_function();
        let resolver = CallResolver::from_functions(ctx(), &[function.clone()]).unwrap();
        let mapped = map_function(ctx(), &function, &resolver).unwrap();
        for triple in &mapped.stable_intro {
            assert!(
                !triple.to_string().contains("#v1"),
                "stable triple mentions a version-scoped URI: {triple}"
            );
        }
    }

    #[test]
    fn widening_is_a_single_version_triple() {
        let function = sample_function();
        let resolver = CallResolver::from_functions(ctx(), &[function.clone()]).unwrap();
        let mapped = map_function(ctx(), &function, &resolver).unwrap();
        assert_eq!(mapped.stable_widen.len(), 1);
        let widen = mapped.stable_widen[0].to_string();
        assert!(widen.contains("existsInVersion"));
        assert!(widen.contains("v1"));
    }

    #[test]
    fn call_resolution_exact_and_suffix() {
        let mut caller = sample_function();
        caller.qualified_name = "acme.lib.app.run".to_string();
        caller.name = "run".to_string();
        caller.calls = ["create".to_string(), "unknown_fn".to_string()]
            .into_iter()
            .collect();
        let target = sample_function();
        let resolver =
            CallResolver::from_functions(ctx(), &[caller.clone(), target]).unwrap();

        assert_eq!(
            resolver.resolve("create"),
            Some("function:acme/lib/acme.lib.core.create")
        );
        assert_eq!(
            resolver.resolve("acme.lib.core.create"),
            Some("function:acme/lib/acme.lib.core.create")
        );
        assert_eq!(resolver.resolve("unknown_fn"), None);

        let mapped = map_function(ctx(), &caller, &resolver).unwrap();
        let call_edges: Vec<_> = mapped
            .implementation
            .iter()
            .filter(|t| t.predicate.as_str() == vocab::woc::CALLS)
            .collect();
        assert_eq!(call_edges.len(), 1);
    }

    #[test]
    fn ambiguous_suffix_does_not_resolve() {
        let mut a = sample_function();
        a.qualified_name = "acme.one.create".to_string();
        let mut b = sample_function();
        b.qualified_name = "acme.two.create".to_string();
        let resolver = CallResolver::from_functions(ctx(), &[a, b]).unwrap();
        assert_eq!(resolver.resolve("create"), None);
    }

    #[test]
    fn ontology_graphs_are_four() {
        let graphs = ontology_graphs().unwrap();
        assert_eq!(graphs.len(), 4);
        for (uri, triples) in &graphs {
            assert!(uri.starts_with("http://cartograph.dev/ontology/"));
            assert!(!triples.is_empty());
        }
    }

    #[test]
    fn commit_email_is_plain_literal() {
        let commit = CommitRecord {
            sha: "abc123".to_string(),
            author_name: "Dev".to_string(),
            author_email: "1234567@example.com".to_string(),
            timestamp: "2024-01-01T00:00:00+00:00".to_string(),
            message: "initial".to_string(),
            files: vec!["core.py".to_string()],
        };
        let triples = map_commit("acme", "lib", &commit).unwrap();
        let email = triples
            .iter()
            .find(|t| t.predicate.as_str() == vocab::git::AUTHOR_EMAIL)
            .unwrap();
        // accepted verbatim, never coerced numerically
        assert!(email.to_string().contains("\"1234567@example.com\""));
    }
}
