//! Input validation: identifiers, version tags, file-system paths and
//! SPARQL query text.
//!
//! All file access MUST validate paths before touching the filesystem;
//! path validation is the primary defense against directory traversal.
//! Identifier and query validation run at the public entry points so that
//! malformed or hostile input never reaches the store or the URI mint.

use std::path::{Path, PathBuf};

use crate::error::{CartographError, Result};

/// Maximum accepted length for org/repo identifiers and version tags.
const MAX_IDENTIFIER_LEN: usize = 100;

/// Validate an organization or repository identifier.
///
/// Accepted characters are alphanumerics, dot, dash and underscore.
/// Traversal sequences are a security error rather than a validation
/// error: they indicate an attempt to escape the storage layout.
pub fn validate_identifier(kind: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(CartographError::validation(format!("{kind} must not be empty")));
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(CartographError::validation(format!(
            "{kind} exceeds {MAX_IDENTIFIER_LEN} characters"
        )));
    }
    if value.contains("..") {
        return Err(CartographError::security(format!(
            "{kind} contains a traversal sequence: {value:?}"
        )));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')))
    {
        return Err(CartographError::security(format!(
            "{kind} contains disallowed character {bad:?}: {value:?}"
        )));
    }
    Ok(())
}

/// Split and validate an `org/repo` pair.
pub fn validate_org_repo(org_repo: &str) -> Result<(String, String)> {
    let mut parts = org_repo.splitn(2, '/');
    let org = parts.next().unwrap_or_default();
    let repo = parts.next().ok_or_else(|| {
        CartographError::validation(format!(
            "expected org/repo, got {org_repo:?}"
        ))
    })?;
    validate_identifier("organization", org)?;
    validate_identifier("repository", repo)?;
    Ok((org.to_string(), repo.to_string()))
}

/// Validate a version tag (e.g. `v1.2.3`).
pub fn validate_version_tag(version: &str) -> Result<()> {
    if version.is_empty() {
        return Err(CartographError::validation("version tag must not be empty"));
    }
    if version.len() > MAX_IDENTIFIER_LEN {
        return Err(CartographError::validation(format!(
            "version tag exceeds {MAX_IDENTIFIER_LEN} characters"
        )));
    }
    if version.chars().any(char::is_whitespace) {
        return Err(CartographError::validation(format!(
            "version tag contains whitespace: {version:?}"
        )));
    }
    if version.contains("..") || version.starts_with('/') || version.contains('\\') {
        return Err(CartographError::security(format!(
            "version tag contains path characters: {version:?}"
        )));
    }
    Ok(())
}

/// Check for suspicious path traversal patterns.
///
/// Pre-check that catches obvious attacks even when canonicalization would
/// fail because an intermediate directory does not exist.
pub fn has_suspicious_traversal(path: &str) -> bool {
    let normalized = path.replace('\\', "/");
    normalized.split('/').any(|part| part == "..")
}

/// Canonicalize a path, mapping failures into the taxonomy.
pub fn canonicalize_path(path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path).map_err(|e| {
        CartographError::validation(format!(
            "cannot canonicalize {}: {e}",
            path.display()
        ))
    })
}

/// Validate that a path resolves inside the given root directory.
///
/// 1. Rejects textual traversal sequences before touching the filesystem
/// 2. Canonicalizes both path and root (resolves symlinks, `.`, `..`)
/// 3. Checks the canonical path is prefixed by the canonical root
///
/// Returns the canonical path on success. Any resolved path escaping the
/// root is a security error.
pub fn validate_path_within_root(path: &Path, root: &Path) -> Result<PathBuf> {
    let path_str = path.to_string_lossy();
    if has_suspicious_traversal(&path_str) {
        return Err(CartographError::security(format!(
            "path contains traversal sequences: {path_str}"
        )));
    }

    let canonical_path = canonicalize_path(path)?;
    let canonical_root = canonicalize_path(root)?;

    if !canonical_path.starts_with(&canonical_root) {
        return Err(CartographError::security(format!(
            "path escapes storage root: {} (root: {})",
            canonical_path.display(),
            canonical_root.display()
        )));
    }

    Ok(canonical_path)
}

/// SPARQL update forms, rejected before any store call.
const UPDATE_FORMS: &[&str] = &[
    "INSERT", "DELETE", "LOAD", "CLEAR", "CREATE", "DROP", "COPY", "MOVE", "ADD",
];

/// Reject any SPARQL text containing an update form.
///
/// The scan strips string literals and comments first so that a query
/// mentioning "INSERT" inside a literal is not rejected. This runs before
/// parsing: hostile input must not reach the query engine at all.
pub fn validate_sparql_query(sparql: &str) -> Result<()> {
    let stripped = strip_literals_and_comments(sparql);
    let upper = stripped.to_uppercase();
    for form in UPDATE_FORMS {
        if contains_keyword(&upper, form) {
            return Err(CartographError::security(format!(
                "SPARQL update form {form} is not allowed; only SELECT, ASK and CONSTRUCT are accepted"
            )));
        }
    }
    Ok(())
}

/// Replace quoted literals and `#` comments with spaces, preserving
/// offsets so keyword detection cannot be confused by literal content.
fn strip_literals_and_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' => {
                let quote = c;
                out.push(' ');
                while let Some(inner) = chars.next() {
                    if inner == '\\' {
                        chars.next();
                    } else if inner == quote {
                        break;
                    }
                    out.push(' ');
                }
            }
            '#' => {
                out.push(' ');
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        out.push('\n');
                        break;
                    }
                    out.push(' ');
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Word-boundary keyword check over uppercased text.
fn contains_keyword(upper: &str, keyword: &str) -> bool {
    let bytes = upper.as_bytes();
    let mut start = 0;
    while let Some(pos) = upper[start..].find(keyword) {
        let begin = start + pos;
        let end = begin + keyword.len();
        let before_ok = begin == 0 || !is_word_byte(bytes[begin - 1]);
        let after_ok = end >= bytes.len() || !is_word_byte(bytes[end]);
        if before_ok && after_ok {
            return true;
        }
        start = begin + 1;
    }
    false
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn identifiers_accept_common_names() {
        validate_identifier("organization", "acme").unwrap();
        validate_identifier("repository", "my-lib_2.0").unwrap();
    }

    #[test]
    fn identifiers_reject_traversal_and_separators() {
        assert!(validate_identifier("organization", "..").is_err());
        assert!(validate_identifier("repository", "a/b").is_err());
        assert!(validate_identifier("repository", "a b").is_err());
        assert!(validate_identifier("organization", "").is_err());
    }

    #[test]
    fn org_repo_splits() {
        let (org, repo) = validate_org_repo("acme/lib").unwrap();
        assert_eq!(org, "acme");
        assert_eq!(repo, "lib");
        assert!(validate_org_repo("just-one-part").is_err());
    }

    #[test]
    fn version_tags_reject_whitespace() {
        validate_version_tag("v1.2.3").unwrap();
        assert!(validate_version_tag("v1 .2").is_err());
        assert!(validate_version_tag("").is_err());
        assert!(validate_version_tag("../v1").is_err());
    }

    #[test]
    fn traversal_detection() {
        assert!(has_suspicious_traversal("../../../etc/passwd"));
        assert!(has_suspicious_traversal("..\\config"));
        assert!(has_suspicious_traversal("./subdir/../../etc"));
        assert!(!has_suspicious_traversal("src/main.py"));
        assert!(!has_suspicious_traversal("./src/lib.py"));
    }

    #[test]
    fn path_within_root_valid() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("inside.py");
        fs::write(&file, b"x = 1").unwrap();

        let resolved = validate_path_within_root(&file, dir.path()).unwrap();
        assert!(resolved.starts_with(fs::canonicalize(dir.path()).unwrap()));
    }

    #[test]
    fn path_escaping_root_rejected() {
        let dir = TempDir::new().unwrap();
        let outside = dir.path().join("../../../etc/passwd");
        let err = validate_path_within_root(&outside, dir.path()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Security);
    }

    #[test]
    fn absolute_path_outside_root_rejected() {
        let dir = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let file = other.path().join("f.py");
        fs::write(&file, b"x = 1").unwrap();

        let err = validate_path_within_root(&file, dir.path()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Security);
    }

    #[test]
    fn sparql_select_allowed() {
        validate_sparql_query("SELECT ?f WHERE { ?f a ?t }").unwrap();
        validate_sparql_query("ASK { ?s ?p ?o }").unwrap();
    }

    #[test]
    fn sparql_update_forms_rejected() {
        for q in [
            "INSERT DATA { <a> <b> <c> }",
            "DELETE WHERE { ?s ?p ?o }",
            "DROP GRAPH <http://example.org/g>",
            "CLEAR ALL",
            "LOAD <http://example.org/data>",
            "select ?x where { ?x ?p ?o } ; insert data { <a> <b> <c> }",
        ] {
            let err = validate_sparql_query(q).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Security, "query: {q}");
        }
    }

    #[test]
    fn sparql_keywords_in_literals_allowed() {
        validate_sparql_query(r#"SELECT ?s WHERE { ?s ?p "please INSERT coin" }"#).unwrap();
        validate_sparql_query("SELECT ?s WHERE { ?s ?p ?o } # DROP nothing\n").unwrap();
    }

    #[test]
    fn sparql_substrings_not_rejected() {
        // DELETED is not the DELETE keyword
        validate_sparql_query("SELECT ?s WHERE { ?s <http://x/DELETED> ?o }").unwrap();
    }
}
