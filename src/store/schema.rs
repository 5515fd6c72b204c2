//! Deterministic naming of graphs and entities.
//!
//! Every graph and entity URI is minted from its identifying tuple and
//! nothing else: the same inputs always produce the same URI. Stable
//! entity URIs never embed a version; version-scoped record URIs append
//! the version after a `#`.
//!
//! Path components are percent-encoded before minting. Traversal
//! sequences and absolute-path characters are rejected first: they must
//! never reach a URI.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::{CartographError, Result};

/// Base URI under which all graph names live.
pub const BASE_URI: &str = "http://cartograph.dev";

/// Characters left verbatim in encoded components, matching the URI
/// "unreserved" set.
const COMPONENT_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode a single URI component.
///
/// Rejects traversal sequences and absolute-path characters before
/// encoding; everything else (including `/` inside file paths) is
/// escaped.
pub fn encode_component(component: &str) -> Result<String> {
    if component.is_empty() {
        return Err(CartographError::validation("URI component must not be empty"));
    }
    if component.split(['/', '\\']).any(|part| part == "..") {
        return Err(CartographError::security(format!(
            "URI component contains a traversal sequence: {component:?}"
        )));
    }
    if component.starts_with('/') || component.starts_with('\\') {
        return Err(CartographError::security(format!(
            "URI component must not be absolute: {component:?}"
        )));
    }
    Ok(utf8_percent_encode(component, COMPONENT_ESCAPE).to_string())
}

/// Base URI for one repository's graphs.
pub fn repository_base(org: &str, repo: &str) -> Result<String> {
    Ok(format!(
        "{BASE_URI}/repo/{}/{}",
        encode_component(org)?,
        encode_component(repo)?
    ))
}

/// Stable function identities graph. Entities here are never deleted
/// while any implementation references them.
pub fn stable_functions_graph(org: &str, repo: &str) -> Result<String> {
    Ok(format!("{}/functions/stable", repository_base(org, repo)?))
}

/// Common prefix of all per-version implementation graphs.
pub fn implementations_root(org: &str, repo: &str) -> Result<String> {
    Ok(format!(
        "{}/functions/implementations",
        repository_base(org, repo)?
    ))
}

/// Implementation graph for one version. Dropped and rebuilt as a unit.
pub fn implementations_graph(org: &str, repo: &str, version: &str) -> Result<String> {
    Ok(format!(
        "{}/{}",
        implementations_root(org, repo)?,
        encode_component(version)?
    ))
}

/// File structure graph for one version.
pub fn files_graph(org: &str, repo: &str, version: &str) -> Result<String> {
    Ok(format!(
        "{}/files/{}",
        repository_base(org, repo)?,
        encode_component(version)?
    ))
}

/// Build metadata graph for one version.
pub fn meta_graph(org: &str, repo: &str, version: &str) -> Result<String> {
    Ok(format!(
        "{}/meta/{}",
        repository_base(org, repo)?,
        encode_component(version)?
    ))
}

pub fn git_commits_graph(org: &str, repo: &str) -> Result<String> {
    Ok(format!("{}/git/commits", repository_base(org, repo)?))
}

pub fn git_developers_graph(org: &str, repo: &str) -> Result<String> {
    Ok(format!("{}/git/developers", repository_base(org, repo)?))
}

pub fn git_branches_graph(org: &str, repo: &str) -> Result<String> {
    Ok(format!("{}/git/branches", repository_base(org, repo)?))
}

pub fn git_tags_graph(org: &str, repo: &str) -> Result<String> {
    Ok(format!("{}/git/tags", repository_base(org, repo)?))
}

pub fn evolution_analysis_graph(org: &str, repo: &str) -> Result<String> {
    Ok(format!("{}/evolution/analysis", repository_base(org, repo)?))
}

pub fn evolution_statistics_graph(org: &str, repo: &str) -> Result<String> {
    Ok(format!(
        "{}/evolution/statistics",
        repository_base(org, repo)?
    ))
}

pub fn evolution_patterns_graph(org: &str, repo: &str) -> Result<String> {
    Ok(format!("{}/evolution/patterns", repository_base(org, repo)?))
}

/// Change events graph; one per repository, rewritten when a version's
/// incident events change.
pub fn events_graph(org: &str, repo: &str) -> Result<String> {
    Ok(format!("{}/abc/events", repository_base(org, repo)?))
}

/// Ontology graphs, shared across all repositories.
pub fn ontology_code_graph() -> String {
    format!("{BASE_URI}/ontology/code")
}

pub fn ontology_git_graph() -> String {
    format!("{BASE_URI}/ontology/git")
}

pub fn ontology_evolution_graph() -> String {
    format!("{BASE_URI}/ontology/evolution")
}

pub fn ontology_files_graph() -> String {
    format!("{BASE_URI}/ontology/files")
}

/// Stable function identity URI. Never minted from a version.
pub fn stable_function_uri(org: &str, repo: &str, qualified_name: &str) -> Result<String> {
    Ok(format!(
        "function:{}/{}/{}",
        encode_component(org)?,
        encode_component(repo)?,
        encode_component(qualified_name)?
    ))
}

/// Version-scoped function implementation URI.
pub fn function_implementation_uri(
    org: &str,
    repo: &str,
    qualified_name: &str,
    version: &str,
) -> Result<String> {
    Ok(format!(
        "{}#{}",
        stable_function_uri(org, repo, qualified_name)?,
        encode_component(version)?
    ))
}

/// Stable class identity URI.
pub fn stable_class_uri(org: &str, repo: &str, qualified_name: &str) -> Result<String> {
    Ok(format!(
        "class:{}/{}/{}",
        encode_component(org)?,
        encode_component(repo)?,
        encode_component(qualified_name)?
    ))
}

/// Version-scoped class implementation URI.
pub fn class_implementation_uri(
    org: &str,
    repo: &str,
    qualified_name: &str,
    version: &str,
) -> Result<String> {
    Ok(format!(
        "{}#{}",
        stable_class_uri(org, repo, qualified_name)?,
        encode_component(version)?
    ))
}

/// Module record URI; modules are version-scoped.
pub fn module_uri(org: &str, repo: &str, dotted_path: &str, version: &str) -> Result<String> {
    Ok(format!(
        "module:{}/{}/{}#{}",
        encode_component(org)?,
        encode_component(repo)?,
        encode_component(dotted_path)?,
        encode_component(version)?
    ))
}

pub fn commit_uri(org: &str, repo: &str, sha: &str) -> Result<String> {
    Ok(format!(
        "{}/commit/{}",
        repository_base(org, repo)?,
        encode_component(sha)?
    ))
}

pub fn developer_uri(org: &str, repo: &str, email: &str) -> Result<String> {
    Ok(format!(
        "{}/developer/{}",
        repository_base(org, repo)?,
        encode_component(email)?
    ))
}

/// File record URI for a version-scoped file structure entry.
pub fn file_uri(org: &str, repo: &str, version: &str, file_path: &str) -> Result<String> {
    Ok(format!(
        "{}/file/{}/{}",
        repository_base(org, repo)?,
        encode_component(version)?,
        encode_component(file_path)?
    ))
}

/// Change event URI, deterministic in (entity, from, to, kind) so that
/// regenerating the same event is idempotent.
pub fn event_uri(
    org: &str,
    repo: &str,
    entity_qualified_name: &str,
    from_version: &str,
    to_version: &str,
    kind: &str,
) -> Result<String> {
    Ok(format!(
        "{}#{}:{}:{}:{}",
        events_graph(org, repo)?,
        encode_component(kind)?,
        encode_component(from_version)?,
        encode_component(to_version)?,
        encode_component(entity_qualified_name)?
    ))
}

/// GitHub source link, generated on demand and never stored.
pub fn github_link(
    org: &str,
    repo: &str,
    version: &str,
    file_path: &str,
    start_line: Option<usize>,
    end_line: Option<usize>,
) -> String {
    let base = format!("https://github.com/{org}/{repo}/blob/{version}/{file_path}");
    match (start_line, end_line) {
        (Some(start), Some(end)) => format!("{base}#L{start}-L{end}"),
        (Some(start), None) => format!("{base}#L{start}"),
        _ => base,
    }
}

/// Extract the version component from a per-version graph URI, given the
/// prefix it was minted under.
pub fn version_from_graph_uri(graph_uri: &str, prefix: &str) -> Option<String> {
    let rest = graph_uri.strip_prefix(prefix)?.strip_prefix('/')?;
    if rest.is_empty() || rest.contains('/') {
        return None;
    }
    percent_encoding::percent_decode_str(rest)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_uris_are_deterministic() {
        let a = stable_functions_graph("acme", "lib").unwrap();
        let b = stable_functions_graph("acme", "lib").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "http://cartograph.dev/repo/acme/lib/functions/stable");
    }

    #[test]
    fn stable_uri_never_contains_version() {
        let uri = stable_function_uri("acme", "lib", "acme.lib.core.create").unwrap();
        assert_eq!(uri, "function:acme/lib/acme.lib.core.create");
    }

    #[test]
    fn implementation_uri_appends_version() {
        let uri =
            function_implementation_uri("acme", "lib", "acme.lib.core.create", "v1").unwrap();
        assert_eq!(uri, "function:acme/lib/acme.lib.core.create#v1");
    }

    #[test]
    fn traversal_components_rejected() {
        assert!(encode_component("..").is_err());
        assert!(encode_component("a/../b").is_err());
        assert!(encode_component("/etc/passwd").is_err());
        assert!(stable_function_uri("acme", "lib", "../../escape").is_err());
    }

    #[test]
    fn special_characters_are_escaped() {
        let encoded = encode_component("pkg/mod name").unwrap();
        assert_eq!(encoded, "pkg%2Fmod%20name");
        let email = encode_component("dev@example.com").unwrap();
        assert!(email.contains("%40"));
    }

    #[test]
    fn version_round_trips_through_graph_uri() {
        let root = implementations_root("acme", "lib").unwrap();
        let graph = implementations_graph("acme", "lib", "v1.2+build").unwrap();
        assert_eq!(
            version_from_graph_uri(&graph, &root).as_deref(),
            Some("v1.2+build")
        );
        // the root itself is not a version graph
        assert_eq!(version_from_graph_uri(&root, &root), None);
    }

    #[test]
    fn event_uri_deterministic_per_kind() {
        let a = event_uri("acme", "lib", "acme.core.create", "v1", "v2", "removed").unwrap();
        let b = event_uri("acme", "lib", "acme.core.create", "v1", "v2", "removed").unwrap();
        let c = event_uri("acme", "lib", "acme.core.create", "v1", "v2", "added").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn github_links_carry_line_ranges() {
        let link = github_link("acme", "lib", "v1", "core.py", Some(10), Some(20));
        assert_eq!(
            link,
            "https://github.com/acme/lib/blob/v1/core.py#L10-L20"
        );
    }
}
