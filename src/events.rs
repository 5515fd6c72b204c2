//! Change-event generation: diffs two versions of a repository into
//! temporal events over stable identities.
//!
//! The diff is pure set arithmetic over snapshots; attribution of the
//! introducing commit is a separate, best-effort step supplied by the
//! caller.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What changed about a stable entity between two versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    SignatureChanged,
    BodyChanged,
    Moved,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Removed => "removed",
            ChangeKind::SignatureChanged => "signature_changed",
            ChangeKind::BodyChanged => "body_changed",
            ChangeKind::Moved => "moved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "added" => Some(ChangeKind::Added),
            "removed" => Some(ChangeKind::Removed),
            "signature_changed" => Some(ChangeKind::SignatureChanged),
            "body_changed" => Some(ChangeKind::BodyChanged),
            "moved" => Some(ChangeKind::Moved),
            _ => None,
        }
    }
}

/// Comparable facts about one stable entity in one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFacts {
    pub qualified_name: String,
    pub signature: String,
    pub body_hash: String,
    pub file: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// All comparable entities of one version, keyed by stable URI.
#[derive(Debug, Clone, Default)]
pub struct VersionSnapshot {
    pub version: String,
    pub entities: BTreeMap<String, EntityFacts>,
}

impl VersionSnapshot {
    pub fn new(version: impl Into<String>) -> Self {
        VersionSnapshot {
            version: version.into(),
            entities: BTreeMap::new(),
        }
    }
}

/// One detected change, referencing the stable entity only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub stable_uri: String,
    pub entity_qualified_name: String,
    pub from_version: String,
    pub to_version: String,
    pub kind: ChangeKind,
    /// Best-effort: the most recent commit in the target version touching
    /// the defining file.
    pub commit_sha: Option<String>,
}

/// Diff two snapshots of the same repository, `old` strictly below `new`.
///
/// `attribute` maps a defining file path to the sha of the commit that
/// most plausibly introduced the change; it may always return `None`.
pub fn diff_versions(
    old: &VersionSnapshot,
    new: &VersionSnapshot,
    attribute: impl Fn(&str) -> Option<String>,
) -> Vec<ChangeEvent> {
    let mut events = Vec::new();

    for (stable_uri, facts) in &new.entities {
        match old.entities.get(stable_uri) {
            None => {
                events.push(make_event(
                    stable_uri,
                    facts,
                    old,
                    new,
                    ChangeKind::Added,
                    &attribute,
                ));
            }
            Some(previous) => {
                let kind = if previous.signature != facts.signature {
                    Some(ChangeKind::SignatureChanged)
                } else if previous.body_hash != facts.body_hash {
                    Some(ChangeKind::BodyChanged)
                } else if previous.file != facts.file
                    || previous.start_line != facts.start_line
                    || previous.end_line != facts.end_line
                {
                    Some(ChangeKind::Moved)
                } else {
                    None
                };
                if let Some(kind) = kind {
                    events.push(make_event(stable_uri, facts, old, new, kind, &attribute));
                }
            }
        }
    }

    for (stable_uri, facts) in &old.entities {
        if !new.entities.contains_key(stable_uri) {
            events.push(make_event(
                stable_uri,
                facts,
                old,
                new,
                ChangeKind::Removed,
                &attribute,
            ));
        }
    }

    events
}

fn make_event(
    stable_uri: &str,
    facts: &EntityFacts,
    old: &VersionSnapshot,
    new: &VersionSnapshot,
    kind: ChangeKind,
    attribute: &impl Fn(&str) -> Option<String>,
) -> ChangeEvent {
    ChangeEvent {
        stable_uri: stable_uri.to_string(),
        entity_qualified_name: facts.qualified_name.clone(),
        from_version: old.version.clone(),
        to_version: new.version.clone(),
        kind,
        commit_sha: attribute(&facts.file),
    }
}
