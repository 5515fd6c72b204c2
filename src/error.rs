//! Error taxonomy for cartograph operations.
//!
//! Every error carries a human-readable message and a list of suggested
//! remediations. Errors partition into kinds; each kind maps to a stable
//! process exit code so callers can branch on failures without parsing
//! message text.

use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, CartographError>;

/// Error kind, used for exit-code partitioning and recovery policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input (bad repository identifier, oversized argument,
    /// whitespace in a version tag). Rejected at entry.
    Validation,
    /// Path escape, update form in a SPARQL query, disallowed characters
    /// in an identifier. Rejected at entry; non-recoverable.
    Security,
    /// Parser failed on a file. Recoverable: skip, warn, continue.
    Source,
    /// History read, clone, or checkout failed.
    Git,
    /// Store transaction or query failed.
    Store,
    /// Remote fetch failed.
    Network,
    /// Export writer or disk failure.
    Export,
    /// Invalid configuration value; prior config retained.
    Configuration,
    /// A per-call or per-operation deadline elapsed.
    Timeout,
    /// Operation cancelled via a cancellation token.
    Cancelled,
}

impl ErrorKind {
    /// Stable process exit code for this kind.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Validation => 2,
            ErrorKind::Security => 3,
            ErrorKind::Source => 4,
            ErrorKind::Git => 5,
            ErrorKind::Store => 6,
            ErrorKind::Network => 7,
            ErrorKind::Export => 8,
            ErrorKind::Configuration => 9,
            ErrorKind::Timeout => 10,
            ErrorKind::Cancelled => 130,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Security => "security",
            ErrorKind::Source => "source",
            ErrorKind::Git => "git",
            ErrorKind::Store => "store",
            ErrorKind::Network => "network",
            ErrorKind::Export => "export",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

/// Typed error for all cartograph operations.
#[derive(Debug, Error)]
pub enum CartographError {
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        suggestions: Vec<String>,
    },

    #[error("security check failed: {message}")]
    Security {
        message: String,
        suggestions: Vec<String>,
    },

    #[error("source parsing failed: {message}")]
    Source {
        message: String,
        suggestions: Vec<String>,
    },

    #[error("git operation failed: {message}")]
    Git {
        message: String,
        suggestions: Vec<String>,
    },

    #[error("store operation failed: {message}")]
    Store {
        message: String,
        suggestions: Vec<String>,
    },

    /// SPARQL text did not parse. The message carries the offending
    /// position as reported by the query parser.
    #[error("query syntax error: {message}")]
    QuerySyntax {
        message: String,
        suggestions: Vec<String>,
    },

    #[error("query timed out after {elapsed:?}")]
    QueryTimeout {
        elapsed: Duration,
        suggestions: Vec<String>,
    },

    #[error("operation timed out after {elapsed:?}: {message}")]
    Timeout {
        message: String,
        elapsed: Duration,
        suggestions: Vec<String>,
    },

    #[error("network operation failed: {message}")]
    Network {
        message: String,
        suggestions: Vec<String>,
    },

    #[error("export failed: {message}")]
    Export {
        message: String,
        suggestions: Vec<String>,
    },

    #[error("invalid configuration: {message}")]
    Configuration {
        message: String,
        suggestions: Vec<String>,
    },

    #[error("operation cancelled during {stage}")]
    Cancelled { stage: String },
}

impl CartographError {
    /// Build a validation error with default remediation hints.
    pub fn validation(message: impl Into<String>) -> Self {
        CartographError::Validation {
            message: message.into(),
            suggestions: vec![
                "Check the command format with --help".to_string(),
                "Verify your input follows the expected pattern".to_string(),
            ],
        }
    }

    pub fn security(message: impl Into<String>) -> Self {
        CartographError::Security {
            message: message.into(),
            suggestions: vec![
                "Avoid path traversal sequences (.. / \\)".to_string(),
                "Use only identifiers with alphanumeric, dot, dash and underscore characters"
                    .to_string(),
            ],
        }
    }

    pub fn source(message: impl Into<String>) -> Self {
        CartographError::Source {
            message: message.into(),
            suggestions: vec![
                "Check that the repository contains valid source code".to_string(),
                "Inspect the logs for the failing file".to_string(),
            ],
        }
    }

    pub fn git(message: impl Into<String>) -> Self {
        CartographError::Git {
            message: message.into(),
            suggestions: vec![
                "Check that the repository URL is correct".to_string(),
                "Verify that git is installed and on PATH".to_string(),
                "Try the git command manually to see the full output".to_string(),
            ],
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        CartographError::Store {
            message: message.into(),
            suggestions: vec![
                "Check available disk space".to_string(),
                "Verify write permissions on the storage root".to_string(),
            ],
        }
    }

    pub fn query_syntax(message: impl Into<String>) -> Self {
        CartographError::QuerySyntax {
            message: message.into(),
            suggestions: vec![
                "Only SPARQL 1.1 SELECT, ASK and CONSTRUCT are accepted".to_string(),
                "Check the query near the reported position".to_string(),
            ],
        }
    }

    pub fn query_timeout(elapsed: Duration) -> Self {
        CartographError::QueryTimeout {
            elapsed,
            suggestions: vec![
                "Narrow the query with a GRAPH clause or a LIMIT".to_string(),
                "Raise query_timeout_seconds in the configuration".to_string(),
            ],
        }
    }

    pub fn timeout(message: impl Into<String>, elapsed: Duration) -> Self {
        CartographError::Timeout {
            message: message.into(),
            elapsed,
            suggestions: vec![
                "Raise processing_timeout_seconds in the configuration".to_string(),
            ],
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        CartographError::Network {
            message: message.into(),
            suggestions: vec![
                "Check your internet connection".to_string(),
                "Retry the operation".to_string(),
            ],
        }
    }

    pub fn export(message: impl Into<String>) -> Self {
        CartographError::Export {
            message: message.into(),
            suggestions: vec![
                "Check available disk space for exports".to_string(),
                "Make sure the semantic graphs exist first".to_string(),
            ],
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        CartographError::Configuration {
            message: message.into(),
            suggestions: vec![
                "Check the allowed range for the option".to_string(),
                "The previous configuration is unchanged".to_string(),
            ],
        }
    }

    pub fn cancelled(stage: impl Into<String>) -> Self {
        CartographError::Cancelled {
            stage: stage.into(),
        }
    }

    /// Taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CartographError::Validation { .. } => ErrorKind::Validation,
            CartographError::Security { .. } => ErrorKind::Security,
            CartographError::Source { .. } => ErrorKind::Source,
            CartographError::Git { .. } => ErrorKind::Git,
            CartographError::Store { .. } => ErrorKind::Store,
            CartographError::QuerySyntax { .. } => ErrorKind::Store,
            CartographError::QueryTimeout { .. } => ErrorKind::Timeout,
            CartographError::Timeout { .. } => ErrorKind::Timeout,
            CartographError::Network { .. } => ErrorKind::Network,
            CartographError::Export { .. } => ErrorKind::Export,
            CartographError::Configuration { .. } => ErrorKind::Configuration,
            CartographError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Suggested remediations, if any.
    pub fn suggestions(&self) -> &[String] {
        match self {
            CartographError::Validation { suggestions, .. }
            | CartographError::Security { suggestions, .. }
            | CartographError::Source { suggestions, .. }
            | CartographError::Git { suggestions, .. }
            | CartographError::Store { suggestions, .. }
            | CartographError::QuerySyntax { suggestions, .. }
            | CartographError::QueryTimeout { suggestions, .. }
            | CartographError::Timeout { suggestions, .. }
            | CartographError::Network { suggestions, .. }
            | CartographError::Export { suggestions, .. }
            | CartographError::Configuration { suggestions, .. } => suggestions,
            CartographError::Cancelled { .. } => &[],
        }
    }

    /// True for errors that the recovery policy handles locally
    /// (skip-and-continue or retry) rather than surfacing immediately.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Source | ErrorKind::Network
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let kinds = [
            ErrorKind::Validation,
            ErrorKind::Security,
            ErrorKind::Source,
            ErrorKind::Git,
            ErrorKind::Store,
            ErrorKind::Network,
            ErrorKind::Export,
            ErrorKind::Configuration,
            ErrorKind::Timeout,
            ErrorKind::Cancelled,
        ];
        let mut seen = std::collections::HashSet::new();
        for kind in kinds {
            assert!(seen.insert(kind.exit_code()), "duplicate exit code for {:?}", kind);
            assert_ne!(kind.exit_code(), 0);
        }
    }

    #[test]
    fn query_syntax_maps_to_store_kind() {
        let err = CartographError::query_syntax("unexpected token at 1:14");
        assert_eq!(err.kind(), ErrorKind::Store);
    }

    #[test]
    fn suggestions_attached_by_default() {
        let err = CartographError::git("clone failed");
        assert!(!err.suggestions().is_empty());
    }

    #[test]
    fn source_errors_are_recoverable() {
        assert!(CartographError::source("bad file").is_recoverable());
        assert!(!CartographError::security("escape").is_recoverable());
    }
}
