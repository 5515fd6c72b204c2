//! Configuration loading and validation.
//!
//! The configuration lives at `{root}/config/config.json`, a flat JSON
//! document keyed by snake_case option names. Missing fields take their
//! defaults; out-of-range values are rejected on load and on change, and a
//! rejected change never clobbers the previous configuration.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CartographError, Result};

/// Log level accepted by the `log_level` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Directive string understood by the tracing EnvFilter.
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            // tracing has no level above error; critical collapses to error
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_processing_timeout() -> u64 {
    3600
}

fn default_max_file_size_mb() -> u64 {
    10
}

fn default_max_concurrent_parsers() -> usize {
    4
}

fn default_query_timeout() -> u64 {
    30
}

fn default_parse_file_timeout() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_export_batch_size() -> usize {
    50
}

fn default_require_confirmation() -> bool {
    true
}

/// Process-wide configuration. Constructed once and passed explicitly to
/// the components that need it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base directory for all state (store, repos, exports, config, logs).
    pub storage_root: PathBuf,

    /// Bearer token for private source fetches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    /// Overall per-ingestion deadline, 30..=3600 seconds.
    #[serde(default = "default_processing_timeout")]
    pub processing_timeout_seconds: u64,

    /// Parser hard cap, 1..=100 MB. Larger files are skipped.
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    /// Parallel parse workers, 1..=16.
    #[serde(default = "default_max_concurrent_parsers")]
    pub max_concurrent_parsers: usize,

    /// Per-call SPARQL deadline, 5..=300 seconds.
    #[serde(default = "default_query_timeout")]
    pub query_timeout_seconds: u64,

    /// Per-file parse deadline in seconds; isolates pathological files.
    #[serde(default = "default_parse_file_timeout")]
    pub parse_file_timeout_seconds: u64,

    /// Retry budget for remote fetches.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Streaming batch size used by the exporters.
    #[serde(default = "default_export_batch_size")]
    pub export_batch_size: usize,

    #[serde(default = "default_require_confirmation")]
    pub require_confirmation_for_destructive: bool,
}

impl Config {
    /// Configuration with defaults rooted at `storage_root`.
    pub fn with_root(storage_root: impl Into<PathBuf>) -> Self {
        Config {
            storage_root: storage_root.into(),
            auth_token: None,
            log_level: default_log_level(),
            processing_timeout_seconds: default_processing_timeout(),
            max_file_size_mb: default_max_file_size_mb(),
            max_concurrent_parsers: default_max_concurrent_parsers(),
            query_timeout_seconds: default_query_timeout(),
            parse_file_timeout_seconds: default_parse_file_timeout(),
            max_retries: default_max_retries(),
            export_batch_size: default_export_batch_size(),
            require_confirmation_for_destructive: default_require_confirmation(),
        }
    }

    /// Load the configuration for a storage root.
    ///
    /// A missing config file yields the defaults; a present file is
    /// schema-validated and range-checked.
    pub fn load(storage_root: &Path) -> Result<Self> {
        let path = Self::config_path(storage_root);
        if !path.exists() {
            return Ok(Config::with_root(storage_root));
        }
        let text = fs::read_to_string(&path).map_err(|e| {
            CartographError::configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut config: Config = serde_json::from_str(&text).map_err(|e| {
            CartographError::configuration(format!("invalid config {}: {e}", path.display()))
        })?;
        // The file never overrides where it was found.
        config.storage_root = storage_root.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    /// Persist the configuration to `{root}/config/config.json`.
    pub fn save(&self) -> Result<()> {
        self.validate()?;
        let path = Self::config_path(&self.storage_root);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CartographError::configuration(format!(
                    "cannot create {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| CartographError::configuration(format!("serialize config: {e}")))?;
        fs::write(&path, text).map_err(|e| {
            CartographError::configuration(format!("cannot write {}: {e}", path.display()))
        })?;
        Ok(())
    }

    /// Apply a single `key = value` change.
    ///
    /// Returns the updated configuration; on any error `self` is left
    /// untouched so the prior configuration stays in effect.
    pub fn apply(&self, key: &str, value: &str) -> Result<Config> {
        let mut next = self.clone();
        match key {
            "auth_token" => {
                next.auth_token = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            "log_level" => {
                next.log_level = serde_json::from_value(serde_json::Value::String(
                    value.to_string(),
                ))
                .map_err(|_| {
                    CartographError::configuration(format!(
                        "log_level must be one of debug, info, warning, error, critical (got {value:?})"
                    ))
                })?;
            }
            "processing_timeout_seconds" => next.processing_timeout_seconds = parse_int(key, value)?,
            "max_file_size_mb" => next.max_file_size_mb = parse_int(key, value)?,
            "max_concurrent_parsers" => {
                next.max_concurrent_parsers = parse_int(key, value)? as usize
            }
            "query_timeout_seconds" => next.query_timeout_seconds = parse_int(key, value)?,
            "parse_file_timeout_seconds" => {
                next.parse_file_timeout_seconds = parse_int(key, value)?
            }
            "max_retries" => next.max_retries = parse_int(key, value)? as u32,
            "export_batch_size" => next.export_batch_size = parse_int(key, value)? as usize,
            "require_confirmation_for_destructive" => {
                next.require_confirmation_for_destructive =
                    value.parse::<bool>().map_err(|_| {
                        CartographError::configuration(format!(
                            "{key} must be true or false (got {value:?})"
                        ))
                    })?;
            }
            other => {
                return Err(CartographError::configuration(format!(
                    "unknown option {other:?}"
                )))
            }
        }
        next.validate()?;
        Ok(next)
    }

    /// Range-check every bounded option.
    pub fn validate(&self) -> Result<()> {
        check_range(
            "processing_timeout_seconds",
            self.processing_timeout_seconds,
            30,
            3600,
        )?;
        check_range("max_file_size_mb", self.max_file_size_mb, 1, 100)?;
        check_range(
            "max_concurrent_parsers",
            self.max_concurrent_parsers as u64,
            1,
            16,
        )?;
        check_range("query_timeout_seconds", self.query_timeout_seconds, 5, 300)?;
        check_range(
            "parse_file_timeout_seconds",
            self.parse_file_timeout_seconds,
            1,
            600,
        )?;
        check_range("export_batch_size", self.export_batch_size as u64, 1, 10_000)?;
        Ok(())
    }

    pub fn config_path(storage_root: &Path) -> PathBuf {
        storage_root.join("config").join("config.json")
    }

    pub fn store_dir(&self) -> PathBuf {
        self.storage_root.join("store")
    }

    pub fn repos_dir(&self) -> PathBuf {
        self.storage_root.join("repos")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.storage_root.join("exports")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.storage_root.join("logs")
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_seconds)
    }

    pub fn processing_timeout(&self) -> Duration {
        Duration::from_secs(self.processing_timeout_seconds)
    }

    pub fn parse_file_timeout(&self) -> Duration {
        Duration::from_secs(self.parse_file_timeout_seconds)
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}

fn parse_int(key: &str, value: &str) -> Result<u64> {
    value.parse::<u64>().map_err(|_| {
        CartographError::configuration(format!("{key} must be an integer (got {value:?})"))
    })
}

fn check_range(key: &str, value: u64, min: u64, max: u64) -> Result<()> {
    if value < min || value > max {
        return Err(CartographError::configuration(format!(
            "{key} must be between {min} and {max} (got {value})"
        )));
    }
    Ok(())
}
