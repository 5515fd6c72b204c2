//! Progress reporting and cooperative cancellation.
//!
//! Long-running operations take an optional observer callback and a
//! cancellation token. The token is observed at parser file boundaries,
//! between commit batches and between store transactions; a cancelled
//! build leaves the store in the pre-build committed state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{CartographError, Result};

/// Pipeline stage identifiers surfaced through progress updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Cloning,
    Fetching,
    Discovering,
    Parsing,
    Mapping,
    GitAnalysis,
    ChangeEvents,
    Writing,
    Exporting,
    Cleanup,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Cloning => "cloning",
            Stage::Fetching => "fetching",
            Stage::Discovering => "discovering",
            Stage::Parsing => "parsing",
            Stage::Mapping => "mapping",
            Stage::GitAnalysis => "git-analysis",
            Stage::ChangeEvents => "change-events",
            Stage::Writing => "writing",
            Stage::Exporting => "exporting",
            Stage::Cleanup => "cleanup",
        }
    }
}

/// A single progress update: completion percentage, the stage that
/// produced it and a human-readable message.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub percent: f32,
    pub stage: Stage,
    pub message: String,
}

/// Observer callback for progress updates.
pub type ProgressObserver = dyn Fn(ProgressUpdate) + Send + Sync;

/// Emit a progress update to an optional observer.
pub fn report(observer: Option<&ProgressObserver>, percent: f32, stage: Stage, message: impl Into<String>) {
    if let Some(observer) = observer {
        observer(ProgressUpdate {
            percent,
            stage,
            message: message.into(),
        });
    }
}

/// Cooperative cancellation token, cheap to clone and share across
/// threads.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Error out if cancellation has been requested.
    ///
    /// Call at suspension points: file boundaries, commit batches, and
    /// before each store transaction.
    pub fn checkpoint(&self, stage: Stage) -> Result<()> {
        if self.is_cancelled() {
            return Err(CartographError::cancelled(stage.as_str()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_starts_live() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.checkpoint(Stage::Parsing).unwrap();
    }

    #[test]
    fn cancelled_token_errors_at_checkpoint() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(token.is_cancelled());
        let err = token.checkpoint(Stage::Writing).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Cancelled);
    }

    #[test]
    fn clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn report_without_observer_is_noop() {
        report(None, 50.0, Stage::Parsing, "halfway");
    }
}
