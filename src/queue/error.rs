//! Errors raised by queue stores.

use std::path::PathBuf;

use thiserror::Error;

use super::QueueState;

/// Failure of a queue store operation.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The record is no longer in the expected state. Another claimant
    /// moved it first; callers treat this as a benign race.
    #[error("record {file_name} not found in {state}")]
    NotFound {
        /// State the record was expected in.
        state: QueueState,
        /// File name of the record.
        file_name: String,
    },
    /// The requested move is not an edge of the state machine.
    #[error("invalid transition {from} -> {to}")]
    InvalidTransition {
        /// Source state.
        from: QueueState,
        /// Requested destination state.
        to: QueueState,
    },
    /// Filesystem failure other than a missing source.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A record could not be serialized.
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl QueueError {
    /// Whether this error is the benign "already moved" race.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
