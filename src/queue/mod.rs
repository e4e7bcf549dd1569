//! Durable message queue.
//!
//! Records live in one directory per [`QueueState`] and move between them
//! by atomic rename:
//!
//! ```text
//! tmp -> pending -> processing -> sent
//!                        |    \-> failed
//!                        \-> pending   (crash recovery)
//! ```
//!
//! A record is in exactly one state at a time. A move whose source has
//! vanished fails with [`QueueError::NotFound`], which is how two workers
//! racing for the same record learn that the other one won.

mod error;
pub mod fs;
pub mod memory;
pub mod record;

use std::fmt;

use serde::Serialize;

pub use error::QueueError;
pub use fs::FsQueueStore;
pub use memory::MemoryQueueStore;
pub use record::{DeliveryPayload, MessageRecord, PayloadError};

/// Lifecycle state of a record. Each state is a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueState {
    /// Being written; never listed by the worker.
    Tmp,
    /// Durably queued, waiting for a worker.
    Pending,
    /// Claimed by a worker.
    Processing,
    /// Delivered. Terminal.
    Sent,
    /// Given up on. Terminal.
    Failed,
}

impl QueueState {
    /// Every state, in lifecycle order.
    pub const ALL: [QueueState; 5] = [
        QueueState::Tmp,
        QueueState::Pending,
        QueueState::Processing,
        QueueState::Sent,
        QueueState::Failed,
    ];

    /// Directory name under the queue base.
    pub fn dir_name(self) -> &'static str {
        match self {
            QueueState::Tmp => "tmp",
            QueueState::Pending => "pending",
            QueueState::Processing => "processing",
            QueueState::Sent => "sent",
            QueueState::Failed => "failed",
        }
    }

    /// Whether records in this state never move again.
    pub fn is_terminal(self) -> bool {
        matches!(self, QueueState::Sent | QueueState::Failed)
    }

    /// Whether `self -> to` is an edge of the state machine.
    pub fn can_transition_to(self, to: QueueState) -> bool {
        matches!(
            (self, to),
            (QueueState::Tmp, QueueState::Pending)
                | (QueueState::Pending, QueueState::Processing)
                | (
                    QueueState::Processing,
                    QueueState::Sent | QueueState::Failed | QueueState::Pending
                )
        )
    }
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Reject moves that are not state machine edges before touching storage.
pub(crate) fn check_transition(from: QueueState, to: QueueState) -> Result<(), QueueError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(QueueError::InvalidTransition { from, to })
    }
}

/// Reference to a record in a particular state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordHandle {
    /// State the record was in when the handle was produced.
    pub state: QueueState,
    /// `<id>.json`, unchanged across moves.
    pub file_name: String,
}

impl RecordHandle {
    /// Handle for `file_name` in `state`.
    pub fn new(state: QueueState, file_name: impl Into<String>) -> Self {
        Self {
            state,
            file_name: file_name.into(),
        }
    }

    /// Record id (the file stem).
    pub fn id(&self) -> &str {
        self.file_name
            .strip_suffix(".json")
            .unwrap_or(&self.file_name)
    }

    /// Same record, different state.
    pub fn in_state(&self, state: QueueState) -> Self {
        Self::new(state, self.file_name.clone())
    }
}

/// Number of records per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    /// Records in `tmp` (left by an interrupted enqueue).
    pub tmp: usize,
    /// Records waiting for delivery.
    pub pending: usize,
    /// Records claimed by a worker.
    pub processing: usize,
    /// Delivered records.
    pub sent: usize,
    /// Records given up on.
    pub failed: usize,
}

impl QueueCounts {
    /// Count for one state.
    pub fn get(&self, state: QueueState) -> usize {
        match state {
            QueueState::Tmp => self.tmp,
            QueueState::Pending => self.pending,
            QueueState::Processing => self.processing,
            QueueState::Sent => self.sent,
            QueueState::Failed => self.failed,
        }
    }

    fn set(&mut self, state: QueueState, count: usize) {
        match state {
            QueueState::Tmp => self.tmp = count,
            QueueState::Pending => self.pending = count,
            QueueState::Processing => self.processing = count,
            QueueState::Sent => self.sent = count,
            QueueState::Failed => self.failed = count,
        }
    }
}

impl fmt::Display for QueueCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for state in QueueState::ALL {
            writeln!(f, "{:<10} {}", state.dir_name(), self.get(state))?;
        }
        Ok(())
    }
}

/// Storage backend for queued records.
///
/// Implementations must make [`QueueStore::move_record`] atomic: of two
/// concurrent moves of the same record, exactly one succeeds and the other
/// returns [`QueueError::NotFound`].
pub trait QueueStore: Send + Sync {
    /// Persist a new record durably into `pending`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when the record cannot be written. No partial
    /// record is left visible in `pending`.
    fn enqueue(&self, number: &str, text: &str) -> Result<RecordHandle, QueueError>;

    /// Snapshot of the records in `state`, sorted by file name.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Io`] when the state cannot be read.
    fn list(&self, state: QueueState) -> Result<Vec<RecordHandle>, QueueError>;

    /// Atomically move a record to another state.
    ///
    /// # Errors
    ///
    /// [`QueueError::InvalidTransition`] for moves outside the state
    /// machine, [`QueueError::NotFound`] when the source is gone.
    fn move_record(&self, handle: &RecordHandle, to: QueueState)
        -> Result<RecordHandle, QueueError>;

    /// Raw bytes of a record.
    ///
    /// # Errors
    ///
    /// [`QueueError::NotFound`] when the record is not in `handle.state`.
    fn read(&self, handle: &RecordHandle) -> Result<Vec<u8>, QueueError>;

    /// Move everything in `processing` back to `pending`.
    ///
    /// Assumes a single worker per store: records claimed by a live
    /// concurrent worker are requeued too. Returns the number requeued.
    ///
    /// # Errors
    ///
    /// Returns the first storage error other than a vanished record.
    fn recover(&self) -> Result<usize, QueueError> {
        let mut requeued: usize = 0;
        for handle in self.list(QueueState::Processing)? {
            match self.move_record(&handle, QueueState::Pending) {
                Ok(_) => requeued = requeued.saturating_add(1),
                Err(e) if e.is_not_found() => {
                    tracing::debug!(id = %handle.id(), "record vanished during recovery");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(requeued)
    }

    /// Per-state record counts.
    ///
    /// # Errors
    ///
    /// Returns the first listing error.
    fn counts(&self) -> Result<QueueCounts, QueueError> {
        let mut counts = QueueCounts::default();
        for state in QueueState::ALL {
            counts.set(state, self.list(state)?.len());
        }
        Ok(counts)
    }
}
