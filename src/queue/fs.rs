//! Filesystem-backed queue store.
//!
//! Layout under the base directory:
//!
//! ```text
//! <base>/tmp/         partially written records
//! <base>/pending/     queued
//! <base>/processing/  claimed
//! <base>/sent/
//! <base>/failed/
//! ```
//!
//! All state directories must live on one filesystem so that `rename` is
//! atomic.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::record::{MessageRecord, RECORD_EXTENSION};
use super::{check_transition, QueueError, QueueState, QueueStore, RecordHandle};

/// Queue store over a directory tree.
#[derive(Debug, Clone)]
pub struct FsQueueStore {
    base: PathBuf,
}

impl FsQueueStore {
    /// Open the store at `base`, creating any missing state directory.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Io`] if a directory cannot be created.
    pub fn open(base: impl Into<PathBuf>) -> Result<Self, QueueError> {
        let store = Self { base: base.into() };
        for state in QueueState::ALL {
            let dir = store.state_dir(state);
            fs::create_dir_all(&dir).map_err(|e| QueueError::io(&dir, e))?;
        }
        debug!(base = %store.base.display(), "queue store opened");
        Ok(store)
    }

    /// Base directory.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Directory holding records in `state`.
    pub fn state_dir(&self, state: QueueState) -> PathBuf {
        self.base.join(state.dir_name())
    }

    /// Full path of the record a handle points at.
    pub fn path_of(&self, handle: &RecordHandle) -> PathBuf {
        self.state_dir(handle.state).join(&handle.file_name)
    }
}

impl QueueStore for FsQueueStore {
    fn enqueue(&self, number: &str, text: &str) -> Result<RecordHandle, QueueError> {
        let record = MessageRecord::new(number, text);
        let bytes = serde_json::to_vec(&record)?;
        let file_name = record.file_name();

        let tmp_path = self.state_dir(QueueState::Tmp).join(&file_name);
        let pending_dir = self.state_dir(QueueState::Pending);
        let pending_path = pending_dir.join(&file_name);

        ensure_dir(&self.state_dir(QueueState::Tmp))?;
        ensure_dir(&pending_dir)?;

        if let Err(e) = write_synced(&tmp_path, &bytes) {
            remove_best_effort(&tmp_path);
            return Err(QueueError::io(&tmp_path, e));
        }
        if let Err(e) = fs::rename(&tmp_path, &pending_path) {
            remove_best_effort(&tmp_path);
            return Err(QueueError::io(&pending_path, e));
        }
        sync_dir(&pending_dir);

        debug!(id = %record.id, "record enqueued");
        Ok(RecordHandle::new(QueueState::Pending, file_name))
    }

    fn list(&self, state: QueueState) -> Result<Vec<RecordHandle>, QueueError> {
        let dir = self.state_dir(state);
        let entries = fs::read_dir(&dir).map_err(|e| QueueError::io(&dir, e))?;

        let mut handles = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| QueueError::io(&dir, e))?;
            // Entries can vanish between readdir and stat.
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                handles.push(RecordHandle::new(state, name));
            }
        }
        handles.sort();
        Ok(handles)
    }

    fn move_record(
        &self,
        handle: &RecordHandle,
        to: QueueState,
    ) -> Result<RecordHandle, QueueError> {
        check_transition(handle.state, to)?;

        let src = self.path_of(handle);
        let dst_dir = self.state_dir(to);
        let dst = dst_dir.join(&handle.file_name);
        ensure_dir(&dst_dir)?;

        match fs::rename(&src, &dst) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(QueueError::NotFound {
                    state: handle.state,
                    file_name: handle.file_name.clone(),
                });
            }
            Err(e) => return Err(QueueError::io(&src, e)),
        }
        sync_dir(&dst_dir);

        debug!(id = %handle.id(), from = %handle.state, to = %to, "record moved");
        Ok(handle.in_state(to))
    }

    fn read(&self, handle: &RecordHandle) -> Result<Vec<u8>, QueueError> {
        let path = self.path_of(handle);
        fs::read(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                QueueError::NotFound {
                    state: handle.state,
                    file_name: handle.file_name.clone(),
                }
            } else {
                QueueError::io(&path, e)
            }
        })
    }
}

/// Recreate a state directory removed while the store was open.
fn ensure_dir(dir: &Path) -> Result<(), QueueError> {
    fs::create_dir_all(dir).map_err(|e| QueueError::io(dir, e))
}

/// Write `bytes` to a fresh file and flush data and metadata to disk.
fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn remove_best_effort(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove temp record");
        }
    }
}

/// Flush directory entries after a rename. Failures are logged, not returned.
fn sync_dir(dir: &Path) {
    let handle = match File::open(dir) {
        Ok(handle) => handle,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "cannot open directory for fsync");
            return;
        }
    };
    if let Err(e) = handle.sync_all() {
        warn!(dir = %dir.display(), error = %e, "directory fsync failed");
    }
}
