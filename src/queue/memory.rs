//! In-memory queue store with the same transition semantics as
//! [`FsQueueStore`](super::FsQueueStore). Nothing survives the process.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::record::MessageRecord;
use super::{check_transition, QueueError, QueueState, QueueStore, RecordHandle};

type Records = BTreeMap<QueueState, BTreeMap<String, Vec<u8>>>;

/// Queue store backed by a mutex-guarded map.
#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    records: Mutex<Records>,
}

impl MemoryQueueStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Place raw bytes in a state without going through `enqueue`.
    ///
    /// Useful for seeding corrupted or crash-leftover records.
    pub fn insert_raw(
        &self,
        state: QueueState,
        file_name: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> RecordHandle {
        let file_name = file_name.into();
        self.lock()
            .entry(state)
            .or_default()
            .insert(file_name.clone(), bytes.into());
        RecordHandle::new(state, file_name)
    }

    fn lock(&self) -> MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl QueueStore for MemoryQueueStore {
    fn enqueue(&self, number: &str, text: &str) -> Result<RecordHandle, QueueError> {
        let record = MessageRecord::new(number, text);
        let bytes = serde_json::to_vec(&record)?;
        Ok(self.insert_raw(QueueState::Pending, record.file_name(), bytes))
    }

    fn list(&self, state: QueueState) -> Result<Vec<RecordHandle>, QueueError> {
        Ok(self
            .lock()
            .get(&state)
            .map(|records| {
                records
                    .keys()
                    .map(|name| RecordHandle::new(state, name.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn move_record(
        &self,
        handle: &RecordHandle,
        to: QueueState,
    ) -> Result<RecordHandle, QueueError> {
        check_transition(handle.state, to)?;

        let mut records = self.lock();
        let bytes = records
            .get_mut(&handle.state)
            .and_then(|source| source.remove(&handle.file_name))
            .ok_or_else(|| QueueError::NotFound {
                state: handle.state,
                file_name: handle.file_name.clone(),
            })?;
        records
            .entry(to)
            .or_default()
            .insert(handle.file_name.clone(), bytes);
        Ok(handle.in_state(to))
    }

    fn read(&self, handle: &RecordHandle) -> Result<Vec<u8>, QueueError> {
        self.lock()
            .get(&handle.state)
            .and_then(|records| records.get(&handle.file_name))
            .cloned()
            .ok_or_else(|| QueueError::NotFound {
                state: handle.state,
                file_name: handle.file_name.clone(),
            })
    }
}
