//! Tests for `src/queue/memory.rs`.

use smsgw::queue::{MemoryQueueStore, QueueError, QueueState, QueueStore};

#[test]
fn enqueue_then_list_pending() {
    let store = MemoryQueueStore::new();
    let handle = store.enqueue("+1", "hi").expect("enqueue");

    assert_eq!(store.list(QueueState::Pending).expect("list"), vec![handle]);
    assert!(store.list(QueueState::Tmp).expect("list").is_empty());
}

#[test]
fn second_claim_is_not_found() {
    let store = MemoryQueueStore::new();
    let handle = store.enqueue("+1", "hi").expect("enqueue");

    store
        .move_record(&handle, QueueState::Processing)
        .expect("first claim");
    let err = store
        .move_record(&handle, QueueState::Processing)
        .expect_err("second claim");
    assert!(err.is_not_found());
}

#[test]
fn rejects_moves_out_of_terminal_states() {
    let store = MemoryQueueStore::new();
    let handle = store.insert_raw(QueueState::Sent, "1-a.json", b"{}".to_vec());

    let err = store
        .move_record(&handle, QueueState::Pending)
        .expect_err("sent is terminal");
    assert!(matches!(err, QueueError::InvalidTransition { .. }));
    assert_eq!(store.list(QueueState::Sent).expect("list").len(), 1);
}

#[test]
fn insert_raw_round_trips_bytes() {
    let store = MemoryQueueStore::new();
    let handle = store.insert_raw(QueueState::Processing, "1-a.json", "garbage");

    assert_eq!(store.read(&handle).expect("read"), b"garbage");
    assert_eq!(store.recover().expect("recover"), 1);
    let pending = store.list(QueueState::Pending).expect("list");
    assert_eq!(pending.len(), 1);
    assert_eq!(store.read(&pending[0]).expect("read"), b"garbage");
}
