//! Tests for `src/queue/fs.rs`: durability, atomic claims, recovery.

use std::sync::{Arc, Barrier};

use smsgw::queue::{FsQueueStore, MessageRecord, QueueError, QueueState, QueueStore, RecordHandle};

fn open_store() -> (tempfile::TempDir, FsQueueStore) {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let store = FsQueueStore::open(tmp.path().join("queue")).expect("should open store");
    (tmp, store)
}

#[test]
fn enqueue_lands_in_pending_with_nothing_left_in_tmp() {
    let (_tmp, store) = open_store();

    let handle = store.enqueue("+1555", "hello").expect("enqueue");

    assert_eq!(handle.state, QueueState::Pending);
    let path = store.path_of(&handle);
    assert!(path.is_file(), "record should exist in pending");
    assert_eq!(path.parent(), Some(store.state_dir(QueueState::Pending).as_path()));
    let leftovers = std::fs::read_dir(store.state_dir(QueueState::Tmp))
        .expect("read tmp")
        .count();
    assert_eq!(leftovers, 0, "tmp should be empty after enqueue");
}

#[test]
fn enqueued_record_round_trips() {
    let (_tmp, store) = open_store();

    let handle = store.enqueue("+1555", "hello <world>").expect("enqueue");
    let bytes = store.read(&handle).expect("read");
    let record: MessageRecord = serde_json::from_slice(&bytes).expect("valid JSON record");

    assert_eq!(record.number, "+1555");
    assert_eq!(record.text, "hello <world>");
    assert_eq!(record.id, handle.id());
    assert!(record.received_at > 0.0);
}

#[test]
fn list_is_sorted_and_ignores_foreign_entries() {
    let (_tmp, store) = open_store();
    let pending = store.state_dir(QueueState::Pending);
    std::fs::write(pending.join("0000000000002-b.json"), "{}").expect("write");
    std::fs::write(pending.join("0000000000001-a.json"), "{}").expect("write");
    std::fs::write(pending.join("notes.txt"), "x").expect("write");
    std::fs::create_dir(pending.join("nested.json")).expect("mkdir");

    let names: Vec<String> = store
        .list(QueueState::Pending)
        .expect("list")
        .into_iter()
        .map(|h| h.file_name)
        .collect();

    assert_eq!(names, vec!["0000000000001-a.json", "0000000000002-b.json"]);
}

#[test]
fn move_keeps_file_name_and_bytes() {
    let (_tmp, store) = open_store();
    let handle = store.enqueue("+1", "x").expect("enqueue");
    let before = store.read(&handle).expect("read");

    let claimed = store
        .move_record(&handle, QueueState::Processing)
        .expect("claim");
    let sent = store.move_record(&claimed, QueueState::Sent).expect("file");

    assert_eq!(sent.file_name, handle.file_name);
    assert_eq!(store.read(&sent).expect("read"), before);
    assert!(!store.path_of(&handle).exists());
    assert!(!store.path_of(&claimed).exists());
}

#[test]
fn moving_a_vanished_record_is_not_found() {
    let (_tmp, store) = open_store();
    let handle = store.enqueue("+1", "x").expect("enqueue");
    store
        .move_record(&handle, QueueState::Processing)
        .expect("first claim");

    match store.move_record(&handle, QueueState::Processing) {
        Err(QueueError::NotFound { state, file_name }) => {
            assert_eq!(state, QueueState::Pending);
            assert_eq!(file_name, handle.file_name);
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn invalid_transition_is_rejected_before_touching_disk() {
    let (_tmp, store) = open_store();
    let handle = store.enqueue("+1", "x").expect("enqueue");

    let err = store
        .move_record(&handle, QueueState::Sent)
        .expect_err("pending -> sent is not an edge");

    assert!(matches!(
        err,
        QueueError::InvalidTransition {
            from: QueueState::Pending,
            to: QueueState::Sent
        }
    ));
    assert!(store.path_of(&handle).exists(), "record must stay in pending");
}

#[test]
fn exactly_one_of_two_racing_claimants_wins() {
    for _ in 0..50 {
        let (_tmp, store) = open_store();
        let store = Arc::new(store);
        let handle = store.enqueue("+1", "race").expect("enqueue");
        let barrier = Arc::new(Barrier::new(2));

        let claimants: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                let handle = handle.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    store.move_record(&handle, QueueState::Processing)
                })
            })
            .collect();
        let results: Vec<_> = claimants
            .into_iter()
            .map(|t| t.join().expect("claimant thread"))
            .collect();

        let wins = results.iter().filter(|r| r.is_ok()).count();
        let races = results
            .iter()
            .filter(|r| matches!(r, Err(e) if e.is_not_found()))
            .count();
        assert_eq!((wins, races), (1, 1), "results: {results:?}");
        assert_eq!(store.list(QueueState::Processing).expect("list").len(), 1);
        assert!(store.list(QueueState::Pending).expect("list").is_empty());
    }
}

#[test]
fn recover_requeues_processing_records() {
    let (tmp, store) = open_store();
    for text in ["a", "b"] {
        let handle = store.enqueue("+1", text).expect("enqueue");
        store
            .move_record(&handle, QueueState::Processing)
            .expect("claim");
    }
    drop(store);

    // Simulate a restart against the same directory.
    let store = FsQueueStore::open(tmp.path().join("queue")).expect("reopen");
    assert_eq!(store.recover().expect("recover"), 2);

    assert_eq!(store.list(QueueState::Pending).expect("list").len(), 2);
    assert!(store.list(QueueState::Processing).expect("list").is_empty());
}

#[test]
fn recover_on_empty_store_is_a_no_op() {
    let (_tmp, store) = open_store();
    assert_eq!(store.recover().expect("recover"), 0);
}

#[test]
fn read_of_missing_record_is_not_found() {
    let (_tmp, store) = open_store();
    let ghost = RecordHandle::new(QueueState::Pending, "0000000000000-ghost.json");
    assert!(store.read(&ghost).expect_err("missing").is_not_found());
}

#[test]
fn counts_cover_every_state() {
    let (_tmp, store) = open_store();
    let first = store.enqueue("+1", "a").expect("enqueue");
    store.enqueue("+1", "b").expect("enqueue");
    let claimed = store
        .move_record(&first, QueueState::Processing)
        .expect("claim");
    store
        .move_record(&claimed, QueueState::Failed)
        .expect("fail");

    let counts = store.counts().expect("counts");
    assert_eq!(counts.pending, 1);
    assert_eq!(counts.processing, 0);
    assert_eq!(counts.failed, 1);
    assert_eq!(counts.sent, 0);
    assert_eq!(counts.tmp, 0);
}

#[test]
fn move_recreates_a_removed_state_directory() {
    let (_tmp, store) = open_store();
    let handle = store.enqueue("+1", "x").expect("enqueue");
    std::fs::remove_dir(store.state_dir(QueueState::Processing)).expect("remove processing");

    let claimed = store
        .move_record(&handle, QueueState::Processing)
        .expect("claim should succeed, not report a race");

    assert!(store.path_of(&claimed).is_file());
    assert!(!store.path_of(&handle).exists());
}

#[test]
fn enqueue_recreates_removed_tmp_and_pending() {
    let (_tmp, store) = open_store();
    std::fs::remove_dir(store.state_dir(QueueState::Tmp)).expect("remove tmp");
    std::fs::remove_dir(store.state_dir(QueueState::Pending)).expect("remove pending");

    let handle = store.enqueue("+1", "x").expect("enqueue");

    assert!(store.path_of(&handle).is_file());
}
