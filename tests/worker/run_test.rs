//! Tests for `Worker::run`: recovery on start, polling and shutdown.

use std::sync::Arc;
use std::time::Duration;

use smsgw::delivery::RetryPolicy;
use smsgw::queue::{MemoryQueueStore, QueueState, QueueStore};
use smsgw::worker::{Worker, WorkerSettings};
use tokio::sync::watch;

use crate::support::ScriptedClient;

const RECORD: &str = r#"{"id":"x","number":"+1","text":"hi","received_at":0.0}"#;

fn worker_over(store: &Arc<MemoryQueueStore>, client: &Arc<ScriptedClient>) -> Arc<Worker> {
    Arc::new(Worker::new(
        store.clone(),
        client.clone(),
        WorkerSettings {
            poll_interval: Duration::from_secs(2),
            retry: RetryPolicy::new(1, Duration::ZERO),
        },
    ))
}

#[tokio::test(start_paused = true)]
async fn run_recovers_before_checking_shutdown() {
    let store = Arc::new(MemoryQueueStore::new());
    store.insert_raw(QueueState::Processing, "0000000000001-a.json", RECORD);
    let client = Arc::new(ScriptedClient::succeeding());
    let worker = worker_over(&store, &client);

    let (_tx, rx) = watch::channel(true);
    worker.run(rx).await;

    assert_eq!(store.list(QueueState::Pending).expect("list").len(), 1);
    assert!(store.list(QueueState::Processing).expect("list").is_empty());
    assert_eq!(client.calls(), 0, "shutdown was already requested");
}

#[tokio::test(start_paused = true)]
async fn run_delivers_recovered_and_new_records_then_stops() {
    let store = Arc::new(MemoryQueueStore::new());
    store.insert_raw(QueueState::Processing, "0000000000001-a.json", RECORD);
    let client = Arc::new(ScriptedClient::succeeding());
    let worker = worker_over(&store, &client);

    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn({
        let worker = Arc::clone(&worker);
        async move { worker.run(rx).await }
    });

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(store.list(QueueState::Sent).expect("list").len(), 1);

    // Arrives while the worker is idle; picked up on the next poll.
    store.enqueue("+2", "later").expect("enqueue");
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(store.list(QueueState::Sent).expect("list").len(), 2);
    assert_eq!(client.calls(), 2);

    tx.send(true).expect("worker should be listening");
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("worker should stop promptly")
        .expect("worker task should not panic");
}

#[tokio::test(start_paused = true)]
async fn dropping_the_sender_stops_the_worker() {
    let store = Arc::new(MemoryQueueStore::new());
    let client = Arc::new(ScriptedClient::succeeding());
    let worker = worker_over(&store, &client);

    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn({
        let worker = Arc::clone(&worker);
        async move { worker.run(rx).await }
    });

    tokio::time::sleep(Duration::from_secs(5)).await;
    drop(tx);
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("worker should stop promptly")
        .expect("worker task should not panic");
}

#[tokio::test(start_paused = true)]
async fn shutdown_mid_pass_leaves_unclaimed_records_pending() {
    let store = Arc::new(MemoryQueueStore::new());
    for name in ["0000000000001-a.json", "0000000000002-b.json", "0000000000003-c.json"] {
        store.insert_raw(QueueState::Pending, name, RECORD);
    }
    let client = Arc::new(ScriptedClient::failing());
    let worker = Arc::new(Worker::new(
        store.clone(),
        client.clone(),
        WorkerSettings {
            poll_interval: Duration::from_secs(2),
            retry: RetryPolicy::new(3, Duration::from_secs(5)),
        },
    ));

    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn({
        let worker = Arc::clone(&worker);
        async move { worker.run(rx).await }
    });

    // First record is between retries.
    tokio::time::sleep(Duration::from_secs(1)).await;
    tx.send(true).expect("worker should be listening");
    tokio::time::timeout(Duration::from_secs(30), task)
        .await
        .expect("worker should stop after the current record")
        .expect("worker task should not panic");

    assert_eq!(client.calls(), 3, "only the in-flight record was attempted");
    assert_eq!(store.list(QueueState::Failed).expect("list").len(), 1);
    assert_eq!(store.list(QueueState::Pending).expect("list").len(), 2);
    assert!(store.list(QueueState::Processing).expect("list").is_empty());
}
