//! Persistence integration tests
//!
//! Cover the save/load round trip through the aggregator, the dirty-flag
//! save loop, and restart reconciliation of corrupted snapshots.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use oiia::aggregator::{ClickAggregator, CounterStore};
use oiia::countries::CountryCode;
use oiia::persistence::{self, FileStore, SnapshotStore};

fn code(s: &str) -> CountryCode {
    s.parse().unwrap()
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("oiia-persistence-{name}-{}", std::process::id()))
        .join("clicks.json")
}

#[tokio::test]
async fn aggregator_state_survives_a_restart() {
    let store = FileStore::new(temp_path("restart"));
    store.init().await.unwrap();

    let aggregator = ClickAggregator::spawn(CounterStore::new(), 10);
    for _ in 0..3 {
        aggregator.record_click(code("KR")).await.unwrap();
    }
    aggregator.record_click(code("US")).await.unwrap();

    let (seq, counts) = aggregator.pending_snapshot().await.unwrap().unwrap();
    store.save(&counts).await.unwrap();
    aggregator.mark_saved(seq).await.unwrap();

    // Simulate a restart: load from disk into a fresh aggregator
    let persisted = store.load().await.unwrap().unwrap();
    let (restored, corrected) = CounterStore::from_persisted(&persisted);
    assert!(!corrected);

    let restarted = ClickAggregator::spawn(restored, 10);
    let snapshot = restarted.snapshot().await.unwrap();
    assert_eq!(snapshot.total_clicks, 4);
    assert_eq!(snapshot.entries[0].country, code("KR"));
    assert_eq!(snapshot.entries[0].clicks, 3);
}

#[tokio::test]
async fn save_task_flushes_on_shutdown_signal() {
    let store: Arc<dyn SnapshotStore> = Arc::new(FileStore::new(temp_path("shutdown")));
    store.init().await.unwrap();

    let aggregator = ClickAggregator::spawn(CounterStore::new(), 10);
    // Interval long enough that only the shutdown flush can save
    let (shutdown_tx, save_task) =
        persistence::spawn_save_task(aggregator.clone(), Arc::clone(&store), 3600);

    aggregator.record_click(code("KR")).await.unwrap();
    aggregator.record_click(code("KR")).await.unwrap();

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), save_task)
        .await
        .expect("save task should stop after the shutdown flush")
        .unwrap();

    let persisted = store.load().await.unwrap().expect("snapshot must exist");
    assert_eq!(persisted.total_clicks, 2);
    assert_eq!(persisted.country_clicks["KR"], 2);

    // The flush was acknowledged, so nothing is left dirty
    assert!(aggregator.pending_snapshot().await.unwrap().is_none());
}

#[tokio::test]
async fn corrupted_snapshot_is_repaired_on_load() {
    let store = FileStore::new(temp_path("corrupt-counts"));
    store.init().await.unwrap();

    let aggregator = ClickAggregator::spawn(CounterStore::new(), 10);
    aggregator.record_click(code("KR")).await.unwrap();
    let (_, mut counts) = aggregator.pending_snapshot().await.unwrap().unwrap();

    // Corrupt the snapshot the way a bad writer would
    counts.country_clicks.insert("KR".to_string(), -5);
    counts.total_clicks = 100;
    store.save(&counts).await.unwrap();

    let persisted = store.load().await.unwrap().unwrap();
    let (restored, corrected) = CounterStore::from_persisted(&persisted);
    assert!(corrected, "load must flag the snapshot for re-persisting");
    assert_eq!(restored.get(code("KR")), 0);
    assert_eq!(restored.total(), 0);
}
