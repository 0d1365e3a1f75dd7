//! Durable snapshot storage for the click counters
//!
//! The aggregator owns the live counters; this module only reads them via
//! snapshots for saving and only writes them back wholesale at startup.
//! Save failures are logged and retried on the next cycle, never surfaced
//! to the click-recording path.

mod file;
mod sqlite;

pub use file::FileStore;
pub use sqlite::SqliteStore;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{error, info, warn};

use crate::aggregator::ClickAggregator;

pub const DATA_VERSION: &str = "1";

/// Durable snapshot format, shared by every backend.
///
/// Counts are signed so that a corrupted snapshot deserializes instead of
/// failing; validation and coercion happen in `CounterStore::from_persisted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedCounts {
    pub country_clicks: BTreeMap<String, i64>,
    pub total_clicks: i64,
    pub last_update: DateTime<Utc>,
    pub data_version: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Prepare the backend (create directories, run migrations).
    async fn init(&self) -> StoreResult<()>;

    /// Read the last saved snapshot. `None` means a clean start; a corrupt
    /// snapshot is also reported as `None` so startup never fails on it.
    async fn load(&self) -> StoreResult<Option<PersistedCounts>>;

    /// Replace the durable snapshot atomically.
    async fn save(&self, counts: &PersistedCounts) -> StoreResult<()>;

    /// Backend connectivity, reported by the health endpoint.
    async fn ping(&self) -> bool;
}

/// Spawn the periodic save loop.
///
/// Saves only when the aggregator reports pending mutations. The returned
/// watch sender triggers one final flush; the caller awaits the join handle
/// (with a bounded timeout) during graceful shutdown.
pub fn spawn_save_task(
    aggregator: ClickAggregator,
    store: Arc<dyn SnapshotStore>,
    interval_secs: u64,
) -> (watch::Sender<bool>, JoinHandle<()>) {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(interval_secs.max(1)));
        // Skip the first tick which fires immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    flush_if_dirty(&aggregator, store.as_ref()).await;
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, saving final snapshot...");
                        flush_if_dirty(&aggregator, store.as_ref()).await;
                        break;
                    }
                }
            }
        }
    });

    (shutdown_tx, handle)
}

async fn flush_if_dirty(aggregator: &ClickAggregator, store: &dyn SnapshotStore) {
    match aggregator.pending_snapshot().await {
        Ok(Some((seq, counts))) => match store.save(&counts).await {
            Ok(()) => {
                // Only acknowledged saves clear the dirty state, so a failed
                // write is retried on the next tick.
                if let Err(e) = aggregator.mark_saved(seq).await {
                    warn!("Failed to acknowledge saved snapshot: {e}");
                }
            }
            Err(e) => error!("Failed to save click snapshot: {e}"),
        },
        Ok(None) => {}
        Err(e) => warn!("Failed to read snapshot from aggregator: {e}"),
    }
}
