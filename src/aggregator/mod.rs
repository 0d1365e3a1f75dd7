//! Click aggregation behind a single-writer actor
//!
//! All counter mutations flow through one mpsc queue drained by a dedicated
//! task that owns the `CounterStore`, so concurrent clicks can never lose
//! updates. Requests are applied in arrival order; callers await a oneshot
//! reply, which keeps `record_click` synchronous from the handler's view.

pub mod ranking;
mod store;

pub use ranking::{RankingCache, RankingEntry, RankingSnapshot};
pub use store::CounterStore;

use anyhow::{anyhow, Result};
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::countries::CountryCode;
use crate::persistence::PersistedCounts;

/// Updated counts returned to the click handler.
#[derive(Debug, Clone, Copy)]
pub struct ClickStats {
    pub country_clicks: u64,
    pub total_clicks: u64,
}

enum ActorMessage {
    Click {
        country: CountryCode,
        reply: oneshot::Sender<ClickStats>,
    },
    Snapshot {
        reply: oneshot::Sender<RankingSnapshot>,
    },
    /// Pending durable state, if any mutations happened since the last
    /// acknowledged save. Carries the mutation sequence at snapshot time.
    PendingSnapshot {
        reply: oneshot::Sender<Option<(u64, PersistedCounts)>>,
    },
    /// Acknowledge that the snapshot taken at the given sequence was saved.
    MarkSaved { seq: u64 },
}

struct AggregatorActor {
    receiver: mpsc::Receiver<ActorMessage>,
    store: CounterStore,
    top_n: usize,
    /// Incremented on every mutation; compared against `saved_seq` to
    /// decide whether a save is needed.
    seq: u64,
    saved_seq: u64,
}

impl AggregatorActor {
    async fn run(mut self) {
        while let Some(msg) = self.receiver.recv().await {
            match msg {
                ActorMessage::Click { country, reply } => {
                    let (country_clicks, total_clicks) = self.store.increment(country);
                    self.seq += 1;
                    let _ = reply.send(ClickStats {
                        country_clicks,
                        total_clicks,
                    });
                }
                ActorMessage::Snapshot { reply } => {
                    if self.store.reconcile() {
                        warn!("Counter total drifted from per-country sum, repaired");
                        self.seq += 1;
                    }
                    let _ = reply.send(build_snapshot(&self.store, self.top_n));
                }
                ActorMessage::PendingSnapshot { reply } => {
                    let pending = if self.seq != self.saved_seq {
                        Some((self.seq, self.store.to_persisted()))
                    } else {
                        None
                    };
                    let _ = reply.send(pending);
                }
                ActorMessage::MarkSaved { seq } => {
                    self.saved_seq = self.saved_seq.max(seq);
                }
            }
        }
    }
}

fn build_snapshot(store: &CounterStore, top_n: usize) -> RankingSnapshot {
    let mut entries: Vec<RankingEntry> = store
        .iter()
        .filter(|&(_, clicks)| clicks > 0)
        .map(|(country, clicks)| RankingEntry { country, clicks })
        .collect();

    // Descending by clicks, ties broken by country code ascending
    entries.sort_by(|a, b| b.clicks.cmp(&a.clicks).then_with(|| a.country.cmp(&b.country)));

    RankingSnapshot {
        participating_countries: entries.len(),
        total_clicks: store.total(),
        entries: entries.into_iter().take(top_n).collect(),
        generated_at: Utc::now(),
    }
}

/// Cloneable handle to the aggregator actor.
#[derive(Clone)]
pub struct ClickAggregator {
    tx: mpsc::Sender<ActorMessage>,
}

impl ClickAggregator {
    /// Spawn the actor task around an initial (possibly restored) store.
    pub fn spawn(store: CounterStore, top_n: usize) -> Self {
        let (tx, receiver) = mpsc::channel(4096);
        let actor = AggregatorActor {
            receiver,
            store,
            top_n,
            seq: 0,
            saved_seq: 0,
        };
        tokio::spawn(actor.run());
        Self { tx }
    }

    /// Record one click. Only fails if the actor task is gone, which the
    /// handler reports as a degraded (but non-fatal) response.
    pub async fn record_click(&self, country: CountryCode) -> Result<ClickStats> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ActorMessage::Click { country, reply })
            .await
            .map_err(|_| anyhow!("click aggregator is not running"))?;
        rx.await.map_err(|_| anyhow!("click aggregator dropped the request"))
    }

    /// Consistent point-in-time ranking view; reconciles the total first.
    pub async fn snapshot(&self) -> Result<RankingSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ActorMessage::Snapshot { reply })
            .await
            .map_err(|_| anyhow!("click aggregator is not running"))?;
        rx.await.map_err(|_| anyhow!("click aggregator dropped the request"))
    }

    /// Durable state awaiting a save, or `None` when clean.
    pub async fn pending_snapshot(&self) -> Result<Option<(u64, PersistedCounts)>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ActorMessage::PendingSnapshot { reply })
            .await
            .map_err(|_| anyhow!("click aggregator is not running"))?;
        rx.await.map_err(|_| anyhow!("click aggregator dropped the request"))
    }

    /// Clear the dirty state up to a previously returned sequence.
    pub async fn mark_saved(&self, seq: u64) -> Result<()> {
        self.tx
            .send(ActorMessage::MarkSaved { seq })
            .await
            .map_err(|_| anyhow!("click aggregator is not running"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> CountryCode {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn record_click_returns_updated_counts() {
        let aggregator = ClickAggregator::spawn(CounterStore::new(), 10);

        let stats = aggregator.record_click(code("KR")).await.unwrap();
        assert_eq!(stats.country_clicks, 1);
        assert_eq!(stats.total_clicks, 1);

        let stats = aggregator.record_click(code("KR")).await.unwrap();
        assert_eq!(stats.country_clicks, 2);
        assert_eq!(stats.total_clicks, 2);
    }

    #[tokio::test]
    async fn snapshot_orders_and_caps_entries() {
        let aggregator = ClickAggregator::spawn(CounterStore::new(), 2);
        for _ in 0..3 {
            aggregator.record_click(code("KR")).await.unwrap();
        }
        aggregator.record_click(code("US")).await.unwrap();
        aggregator.record_click(code("DE")).await.unwrap();

        let snapshot = aggregator.snapshot().await.unwrap();
        assert_eq!(snapshot.total_clicks, 5);
        assert_eq!(snapshot.participating_countries, 3);
        // Capped at top 2, DE and US tie broken by code ascending
        assert_eq!(snapshot.entries.len(), 2);
        assert_eq!(snapshot.entries[0].country, code("KR"));
        assert_eq!(snapshot.entries[0].clicks, 3);
        assert_eq!(snapshot.entries[1].country, code("DE"));
    }

    #[tokio::test]
    async fn pending_snapshot_tracks_dirty_state() {
        let aggregator = ClickAggregator::spawn(CounterStore::new(), 10);
        assert!(aggregator.pending_snapshot().await.unwrap().is_none());

        aggregator.record_click(code("KR")).await.unwrap();
        let (seq, counts) = aggregator.pending_snapshot().await.unwrap().unwrap();
        assert_eq!(counts.total_clicks, 1);

        aggregator.mark_saved(seq).await.unwrap();
        assert!(aggregator.pending_snapshot().await.unwrap().is_none());

        // A click after the save makes the store dirty again
        aggregator.record_click(code("US")).await.unwrap();
        assert!(aggregator.pending_snapshot().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn stale_save_ack_does_not_clear_newer_mutations() {
        let aggregator = ClickAggregator::spawn(CounterStore::new(), 10);

        aggregator.record_click(code("KR")).await.unwrap();
        let (seq, _) = aggregator.pending_snapshot().await.unwrap().unwrap();

        // A click lands between the snapshot and the ack
        aggregator.record_click(code("KR")).await.unwrap();
        aggregator.mark_saved(seq).await.unwrap();

        let pending = aggregator.pending_snapshot().await.unwrap();
        assert!(pending.is_some(), "newer click must stay dirty");
    }
}
