//! Ranking snapshots and their TTL cache
//!
//! Ranking reads vastly outnumber writes (polling clients), so the sorted
//! view is memoized for a bounded interval instead of recomputed per read.
//! Staleness of at most the TTL is the explicit contract.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::countries::CountryCode;

use super::ClickAggregator;

#[derive(Debug, Clone)]
pub struct RankingEntry {
    pub country: CountryCode,
    pub clicks: u64,
}

/// Immutable point-in-time view of the leaderboard.
#[derive(Debug, Clone)]
pub struct RankingSnapshot {
    /// Sorted descending by clicks, ties by country code ascending,
    /// capped at the configured top-N.
    pub entries: Vec<RankingEntry>,
    pub total_clicks: u64,
    /// Countries with at least one click, before the top-N cap.
    pub participating_countries: usize,
    pub generated_at: DateTime<Utc>,
}

struct CachedRanking {
    snapshot: Arc<RankingSnapshot>,
    fetched_at: Instant,
}

pub struct RankingCache {
    aggregator: ClickAggregator,
    ttl: Duration,
    cached: RwLock<Option<CachedRanking>>,
}

impl RankingCache {
    pub fn new(aggregator: ClickAggregator, ttl: Duration) -> Self {
        Self {
            aggregator,
            ttl,
            cached: RwLock::new(None),
        }
    }

    /// Return the cached snapshot while fresh, otherwise recompute.
    ///
    /// Concurrent misses collapse behind the write lock so the aggregator
    /// sees at most one snapshot request per expiry.
    pub async fn get(&self) -> Result<Arc<RankingSnapshot>> {
        {
            let cached = self.cached.read().await;
            if let Some(entry) = cached.as_ref() {
                if entry.fetched_at.elapsed() < self.ttl {
                    return Ok(Arc::clone(&entry.snapshot));
                }
            }
        }

        let mut cached = self.cached.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(entry) = cached.as_ref() {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(Arc::clone(&entry.snapshot));
            }
        }

        let snapshot = Arc::new(self.aggregator.snapshot().await?);
        *cached = Some(CachedRanking {
            snapshot: Arc::clone(&snapshot),
            fetched_at: Instant::now(),
        });
        Ok(snapshot)
    }
}
