//! Per-country click counters
//!
//! The store is a plain data structure with no interior locking; it is
//! owned exclusively by the aggregator actor task and mutated only there.

use std::collections::HashMap;

use chrono::Utc;
use tracing::warn;

use crate::countries::CountryCode;
use crate::persistence::{PersistedCounts, DATA_VERSION};

/// Per-country and total click counters.
///
/// Invariant: `total` equals the sum of all per-country values. The
/// aggregator re-checks this before every snapshot and repairs drift.
#[derive(Debug, Default)]
pub struct CounterStore {
    per_country: HashMap<CountryCode, u64>,
    total: u64,
}

impl CounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a persisted snapshot, validating every entry.
    ///
    /// Negative counts coerce to zero and unparseable country keys fold
    /// into `Unknown`. The total is always recomputed from the entries;
    /// the returned flag is true when anything disagreed with the stored
    /// snapshot, in which case the caller should persist the corrected
    /// state immediately.
    pub fn from_persisted(persisted: &PersistedCounts) -> (Self, bool) {
        let mut per_country: HashMap<CountryCode, u64> = HashMap::new();
        let mut corrected = false;

        for (key, &count) in &persisted.country_clicks {
            let country = match key.parse::<CountryCode>() {
                Ok(code) => code,
                Err(_) => {
                    warn!(key = %key, "Discarding unparseable country key, counting as UNKNOWN");
                    corrected = true;
                    CountryCode::Unknown
                }
            };

            let count = if count < 0 {
                warn!(country = %country, count, "Coercing negative click count to zero");
                corrected = true;
                0
            } else {
                count as u64
            };

            *per_country.entry(country).or_insert(0) += count;
        }

        let total: u64 = per_country.values().sum();
        if i64::try_from(total) != Ok(persisted.total_clicks) {
            warn!(
                stored = persisted.total_clicks,
                recomputed = total,
                "Persisted total disagrees with per-country sum, using recomputed value"
            );
            corrected = true;
        }

        (Self { per_country, total }, corrected)
    }

    /// Record one click, returning the new per-country and total counts.
    pub fn increment(&mut self, country: CountryCode) -> (u64, u64) {
        let entry = self.per_country.entry(country).or_insert(0);
        *entry += 1;
        self.total += 1;
        (*entry, self.total)
    }

    /// Recompute `total` from the per-country values, repairing drift.
    ///
    /// Returns true when the stored total had to be overwritten.
    pub fn reconcile(&mut self) -> bool {
        let recomputed: u64 = self.per_country.values().sum();
        if recomputed != self.total {
            self.total = recomputed;
            true
        } else {
            false
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Countries with at least one click.
    pub fn participating_countries(&self) -> usize {
        self.per_country.values().filter(|&&c| c > 0).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CountryCode, u64)> + '_ {
        self.per_country.iter().map(|(&c, &n)| (c, n))
    }

    pub fn get(&self, country: CountryCode) -> u64 {
        self.per_country.get(&country).copied().unwrap_or(0)
    }

    /// Convert to the durable snapshot format.
    pub fn to_persisted(&self) -> PersistedCounts {
        PersistedCounts {
            country_clicks: self
                .per_country
                .iter()
                .map(|(c, &n)| (c.as_str().to_string(), n as i64))
                .collect(),
            total_clicks: self.total as i64,
            last_update: Utc::now(),
            data_version: DATA_VERSION.to_string(),
        }
    }
}
