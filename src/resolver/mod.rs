//! IP-to-country resolution
//!
//! An ordered chain of strategies is consulted until one yields a valid
//! 2-letter code. Strategy failures are swallowed and logged; resolution
//! itself never fails, degrading to `Unknown` when the chain is exhausted.
//! Private/loopback origins short-circuit to the configured local country
//! so development and tests stay deterministic.

pub mod client_ip;
mod geoip;
mod heuristic;
mod remote;

pub use geoip::GeoDbStrategy;
pub use heuristic::OctetHashStrategy;
pub use remote::RemoteApiStrategy;

use std::net::IpAddr;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use ipnet::IpNet;
use moka::future::Cache;
use tracing::{debug, info, warn};

use crate::config::ResolverConfig;
use crate::countries::CountryCode;

/// One geolocation source in the fallback chain.
#[async_trait]
pub trait ResolveStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` on any failure or miss; the resolver moves to the next
    /// strategy. Implementations must bound their own latency.
    async fn resolve(&self, ip: IpAddr) -> Option<CountryCode>;
}

fn local_ranges() -> &'static [IpNet] {
    static RANGES: OnceLock<Vec<IpNet>> = OnceLock::new();
    RANGES.get_or_init(|| {
        [
            "127.0.0.0/8",
            "10.0.0.0/8",
            "172.16.0.0/12",
            "192.168.0.0/16",
            "169.254.0.0/16",
            "::1/128",
            "fc00::/7",
            "fe80::/10",
        ]
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect()
    })
}

/// Loopback, private, or link-local source address.
pub fn is_local(ip: IpAddr) -> bool {
    ip.is_unspecified() || local_ranges().iter().any(|net| net.contains(&ip))
}

pub struct CountryResolver {
    strategies: Vec<Box<dyn ResolveStrategy>>,
    local_country: CountryCode,
    /// Memoizes successful non-local resolutions so repeat clickers do not
    /// re-hit the providers. Failures are never cached.
    cache: Cache<IpAddr, CountryCode>,
}

impl CountryResolver {
    pub fn new(
        strategies: Vec<Box<dyn ResolveStrategy>>,
        local_country: CountryCode,
        cache_ttl: Duration,
        cache_max_entries: u64,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(cache_max_entries)
            .time_to_live(cache_ttl)
            .build();
        Self {
            strategies,
            local_country,
            cache,
        }
    }

    /// Build the strategy chain the configuration asks for. An unreadable
    /// GeoIP database is a warning, not a startup failure.
    pub fn from_config(config: &ResolverConfig) -> Result<Self> {
        let mut strategies: Vec<Box<dyn ResolveStrategy>> = Vec::new();

        if let Some(path) = &config.geoip_db_path {
            match GeoDbStrategy::open(path) {
                Ok(strategy) => {
                    info!(path = %path, "Using offline GeoIP country database");
                    strategies.push(Box::new(strategy));
                }
                Err(e) => {
                    warn!("Failed to open GeoIP database, continuing without it: {e:#}");
                }
            }
        }

        if config.remote_apis_enabled {
            strategies.push(Box::new(RemoteApiStrategy::new(Duration::from_secs(
                config.remote_timeout_secs,
            ))?));
        }

        if config.heuristic_fallback {
            warn!("Octet-hash fallback enabled; its guesses are not real geolocation");
            strategies.push(Box::new(OctetHashStrategy));
        }

        Ok(Self::new(
            strategies,
            config.local_country.unwrap_or(CountryCode::Local),
            Duration::from_secs(config.cache_ttl_secs),
            config.cache_max_entries,
        ))
    }

    pub async fn resolve(&self, ip: IpAddr) -> CountryCode {
        if is_local(ip) {
            return self.local_country;
        }

        if let Some(cached) = self.cache.get(&ip).await {
            return cached;
        }

        for strategy in &self.strategies {
            if let Some(country) = strategy.resolve(ip).await {
                debug!(strategy = strategy.name(), %ip, %country, "Resolved country");
                self.cache.insert(ip, country).await;
                return country;
            }
            debug!(strategy = strategy.name(), %ip, "Strategy yielded no country");
        }

        CountryCode::Unknown
    }
}
