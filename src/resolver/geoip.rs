//! Offline GeoIP lookup using MaxMind GeoLite2/GeoIP2 MMDB
//!
//! The database is memory-mapped, so lookups are cheap enough to sit first
//! in the strategy chain.

use anyhow::{Context, Result};
use async_trait::async_trait;
use maxminddb::{geoip2, Mmap, Reader};
use std::net::IpAddr;

use crate::countries::CountryCode;

use super::ResolveStrategy;

pub struct GeoDbStrategy {
    reader: Reader<Mmap>,
}

impl GeoDbStrategy {
    /// Open a MaxMind Country (or City, which is a superset) .mmdb file.
    pub fn open(path: &str) -> Result<Self> {
        let reader = unsafe { Reader::open_mmap(path) }
            .with_context(|| format!("Failed to open GeoIP database at {}", path))?;
        Ok(Self { reader })
    }
}

#[async_trait]
impl ResolveStrategy for GeoDbStrategy {
    fn name(&self) -> &'static str {
        "geoip-db"
    }

    async fn resolve(&self, ip: IpAddr) -> Option<CountryCode> {
        let result = self.reader.lookup(ip).ok()?;
        let country = result.decode::<geoip2::Country>().ok()??;
        country
            .country
            .iso_code
            .and_then(CountryCode::from_iso)
    }
}
