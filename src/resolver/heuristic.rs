//! Deterministic octet-hash fallback
//!
//! Buckets an IP into a fixed country list by hashing its raw bytes. This
//! is a low-confidence guess, not geolocation; it exists so deployments
//! without any working strategy can still spread clicks across the board
//! instead of piling everything on UNKNOWN. Disabled by default.

use std::net::IpAddr;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::countries::CountryCode;

use super::ResolveStrategy;

const BUCKETS: [&str; 16] = [
    "US", "KR", "JP", "DE", "GB", "FR", "BR", "IN", "CA", "AU", "NL", "SE", "ES", "IT", "MX", "PL",
];

pub struct OctetHashStrategy;

#[async_trait]
impl ResolveStrategy for OctetHashStrategy {
    fn name(&self) -> &'static str {
        "octet-hash"
    }

    async fn resolve(&self, ip: IpAddr) -> Option<CountryCode> {
        let digest = match ip {
            IpAddr::V4(addr) => Sha256::digest(addr.octets()),
            IpAddr::V6(addr) => Sha256::digest(addr.octets()),
        };
        let bucket = BUCKETS[usize::from(digest[0]) % BUCKETS.len()];
        CountryCode::from_iso(bucket)
    }
}
