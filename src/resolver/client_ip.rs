//! Client IP extraction from HTTP headers
//!
//! Prefers the first entry of the `x-forwarded-for` chain (the original
//! client as reported by the outermost proxy), then `x-real-ip`, and
//! finally the transport-level peer address.

use axum::http::HeaderMap;
use std::net::IpAddr;

pub fn extract_client_ip(headers: &HeaderMap, peer: IpAddr) -> IpAddr {
    from_forwarded_for(headers)
        .or_else(|| from_real_ip(headers))
        .unwrap_or(peer)
}

fn from_forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

fn from_real_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-real-ip")?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
