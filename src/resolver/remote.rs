//! Remote geolocation over HTTP
//!
//! Three free providers are tried in a fixed order; each request shares the
//! client-level timeout, so total latency is bounded by providers × timeout.
//! Any transport or parse failure just moves the chain to the next provider.

use std::net::IpAddr;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::countries::CountryCode;

use super::ResolveStrategy;

#[derive(Debug, Clone, Copy)]
enum Provider {
    /// `http://ip-api.com/json/{ip}?fields=countryCode` → `{"countryCode":"US"}`
    IpApi,
    /// `https://ipapi.co/{ip}/country_code/` → plain `US`
    IpapiCo,
    /// `https://api.country.is/{ip}` → `{"country":"US"}`
    CountryIs,
}

impl Provider {
    fn name(&self) -> &'static str {
        match self {
            Self::IpApi => "ip-api.com",
            Self::IpapiCo => "ipapi.co",
            Self::CountryIs => "country.is",
        }
    }

    fn url(&self, ip: IpAddr) -> String {
        match self {
            Self::IpApi => format!("http://ip-api.com/json/{ip}?fields=countryCode"),
            Self::IpapiCo => format!("https://ipapi.co/{ip}/country_code/"),
            Self::CountryIs => format!("https://api.country.is/{ip}"),
        }
    }

    fn parse(&self, body: &str) -> Option<CountryCode> {
        let code = match self {
            Self::IpApi => serde_json::from_str::<Value>(body)
                .ok()?
                .get("countryCode")?
                .as_str()?
                .to_string(),
            Self::IpapiCo => body.trim().to_string(),
            Self::CountryIs => serde_json::from_str::<Value>(body)
                .ok()?
                .get("country")?
                .as_str()?
                .to_string(),
        };
        CountryCode::from_iso(&code)
    }
}

pub struct RemoteApiStrategy {
    client: reqwest::Client,
    providers: Vec<Provider>,
}

impl RemoteApiStrategy {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            providers: vec![Provider::IpApi, Provider::IpapiCo, Provider::CountryIs],
        })
    }

    async fn query(&self, provider: Provider, ip: IpAddr) -> Option<CountryCode> {
        let url = provider.url(ip);
        let response = self.client.get(&url).send().await.ok()?;
        if !response.status().is_success() {
            debug!(provider = provider.name(), status = %response.status(), "Provider returned error status");
            return None;
        }
        let body = response.text().await.ok()?;
        provider.parse(&body)
    }
}

#[async_trait]
impl ResolveStrategy for RemoteApiStrategy {
    fn name(&self) -> &'static str {
        "remote-api"
    }

    async fn resolve(&self, ip: IpAddr) -> Option<CountryCode> {
        for provider in &self.providers {
            match self.query(*provider, ip).await {
                Some(country) => return Some(country),
                None => debug!(provider = provider.name(), %ip, "Provider lookup failed"),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_provider_body() {
        let us = CountryCode::from_iso("US");
        assert_eq!(Provider::IpApi.parse(r#"{"countryCode":"US"}"#), us);
        assert_eq!(Provider::IpapiCo.parse("US\n"), us);
        assert_eq!(Provider::CountryIs.parse(r#"{"country":"us"}"#), us);
    }

    #[test]
    fn rejects_malformed_bodies() {
        assert_eq!(Provider::IpApi.parse("not json"), None);
        assert_eq!(Provider::IpApi.parse(r#"{"status":"fail"}"#), None);
        assert_eq!(Provider::IpapiCo.parse("Undefined"), None);
        assert_eq!(Provider::CountryIs.parse(r#"{"country":"USA"}"#), None);
    }
}
