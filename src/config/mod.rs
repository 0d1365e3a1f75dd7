use serde::{Deserialize, Serialize};

use crate::countries::CountryCode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub persistence: PersistenceConfig,
    pub resolver: ResolverConfig,
    pub ranking: RankingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    File,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    pub backend: PersistenceBackend,
    /// File path for the file backend, sqlx URL for the sqlite backend.
    pub url: String,
    pub save_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Country attributed to loopback/private addresses. `None` uses the
    /// `Local` sentinel instead of a real country.
    pub local_country: Option<CountryCode>,
    pub geoip_db_path: Option<String>,
    pub remote_apis_enabled: bool,
    pub remote_timeout_secs: u64,
    pub heuristic_fallback: bool,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    pub ttl_secs: u64,
    pub top_n: usize,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value for {key}, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env_or("PORT", 3000u16);

        let backend_str =
            std::env::var("PERSISTENCE_BACKEND").unwrap_or_else(|_| "file".to_string());
        let backend = match backend_str.to_lowercase().as_str() {
            "sqlite" => PersistenceBackend::Sqlite,
            "file" => PersistenceBackend::File,
            other => {
                tracing::warn!(
                    "Unknown PERSISTENCE_BACKEND '{other}', falling back to 'file'. Supported values: file, sqlite"
                );
                PersistenceBackend::File
            }
        };

        let url = std::env::var("PERSISTENCE_URL").unwrap_or_else(|_| match backend {
            PersistenceBackend::File => "./clicks.json".to_string(),
            PersistenceBackend::Sqlite => "sqlite://./oiia.db?mode=rwc".to_string(),
        });

        // Empty LOCAL_COUNTRY disables the default and keeps the sentinel
        let local_country = match std::env::var("LOCAL_COUNTRY") {
            Ok(value) if value.is_empty() => None,
            Ok(value) => match CountryCode::from_iso(&value) {
                Some(code) => Some(code),
                None => {
                    tracing::warn!(
                        "LOCAL_COUNTRY '{value}' is not a 2-letter code, using default KR"
                    );
                    CountryCode::from_iso("KR")
                }
            },
            Err(_) => CountryCode::from_iso("KR"),
        };

        Ok(Config {
            server: ServerConfig { host, port },
            persistence: PersistenceConfig {
                backend,
                url,
                save_interval_secs: env_or("SAVE_INTERVAL_SECS", 5),
            },
            resolver: ResolverConfig {
                local_country,
                geoip_db_path: std::env::var("GEOIP_DB_PATH").ok(),
                remote_apis_enabled: env_bool("GEO_API_ENABLED", true),
                remote_timeout_secs: env_or("GEO_API_TIMEOUT_SECS", 5),
                heuristic_fallback: env_bool("GEO_HEURISTIC_FALLBACK", false),
                cache_ttl_secs: env_or("RESOLVER_CACHE_TTL_SECS", 3600),
                cache_max_entries: env_or("RESOLVER_CACHE_MAX_ENTRIES", 10_000),
            },
            ranking: RankingConfig {
                ttl_secs: env_or("RANKING_TTL_SECS", 10),
                top_n: env_or("RANKING_TOP_N", 10),
            },
        })
    }
}
