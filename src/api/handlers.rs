use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error};

use crate::aggregator::{ClickAggregator, RankingCache};
use crate::persistence::SnapshotStore;
use crate::resolver::client_ip::extract_client_ip;
use crate::resolver::CountryResolver;

pub struct AppState {
    pub aggregator: ClickAggregator,
    pub resolver: Arc<CountryResolver>,
    pub ranking: Arc<RankingCache>,
    pub store: Arc<dyn SnapshotStore>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    fn new(error: &str) -> Self {
        Self {
            success: false,
            error: error.to_string(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickResponse {
    pub success: bool,
    pub country: String,
    pub country_name: String,
    pub country_flag: String,
    pub clicks: u64,
    pub total_clicks: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingRow {
    pub country: String,
    pub country_name: String,
    pub country_flag: String,
    pub clicks: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingResponse {
    pub success: bool,
    pub total_clicks: u64,
    pub participating_countries: usize,
    pub rankings: Vec<RankingRow>,
    pub last_update: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub persistence: &'static str,
}

/// Record one click, attributed to the caller's country.
///
/// The endpoint degrades gracefully: resolution failures become UNKNOWN
/// clicks, and only an unavailable aggregator produces an error response.
pub async fn record_click(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<ClickResponse>, (StatusCode, Json<ErrorResponse>)> {
    let ip = extract_client_ip(&headers, peer.ip());
    let country = state.resolver.resolve(ip).await;

    match state.aggregator.record_click(country).await {
        Ok(stats) => {
            debug!(%country, clicks = stats.country_clicks, total = stats.total_clicks, "Click recorded");
            Ok(Json(ClickResponse {
                success: true,
                country: country.as_str().to_string(),
                country_name: country.display_name().to_string(),
                country_flag: country.flag(),
                clicks: stats.country_clicks,
                total_clicks: stats.total_clicks,
            }))
        }
        Err(e) => {
            error!("Failed to record click: {e:#}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to process click")),
            ))
        }
    }
}

/// Serve the cached top-N country ranking.
pub async fn get_ranking(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RankingResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.ranking.get().await {
        Ok(snapshot) => {
            let rankings = snapshot
                .entries
                .iter()
                .map(|entry| RankingRow {
                    country: entry.country.as_str().to_string(),
                    country_name: entry.country.display_name().to_string(),
                    country_flag: entry.country.flag(),
                    clicks: entry.clicks,
                })
                .collect();

            Ok(Json(RankingResponse {
                success: true,
                total_clicks: snapshot.total_clicks,
                participating_countries: snapshot.participating_countries,
                rankings,
                last_update: snapshot.generated_at,
            }))
        }
        Err(e) => {
            error!("Failed to fetch rankings: {e:#}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to fetch rankings")),
            ))
        }
    }
}

/// Liveness probe, reporting persistence backend connectivity.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let persistence = if state.store.ping().await {
        "ok"
    } else {
        "unavailable"
    };
    Json(HealthResponse {
        status: "ok",
        persistence,
    })
}
