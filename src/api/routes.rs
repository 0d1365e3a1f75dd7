use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use super::handlers::{get_ranking, health_check, record_click, AppState};

pub fn create_router(state: Arc<AppState>) -> Router {
    // The game page is served from arbitrary origins (static hosting), so
    // the API stays wide open like the original
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/click", post(record_click))
        .route("/api/ranking", get(get_ranking))
        .route("/api/rankings", get(get_ranking))
        .route("/health", get(health_check))
        .layer(cors)
        .with_state(state)
}
