//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;
use mproxy_common::time::now_millis;

/// Service name reported by `/health`
pub const SERVICE_NAME: &str = "music-proxy";

/// Health check response
///
/// Deliberately has no `code` field, unlike the proxy envelope.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: i64,
    /// Pool size, pooled policy only
    #[serde(rename = "availableAPIs", skip_serializing_if = "Option::is_none")]
    pub available_apis: Option<usize>,
}

/// GET /health
///
/// Query parameters are ignored.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: now_millis(),
        available_apis: state.providers.pool_len(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
