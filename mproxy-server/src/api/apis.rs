//! Provider pool listing (pooled policy only)

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ApisResponse {
    pub code: u16,
    pub data: Vec<String>,
    pub count: usize,
}

/// GET /apis
///
/// 404 under the fixed policy.
pub async fn list_apis(State(state): State<AppState>) -> impl IntoResponse {
    match state.providers.pool_urls() {
        Some(data) => {
            let count = data.len();
            Json(ApisResponse {
                code: StatusCode::OK.as_u16(),
                data,
                count,
            })
            .into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
