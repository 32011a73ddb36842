//! Unified proxy endpoint
//!
//! `GET /?types=..&id=..` and `POST /` with the same fields as JSON.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::Uri,
    Json,
};
use tracing::{debug, error, info, warn};

use crate::envelope::OutboundEnvelope;
use crate::query::{first_query_param, InboundQuery, RawQuery};
use crate::translator::resolve_upstream_url;
use crate::AppState;

/// GET /
///
/// A query string axum cannot deserialize (e.g. a repeated `types`) still
/// gets a 400 envelope.
pub async fn proxy_get(
    State(state): State<AppState>,
    uri: Uri,
    query: Result<Query<RawQuery>, QueryRejection>,
) -> OutboundEnvelope {
    match query {
        Ok(Query(raw)) => handle(&state, raw).await,
        Err(rejection) => {
            let types = uri.query().and_then(|q| first_query_param(q, "types"));
            warn!(types = ?types, "Rejected query string: {}", rejection.body_text());
            OutboundEnvelope::bad_request(
                format!("Invalid query string: {}", rejection.body_text()),
                types,
            )
        }
    }
}

/// POST /
///
/// An unparseable body is answered with a 400 envelope instead of axum's
/// plain-text rejection.
pub async fn proxy_post(
    State(state): State<AppState>,
    body: Result<Json<RawQuery>, JsonRejection>,
) -> OutboundEnvelope {
    match body {
        Ok(Json(raw)) => handle(&state, raw).await,
        Err(rejection) => {
            warn!("Rejected request body: {}", rejection.body_text());
            OutboundEnvelope::bad_request(
                format!("Invalid request body: {}", rejection.body_text()),
                None,
            )
        }
    }
}

/// parse → select provider → build URL → fetch → wrap
async fn handle(state: &AppState, raw: RawQuery) -> OutboundEnvelope {
    info!(
        types = ?raw.types,
        id = ?raw.id,
        keywords = ?raw.keywords,
        source = ?raw.source,
        "Proxy request"
    );

    let query = match InboundQuery::from_raw(&raw) {
        Ok(query) => query,
        Err(e) => {
            warn!(types = ?raw.types, "{}", e);
            let source = raw.effective_source();
            return OutboundEnvelope::failure(&e, raw.types, source);
        }
    };

    let target = match resolve_upstream_url(&query, &state.providers, state.selector.as_ref()) {
        Ok(target) => target,
        Err(e) => {
            warn!(types = query.request_type.as_str(), source = %query.source, "{}", e);
            return OutboundEnvelope::failure(&e, raw.types, query.source);
        }
    };

    debug!(url = %target.url, provider = ?target.provider, "Fetching upstream");

    match state.upstream.fetch_json(&target.url).await {
        Ok(data) => {
            info!(types = query.request_type.as_str(), "Upstream success");
            OutboundEnvelope::success(data, &query, target.provider)
        }
        Err(e) => {
            error!(url = %target.url, "Proxy request failed: {}", e);
            OutboundEnvelope::failure(&e, raw.types, query.source)
        }
    }
}
