//! mproxy-server library - music API relay
//!
//! Translates one abstract request (type, id, keywords, bitrate) into the URL
//! dialect of an upstream music API, relays a single GET and wraps the JSON
//! result in a uniform envelope. Holds no state across requests.

use std::sync::Arc;

use axum::http::Method;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use mproxy_common::ProxyConfig;

pub mod api;
pub mod envelope;
pub mod error;
pub mod provider;
pub mod query;
pub mod translator;
pub mod upstream;

use provider::{ProviderSelector, ProviderSet, RandomSelector};
use upstream::UpstreamClient;

/// Application state shared across HTTP handlers
///
/// Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    /// Configured upstream providers
    pub providers: Arc<ProviderSet>,
    /// Pool selection strategy (random in production)
    pub selector: Arc<dyn ProviderSelector>,
    /// Shared outbound HTTP client
    pub upstream: UpstreamClient,
}

impl AppState {
    /// Create application state from configuration with random pool selection
    pub fn new(config: &ProxyConfig) -> mproxy_common::Result<Self> {
        Ok(Self {
            providers: Arc::new(ProviderSet::from_config(&config.providers)),
            selector: Arc::new(RandomSelector),
            upstream: UpstreamClient::new(&config.upstream)?,
        })
    }

    /// Replace the pool selection strategy
    pub fn with_selector(mut self, selector: Arc<dyn ProviderSelector>) -> Self {
        self.selector = selector;
        self
    }
}

/// Build application router
///
/// Unmatched paths fall through to axum's default 404.
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(api::proxy_get).post(api::proxy_post))
        .route("/apis", get(api::list_apis))
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
