//! Error types for mproxy-server
//!
//! Every variant ends up as a JSON envelope; nothing here is fatal to the
//! process. Request-shape errors map to 400, upstream failures to 500.

use axum::http::StatusCode;
use thiserror::Error;

/// Per-request failure
#[derive(Debug, Error)]
pub enum ProxyError {
    /// `types` missing or not one of search/url/lyric/detail
    #[error("Unsupported request type")]
    UnsupportedRequestType,

    /// Recognized type, but no URL could be built for this source/provider
    #[error("Unsupported platform or request type")]
    UnsupportedPlatformOrType,

    /// Operation needs a parameter the client did not send
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// Upstream answered with a non-2xx status
    #[error("HTTP {status}: {reason}")]
    UpstreamHttp { status: u16, reason: String },

    /// Upstream body was not valid JSON
    #[error("Invalid JSON from upstream: {0}")]
    UpstreamDecode(String),

    /// Upstream body larger than `upstream.max_body_bytes`
    #[error("Upstream response exceeds {limit} bytes")]
    UpstreamBodyTooLarge { limit: usize },

    /// Connection, DNS or timeout failure
    #[error("Upstream unreachable: {0}")]
    UpstreamUnreachable(String),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::UnsupportedRequestType
            | ProxyError::UnsupportedPlatformOrType
            | ProxyError::MissingParameter(_) => StatusCode::BAD_REQUEST,
            ProxyError::UpstreamHttp { .. }
            | ProxyError::UpstreamDecode(_)
            | ProxyError::UpstreamBodyTooLarge { .. }
            | ProxyError::UpstreamUnreachable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text for the envelope `msg` field
    pub fn client_message(&self) -> String {
        if self.is_upstream() {
            format!("Proxy request failed: {}", self)
        } else {
            self.to_string()
        }
    }

    pub fn is_upstream(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }
}
