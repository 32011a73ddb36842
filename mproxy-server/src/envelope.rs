//! Uniform response envelope
//!
//! Every proxied request produces exactly one envelope; the HTTP status
//! always equals `code`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::error::ProxyError;
use crate::query::InboundQuery;
use mproxy_common::time::now_millis;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundEnvelope {
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub types: Option<String>,
    #[serde(rename = "providerUsed", skip_serializing_if = "Option::is_none")]
    pub provider_used: Option<String>,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl OutboundEnvelope {
    /// Wrap upstream JSON verbatim
    pub fn success(data: Value, query: &InboundQuery, provider_used: Option<String>) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            data: Some(data),
            source: Some(query.source.clone()),
            types: Some(query.request_type.as_str().to_string()),
            provider_used,
            timestamp: now_millis(),
            msg: None,
        }
    }

    /// Error envelope, echoing the client's `types`
    ///
    /// `source` is echoed only when it is part of the problem (the request
    /// type was understood but could not be served for that source).
    pub fn failure(error: &ProxyError, types: Option<String>, source: String) -> Self {
        let source = match error {
            ProxyError::UnsupportedPlatformOrType | ProxyError::MissingParameter(_) => Some(source),
            _ => None,
        };
        Self {
            code: error.status_code().as_u16(),
            data: None,
            source,
            types,
            provider_used: None,
            timestamp: now_millis(),
            msg: Some(error.client_message()),
        }
    }

    /// Envelope for a query string or body that could not be parsed
    ///
    /// `types` is echoed when it could still be read from the raw request.
    pub fn bad_request(msg: String, types: Option<String>) -> Self {
        Self {
            code: StatusCode::BAD_REQUEST.as_u16(),
            data: None,
            source: None,
            types,
            provider_used: None,
            timestamp: now_millis(),
            msg: Some(msg),
        }
    }
}

impl IntoResponse for OutboundEnvelope {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
