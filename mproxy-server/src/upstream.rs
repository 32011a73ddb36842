//! Upstream HTTP client
//!
//! One shared reqwest client carries the browser-like headers and the request
//! timeout. Upstreams refuse requests without a first-party Referer/Origin.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER};
use serde_json::Value;

use crate::error::ProxyError;
use mproxy_common::config::UpstreamConfig;
use mproxy_common::Error;

/// Issues the single GET per proxied request; no retries
#[derive(Clone)]
pub struct UpstreamClient {
    http_client: reqwest::Client,
    max_body_bytes: usize,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> mproxy_common::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, header_value("referer", &config.referer)?);
        headers.insert(ORIGIN, header_value("origin", &config.origin)?);

        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs));
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }

        let http_client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// GET `url` and parse the body as JSON
    ///
    /// The body is read chunk by chunk and refused once it passes
    /// `max_body_bytes`, whether or not the upstream sent a Content-Length.
    pub async fn fetch_json(&self, url: &str) -> Result<Value, ProxyError> {
        let mut response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ProxyError::UpstreamUnreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::UpstreamHttp {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let limit = self.max_body_bytes;
        if matches!(response.content_length(), Some(len) if len > limit as u64) {
            return Err(ProxyError::UpstreamBodyTooLarge { limit });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ProxyError::UpstreamUnreachable(e.to_string()))?
        {
            if body.len() + chunk.len() > limit {
                return Err(ProxyError::UpstreamBodyTooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        serde_json::from_slice(&body).map_err(|e| ProxyError::UpstreamDecode(e.to_string()))
    }
}

fn header_value(name: &str, value: &str) -> mproxy_common::Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| Error::Config(format!("upstream.{} is not a valid header value", name)))
}
