//! Request translation: select a provider and build its upstream URL
//!
//! Fixed policy uses the first-party paths configured for `source`. Pooled
//! policy asks the selector for a provider and speaks that provider's
//! dialect. All parameter values are percent-encoded.

use mproxy_common::config::FirstPartyEndpoints;
use urlencoding::encode;

use crate::error::ProxyError;
use crate::provider::{Dialect, ProviderEndpoint, ProviderSelector, ProviderSet};
use crate::query::{InboundQuery, RequestType};

/// Fixed `br` sent next to `level` on first-party song URL requests
const FIRST_PARTY_BR: u32 = 999_000;

/// Fully-resolved upstream request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    pub url: String,
    /// Base URL of the pooled provider used (pooled policy only)
    pub provider: Option<String>,
}

/// Select a provider for `query` and build its URL
pub fn resolve_upstream_url(
    query: &InboundQuery,
    providers: &ProviderSet,
    selector: &dyn ProviderSelector,
) -> Result<UpstreamTarget, ProxyError> {
    match providers {
        ProviderSet::Fixed(sources) => {
            let endpoints = sources
                .get(&query.source)
                .ok_or(ProxyError::UnsupportedPlatformOrType)?;
            Ok(UpstreamTarget {
                url: first_party_url(query, endpoints)?,
                provider: None,
            })
        }
        ProviderSet::Pooled(pool) => {
            let endpoint = selector
                .choose(pool)
                .ok_or(ProxyError::UnsupportedPlatformOrType)?;
            let url = pooled_url(query, endpoint)?.ok_or(ProxyError::UnsupportedPlatformOrType)?;
            Ok(UpstreamTarget {
                url,
                provider: Some(endpoint.url.clone()),
            })
        }
    }
}

fn pooled_url(
    query: &InboundQuery,
    endpoint: &ProviderEndpoint,
) -> Result<Option<String>, ProxyError> {
    match endpoint.dialect {
        Dialect::Relay => relay_url(query, &endpoint.url),
        Dialect::Rest => rest_url(query, &endpoint.url).map(Some),
    }
}

/// Dialect A: `{base}?type={op}&id={id-or-keywords}`
///
/// `detail` has no relay form and yields `None`.
fn relay_url(query: &InboundQuery, base: &str) -> Result<Option<String>, ProxyError> {
    let value = match query.request_type {
        RequestType::Search => query.require_keywords()?,
        RequestType::Url | RequestType::Lyric => query.require_id()?,
        RequestType::Detail => return Ok(None),
    };
    let sep = if base.contains('?') { '&' } else { '?' };
    Ok(Some(format!(
        "{}{}type={}&id={}",
        base,
        sep,
        query.request_type.as_str(),
        encode(value)
    )))
}

/// Dialect B: distinct path per operation
fn rest_url(query: &InboundQuery, base: &str) -> Result<String, ProxyError> {
    let base = base.trim_end_matches('/');
    Ok(match query.request_type {
        RequestType::Search => format!(
            "{}/search?keywords={}&limit={}",
            base,
            encode(query.require_keywords()?),
            query.limit
        ),
        RequestType::Url => format!(
            "{}/song/url/v1?id={}&level={}",
            base,
            encode(query.require_id()?),
            query.bitrate.as_str()
        ),
        RequestType::Lyric => format!("{}/lyric?id={}", base, encode(query.require_id()?)),
        RequestType::Detail => {
            format!("{}/song/detail?ids={}", base, encode(query.require_id()?))
        }
    })
}

/// Dialect C: first-party paths, id sent as both `id=` and `ids=[id]`
fn first_party_url(
    query: &InboundQuery,
    endpoints: &FirstPartyEndpoints,
) -> Result<String, ProxyError> {
    Ok(match query.request_type {
        RequestType::Search => format!(
            "{}?s={}&type=1&limit={}&offset=0",
            endpoints.search,
            encode(query.require_keywords()?),
            query.limit
        ),
        RequestType::Url => {
            let id = encode(query.require_id()?);
            format!(
                "{}?id={}&ids=[{}]&br={}&level={}",
                endpoints.song_url,
                id,
                id,
                FIRST_PARTY_BR,
                query.bitrate.as_str()
            )
        }
        RequestType::Lyric => format!(
            "{}?id={}&lv=-1&kv=-1&tv=-1",
            endpoints.lyric,
            encode(query.require_id()?)
        ),
        RequestType::Detail => {
            let id = encode(query.require_id()?);
            format!("{}?id={}&ids=[{}]", endpoints.detail, id, id)
        }
    })
}
