//! Inbound query model
//!
//! Raw parameters arrive as loosely-typed strings (query string or JSON body)
//! and are validated into an [`InboundQuery`] before any upstream work.

use serde::{Deserialize, Deserializer};

use crate::error::ProxyError;
use mproxy_common::config::DEFAULT_SOURCE;

/// Result count used when `limit` is absent or unusable
pub const DEFAULT_LIMIT: u32 = 50;

/// Logical operation requested by the client (`types` parameter)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Search,
    Url,
    Lyric,
    Detail,
}

impl RequestType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "search" => Some(Self::Search),
            "url" => Some(Self::Url),
            "lyric" => Some(Self::Lyric),
            "detail" => Some(Self::Detail),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Url => "url",
            Self::Lyric => "lyric",
            Self::Detail => "detail",
        }
    }
}

/// Audio quality level sent upstream for `url` requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BitrateLevel {
    Standard,
    Higher,
    #[default]
    Exhigh,
    Lossless,
}

impl BitrateLevel {
    /// Look up a `br` value. Unknown or missing values fall back to
    /// [`BitrateLevel::Exhigh`]; this never fails.
    pub fn resolve(raw: Option<&str>) -> Self {
        match raw {
            Some("standard") => Self::Standard,
            Some("higher") => Self::Higher,
            Some("exhigh") => Self::Exhigh,
            Some("lossless") => Self::Lossless,
            _ => Self::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Higher => "higher",
            Self::Exhigh => "exhigh",
            Self::Lossless => "lossless",
        }
    }
}

/// Parameters exactly as the client sent them
///
/// Shared by `GET /?...` and `POST /` (JSON body). Numeric JSON values for
/// `id` and `limit` are accepted alongside strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawQuery {
    #[serde(default)]
    pub types: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub limit: Option<String>,
    #[serde(default)]
    pub br: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
}

fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|s| match s {
        Scalar::Text(t) => t,
        Scalar::Int(i) => i.to_string(),
        Scalar::Float(f) => f.to_string(),
    }))
}

impl RawQuery {
    /// `source` with the default applied, for echoing back in envelopes
    pub fn effective_source(&self) -> String {
        non_empty(self.source.as_deref())
            .unwrap_or(DEFAULT_SOURCE)
            .to_string()
    }
}

/// Validated request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundQuery {
    pub request_type: RequestType,
    pub id: Option<String>,
    pub keywords: Option<String>,
    pub source: String,
    pub limit: u32,
    pub bitrate: BitrateLevel,
}

impl InboundQuery {
    /// Validate raw parameters
    ///
    /// Only an unknown or missing `types` is rejected here; every other field
    /// has a default or is checked by the dialect that needs it.
    pub fn from_raw(raw: &RawQuery) -> Result<Self, ProxyError> {
        let request_type = raw
            .types
            .as_deref()
            .and_then(RequestType::from_name)
            .ok_or(ProxyError::UnsupportedRequestType)?;

        let limit = raw
            .limit
            .as_deref()
            .and_then(|l| l.trim().parse::<u32>().ok())
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_LIMIT);

        Ok(Self {
            request_type,
            id: non_empty(raw.id.as_deref()).map(|s| s.trim().to_string()),
            keywords: non_empty(raw.keywords.as_deref()).map(str::to_string),
            source: raw.effective_source(),
            limit,
            bitrate: BitrateLevel::resolve(raw.br.as_deref()),
        })
    }

    /// Track id, required by url/lyric/detail
    pub fn require_id(&self) -> Result<&str, ProxyError> {
        self.id
            .as_deref()
            .ok_or(ProxyError::MissingParameter("id"))
    }

    /// Search terms, required by search
    pub fn require_keywords(&self) -> Result<&str, ProxyError> {
        self.keywords
            .as_deref()
            .ok_or(ProxyError::MissingParameter("keywords"))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// First non-blank value of `name` in a raw query string, percent-decoded
///
/// Used to echo `types` back when the query string as a whole is rejected.
pub fn first_query_param(query: &str, name: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            Some((decode_component(key)?, decode_component(value)?))
        })
        .find(|(key, value)| key == name && !value.trim().is_empty())
        .map(|(_, value)| value)
}

fn decode_component(s: &str) -> Option<String> {
    urlencoding::decode(&s.replace('+', " "))
        .ok()
        .map(|decoded| decoded.into_owned())
}
