//! Upstream provider model and selection
//!
//! The provider set is built once from configuration and never mutated.
//! Picking a pooled provider goes through [`ProviderSelector`] so tests can
//! swap the random choice for a deterministic one.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;

use mproxy_common::config::{FirstPartyEndpoints, PoolDialect, ProviderPolicy, ProvidersConfig};

/// URL convention of a pooled provider
///
/// The fixed policy always speaks the first-party dialect, so it has no
/// variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Generic relay: operation in a `type` parameter plus one `id` parameter
    Relay,
    /// Direct REST: one path per operation
    Rest,
}

impl From<PoolDialect> for Dialect {
    fn from(dialect: PoolDialect) -> Self {
        match dialect {
            PoolDialect::Relay => Dialect::Relay,
            PoolDialect::Rest => Dialect::Rest,
        }
    }
}

/// A named upstream base URL and its dialect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoint {
    pub url: String,
    pub dialect: Dialect,
}

/// Configured providers, one variant per policy
#[derive(Debug, Clone)]
pub enum ProviderSet {
    /// First-party endpoint set per `source`
    Fixed(BTreeMap<String, FirstPartyEndpoints>),
    /// Pool picked from on every request
    Pooled(Vec<ProviderEndpoint>),
}

impl ProviderSet {
    pub fn from_config(config: &ProvidersConfig) -> Self {
        match config.policy {
            ProviderPolicy::Fixed => ProviderSet::Fixed(config.fixed.clone()),
            ProviderPolicy::Pooled => ProviderSet::Pooled(
                config
                    .pool
                    .iter()
                    .map(|entry| ProviderEndpoint {
                        url: entry.url.clone(),
                        dialect: entry.dialect.into(),
                    })
                    .collect(),
            ),
        }
    }

    pub fn policy(&self) -> ProviderPolicy {
        match self {
            ProviderSet::Fixed(_) => ProviderPolicy::Fixed,
            ProviderSet::Pooled(_) => ProviderPolicy::Pooled,
        }
    }

    /// Pool size, `None` under the fixed policy
    pub fn pool_len(&self) -> Option<usize> {
        match self {
            ProviderSet::Fixed(_) => None,
            ProviderSet::Pooled(pool) => Some(pool.len()),
        }
    }

    /// Pool base URLs, `None` under the fixed policy
    pub fn pool_urls(&self) -> Option<Vec<String>> {
        match self {
            ProviderSet::Fixed(_) => None,
            ProviderSet::Pooled(pool) => Some(pool.iter().map(|p| p.url.clone()).collect()),
        }
    }
}

/// Strategy for picking one provider out of a pool
pub trait ProviderSelector: Send + Sync {
    /// Returns `None` only for an empty pool
    fn choose<'a>(&self, pool: &'a [ProviderEndpoint]) -> Option<&'a ProviderEndpoint>;
}

/// Uniform random choice, re-rolled on every call
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSelector;

impl ProviderSelector for RandomSelector {
    fn choose<'a>(&self, pool: &'a [ProviderEndpoint]) -> Option<&'a ProviderEndpoint> {
        pool.choose(&mut rand::thread_rng())
    }
}
