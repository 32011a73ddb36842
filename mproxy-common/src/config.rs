//! Configuration loading and config file resolution
//!
//! Every key has a compiled default, so the proxy starts with no config file
//! at all. When a file is present it is TOML; see [`ProxyConfig`] for the
//! layout.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "MPROXY_CONFIG";

const CONFIG_DIR_NAME: &str = "music-proxy";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Browser-like User-Agent; upstreams reject requests without one
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
pub const DEFAULT_REFERER: &str = "https://music.163.com/";
pub const DEFAULT_ORIGIN: &str = "https://music.163.com";

/// Upstream bodies above this size are refused (8 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Source name wired up by default under the fixed policy
pub const DEFAULT_SOURCE: &str = "netease";

/// Complete proxy configuration
///
/// ```toml
/// [server]
/// port = 3000
///
/// [providers]
/// policy = "pooled"
///
/// [[providers.pool]]
/// url = "https://relay.example/api"
/// dialect = "relay"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub logging: LoggingConfig,
    pub providers: ProvidersConfig,
}

/// Listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Outbound HTTP client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Whole-request timeout for upstream calls, in seconds
    pub timeout_secs: u64,
    pub user_agent: String,
    pub referer: String,
    pub origin: String,
    /// Honor HTTP_PROXY/HTTPS_PROXY/NO_PROXY from the environment
    pub use_system_proxy: bool,
    /// Largest upstream response body accepted, in bytes
    pub max_body_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
            use_system_proxy: true,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Logging settings (RUST_LOG takes precedence when set)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// How an upstream provider is picked for each request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderPolicy {
    /// One first-party endpoint set per `source`
    #[default]
    Fixed,
    /// Uniform random pick from `pool`, ignoring `source`
    Pooled,
}

/// URL convention of a pooled provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolDialect {
    /// Generic relay: `?type=<op>&id=<id-or-keywords>`
    Relay,
    /// Direct REST: one path per operation
    Rest,
}

/// Pooled provider entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolEndpoint {
    pub url: String,
    pub dialect: PoolDialect,
}

/// First-party endpoint paths for one source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstPartyEndpoints {
    pub search: String,
    pub song_url: String,
    pub lyric: String,
    pub detail: String,
}

impl FirstPartyEndpoints {
    /// Canonical NetEase Cloud Music endpoints
    pub fn netease() -> Self {
        Self {
            search: "https://music.163.com/api/cloudsearch/pc".to_string(),
            song_url: "https://music.163.com/api/song/enhance/player/url".to_string(),
            lyric: "https://music.163.com/api/song/lyric".to_string(),
            detail: "https://music.163.com/api/v3/song/detail".to_string(),
        }
    }

    fn urls(&self) -> [&str; 4] {
        [&self.search, &self.song_url, &self.lyric, &self.detail]
    }
}

/// Provider selection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub policy: ProviderPolicy,
    pub fixed: BTreeMap<String, FirstPartyEndpoints>,
    pub pool: Vec<PoolEndpoint>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        let mut fixed = BTreeMap::new();
        fixed.insert(DEFAULT_SOURCE.to_string(), FirstPartyEndpoints::netease());
        Self {
            policy: ProviderPolicy::Fixed,
            fixed,
            pool: Vec::new(),
        }
    }
}

impl ProxyConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ProxyConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.upstream.timeout_secs == 0 {
            return Err(Error::Config(
                "upstream.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.upstream.max_body_bytes == 0 {
            return Err(Error::Config(
                "upstream.max_body_bytes must be greater than 0".to_string(),
            ));
        }

        for (source, endpoints) in &self.providers.fixed {
            for url in endpoints.urls() {
                check_url(url).map_err(|e| {
                    Error::Config(format!("providers.fixed.{}: {}", source, e))
                })?;
            }
        }

        for entry in &self.providers.pool {
            check_url(&entry.url)
                .map_err(|e| Error::Config(format!("providers.pool: {}", e)))?;
        }

        match self.providers.policy {
            ProviderPolicy::Pooled if self.providers.pool.is_empty() => Err(Error::Config(
                "policy \"pooled\" requires at least one [[providers.pool]] entry".to_string(),
            )),
            ProviderPolicy::Fixed if self.providers.fixed.is_empty() => Err(Error::Config(
                "policy \"fixed\" requires at least one [providers.fixed.<source>] table"
                    .to_string(),
            )),
            _ => Ok(()),
        }
    }
}

fn check_url(url: &str) -> std::result::Result<(), String> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(format!("invalid endpoint URL {:?}", url))
    }
}

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine(PathBuf),
    Environment(PathBuf),
    UserConfigFile(PathBuf),
    CompiledDefaults,
}

/// Resolved configuration plus its origin (logged at startup)
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ProxyConfig,
    pub source: ConfigSource,
}

/// Resolve the configuration in priority order:
/// 1. Command-line argument (highest priority)
/// 2. `MPROXY_CONFIG` environment variable
/// 3. `<config_dir>/music-proxy/config.toml`
/// 4. Compiled defaults (fallback)
///
/// A file named explicitly (1, 2) must load. A missing user config file (3)
/// is not an error.
pub fn resolve_config(cli_arg: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = cli_arg {
        return Ok(LoadedConfig {
            config: ProxyConfig::load(path)?,
            source: ConfigSource::CommandLine(path.to_path_buf()),
        });
    }

    if let Ok(value) = std::env::var(CONFIG_ENV_VAR) {
        if !value.is_empty() {
            let path = PathBuf::from(value);
            return Ok(LoadedConfig {
                config: ProxyConfig::load(&path)?,
                source: ConfigSource::Environment(path),
            });
        }
    }

    if let Some(path) = user_config_path() {
        if path.exists() {
            return Ok(LoadedConfig {
                config: ProxyConfig::load(&path)?,
                source: ConfigSource::UserConfigFile(path),
            });
        }
    }

    Ok(LoadedConfig {
        config: ProxyConfig::default(),
        source: ConfigSource::CompiledDefaults,
    })
}

/// Per-user config file location for the platform
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}
