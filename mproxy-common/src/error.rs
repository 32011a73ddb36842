//! Common error types for music-proxy

use thiserror::Error;

/// Common result type for music-proxy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the proxy crates
#[derive(Error, Debug)]
pub enum Error {
    /// TOML parse error (wraps toml::de::Error)
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
