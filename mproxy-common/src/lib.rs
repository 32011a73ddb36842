//! # music-proxy Common Library
//!
//! Shared code for the music-proxy workspace:
//! - Configuration loading and resolution order
//! - Common error type
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod time;

pub use config::{ProviderPolicy, ProxyConfig};
pub use error::{Error, Result};
