//! HTTP API handlers for mproxy-server

pub mod apis;
pub mod health;
pub mod proxy;

pub use apis::list_apis;
pub use health::health_routes;
pub use proxy::{proxy_get, proxy_post};
