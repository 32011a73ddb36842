//! mproxy-server - Music API relay
//!
//! Forwards search/url/lyric/detail requests to an upstream music API and
//! returns the result in a uniform JSON envelope.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mproxy_common::config::{resolve_config, ConfigSource};
use mproxy_common::ProviderPolicy;
use mproxy_server::{build_router, AppState};

/// Command-line arguments for mproxy-server
#[derive(Parser, Debug)]
#[command(name = "mproxy-server")]
#[command(about = "Stateless relay for third-party music APIs")]
#[command(version)]
struct Args {
    /// TOML config file (takes priority over MPROXY_CONFIG and the per-user file)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind (overrides server.bind)
    #[arg(short, long, env = "MPROXY_BIND")]
    bind: Option<String>,

    /// Port to listen on (overrides server.port)
    #[arg(short, long, env = "MPROXY_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config first: it carries the default log level
    let loaded = resolve_config(args.config.as_deref()).context("Failed to load configuration")?;
    let mut config = loaded.config;

    // Initialize tracing (RUST_LOG wins over logging.level)
    let level = &config.logging.level;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("mproxy_server={level},tower_http={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification immediately after tracing init
    info!(
        "Starting music-proxy (mproxy-server) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match &loaded.source {
        ConfigSource::CommandLine(path) | ConfigSource::Environment(path) => {
            info!("Configuration: {}", path.display())
        }
        ConfigSource::UserConfigFile(path) => info!("Configuration: {} (user)", path.display()),
        ConfigSource::CompiledDefaults => warn!("No config file found, using compiled defaults"),
    }

    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let state = AppState::new(&config).context("Failed to initialize upstream client")?;
    match config.providers.policy {
        ProviderPolicy::Fixed => info!(
            "Provider policy: fixed ({} source(s): {})",
            config.providers.fixed.len(),
            config.providers.fixed.keys().cloned().collect::<Vec<_>>().join(", ")
        ),
        ProviderPolicy::Pooled => info!(
            "Provider policy: pooled ({} provider(s))",
            config.providers.pool.len()
        ),
    }
    info!("Upstream timeout: {}s", config.upstream.timeout_secs);

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind((config.server.bind.as_str(), config.server.port))
        .await
        .with_context(|| {
            format!(
                "Failed to bind to {}:{}",
                config.server.bind, config.server.port
            )
        })?;
    let addr = listener.local_addr().context("Failed to read listen address")?;
    info!("mproxy-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        },
    }
}
