//! Beacon server binary.

use anyhow::{Context, Result};
use beacon_core::config::AppConfig;
use beacon_server::{AppState, create_router};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Beacon - live location sharing server
#[derive(Parser, Debug)]
#[command(name = "beacond")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "BEACON_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Beacon v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;
    // Fail with a readable error here; AppState::new logs the warnings.
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    beacon_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let store = beacon_storage::from_config(&config.store)
        .await
        .context("failed to initialize store")?;
    store
        .health_check()
        .await
        .context("store health check failed")?;
    tracing::info!(backend = store.backend_name(), "Store initialized");

    let authenticator = beacon_server::auth::from_config(&config.auth);
    tracing::info!(method = authenticator.method(), "Authentication configured");

    let state = AppState::new(config.clone(), store, authenticator);

    if let Some(cleanup_interval) = state.rate_limit_cleanup_interval() {
        beacon_server::ratelimit::spawn_cleanup_task(state.rate_limit.clone(), cleanup_interval);
        tracing::info!(
            interval_secs = cleanup_interval.as_secs(),
            "Rate limiter cleanup task spawned"
        );
    } else {
        tracing::info!("Rate limiting disabled");
    }

    let app = create_router(state);

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    tracing::info!(public_url = %config.server.public_url, "Listening on {}", addr);

    // ConnectInfo is required for per-client rate limiting
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Load configuration from an optional TOML file overlaid with `BEACON_`
/// environment variables. Every setting has a default, so neither is required.
fn load_config(path: &str) -> Result<AppConfig> {
    let mut figment = Figment::new();

    if std::path::Path::new(path).exists() {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::info!(
            config_path = %path,
            "No config file found, using defaults and environment variables"
        );
    }

    figment
        .merge(Env::prefixed("BEACON_").ignore(&["config"]).split("__"))
        .extract()
        .context("failed to load configuration")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
