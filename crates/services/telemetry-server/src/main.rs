//! Telemetry Server Binary
//!
//! Entry point for the telemetry ingestion gateway.

use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use telemetry_server::{
    api::{build_router, AppState},
    config::Config,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    tracing::info!("Starting telemetry server...");

    // Load configuration
    let config_path = std::env::var("TELEMETRY_CONFIG").ok();
    let config = Arc::new(Config::load(config_path.as_deref())?);

    tracing::info!(
        "Configuration: bind={}, database={}, send_timeout_ms={}",
        config.server.bind_addr(),
        config.database.url,
        config.broadcast.send_timeout_ms
    );

    let state = AppState::from_config(config.clone())?;
    let registry = state.registry.clone();
    let router = build_router(state);

    let bind_addr = config.server.bind_addr();
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("HTTP server listening on {}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, initiating graceful shutdown...");
        })
        .await?;

    tracing::info!(
        subscribers = registry.len(),
        "Telemetry server shutdown complete"
    );
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());

    let json = std::env::var("TELEMETRY_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let fmt_layer = if json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
