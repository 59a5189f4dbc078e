//! # Toko API Server
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  auth proxy ───► HTTP (8080) ───► InventoryService ───► SQLite         │
//! │                                          │                              │
//! │                                          ▼                              │
//! │                          LogSink + BroadcastSink ──▶ /alerts/ws          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use toko_db::{Database, DbConfig};
use toko_stock::{AlertDispatcher, BroadcastSink, InventoryService, LogSink, StockConfig};

use toko_api::{app, ApiConfig, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting Toko API server...");

    let api_config = ApiConfig::load(None)?;
    let stock_config = StockConfig::load(None)?;
    info!(
        addr = %api_config.socket_addr()?,
        database = %api_config.database_path.display(),
        "Configuration loaded"
    );

    if let Some(parent) = api_config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db = Database::new(
        DbConfig::new(&api_config.database_path).max_connections(api_config.max_connections),
    )
    .await?;

    let alerts = BroadcastSink::new(stock_config.alert_channel_capacity);
    let dispatcher = AlertDispatcher::new()
        .with_sink(Arc::new(LogSink))
        .with_sink(Arc::new(alerts.clone()));
    let service = InventoryService::new(db.clone(), stock_config, dispatcher);

    let addr = api_config.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, app(AppState::new(service, alerts)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,toko=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
