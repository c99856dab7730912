//! Restaurant occupancy server
//!
//! Accepts visitor enter/exit events, keeps a running count and history in a
//! JSON ledger, and serves occupancy statistics over HTTP.
//!
//! Module structure:
//! - `domain/` - Ledger model and shared types
//! - `io/` - External interfaces (HTTP API, ledger file, sensor board, Prometheus)
//! - `services/` - Aggregation engine, query projections, occupancy service
//! - `infra/` - Infrastructure (Config, Metrics)

use clap::Parser;
use restaurant_occupancy::infra::{Config, Metrics};
use restaurant_occupancy::io::http::{start_http_server, AppState};
use restaurant_occupancy::io::{FileLedgerStore, LedgerStore, SensorBoard};
use restaurant_occupancy::services::OccupancyService;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Restaurant occupancy tracking server
#[derive(Parser, Debug)]
#[command(name = "restaurant-occupancy", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "CONFIG_FILE", default_value = "config/dev.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        config_file = %config.config_file(),
        listen_addr = %config.listen_addr(),
        ledger_path = %config.ledger_path(),
        "restaurant_occupancy_starting"
    );

    // Seed the ledger on first startup; an existing ledger is never overwritten
    let store = Arc::new(FileLedgerStore::new(config.ledger_path()));
    store.ensure_initialized(&config.seed_restaurant())?;
    let ledger = store.load()?;
    info!(
        name = %ledger.config.name,
        max_capacity = %ledger.config.max_capacity,
        alert_threshold = %ledger.config.alert_threshold,
        current_visitors = %ledger.current_visitors,
        history = %ledger.history.len(),
        "ledger_loaded"
    );

    let metrics = Arc::new(Metrics::new());
    metrics.set_occupancy(ledger.current_visitors, ledger.config.max_capacity);
    metrics.set_restaurant(&ledger.config.name);

    let service = Arc::new(OccupancyService::new(store, metrics.clone()));
    let state = Arc::new(AppState::new(service, Arc::new(SensorBoard::new()), metrics.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Periodic metrics summary
    let metrics_interval = config.metrics_interval_secs().max(1);
    let reporter_metrics = metrics.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        interval.tick().await;
        loop {
            interval.tick().await;
            reporter_metrics.report().log();
        }
    });

    // Handle shutdown on Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    if let Err(e) = start_http_server(&config.listen_addr(), state, shutdown_rx).await {
        error!(error = %e, "http_server_error");
        let e: Box<dyn std::error::Error> = e;
        return Err(e);
    }

    info!("restaurant-occupancy shutdown complete");
    Ok(())
}
