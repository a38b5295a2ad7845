use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::{info, warn};

mod ai;
mod api;
mod blob;
mod config;
mod db;
mod error;
mod i18n;
mod line;
mod media;
mod ollama;
mod pose;
mod postback;
mod service;
mod stats;

use crate::config::load_config;
use crate::service::CoachService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_logging();

    info!("Starting coaching service v{}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(load_config()?);
    info!(
        host = %config.server.host,
        port = config.server.port,
        locale = %config.locale,
        "Configuration loaded"
    );
    if config.line.channel_secret.is_empty() || config.line.channel_access_token.is_empty() {
        warn!("LINE channel credentials are not configured; webhook calls will be rejected");
    }

    // Metrics recorder; the service still runs if another recorder is installed
    let metrics = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Prometheus recorder not installed");
            None
        }
    };

    std::fs::create_dir_all(&config.storage.data_dir)?;

    // Initialize the service
    let service = Arc::new(CoachService::from_config(config.clone()).await?);

    // Build the router
    let app = api::router(service, metrics);

    // Start the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("coach_service=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
