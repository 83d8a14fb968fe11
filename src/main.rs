use anyhow::Result;
use loratrack::api::http::HttpServer;
use loratrack::config::ReceiverConfig;
use loratrack::engine::store::DeviceStateStore;
use loratrack::engine::telemetry::TelemetryEngine;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("loratrack=info".parse()?),
        )
        .json()
        .init();

    info!("Starting LoRaTrack receiver v{}", loratrack::VERSION);

    let config = ReceiverConfig::from_env()?;
    config.validate()?;

    let store = Arc::new(DeviceStateStore::new());
    let engine = Arc::new(TelemetryEngine::new(store.clone()));

    info!("Starting device aging task every {:?}", config.age_tick);
    let aging_handle = store.clone().start_aging(config.age_tick);

    let http_server = HttpServer::new(engine, config.bind_addr);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = http_server.serve().await {
            error!("HTTP server error: {}", e);
        }
    });

    shutdown_signal().await?;

    server_handle.abort();
    aging_handle.abort();

    info!(devices = store.device_count(), "LoRaTrack receiver stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("SIGINT received, shutting down");
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("SIGINT received, shutting down");
    }
    Ok(())
}
