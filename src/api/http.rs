use crate::api::handlers::{get_device, health_check, ingest_uplink, list_devices, AppState};
use crate::engine::telemetry::TelemetryEngine;
use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// HTTP server receiving network-server webhooks
pub struct HttpServer {
    app_state: AppState,
    bind_addr: SocketAddr,
}

impl HttpServer {
    pub fn new(engine: Arc<TelemetryEngine>, bind_addr: SocketAddr) -> Self {
        Self {
            app_state: AppState { engine },
            bind_addr,
        }
    }

    /// Build the Axum router with all routes and middleware
    fn build_router(&self) -> Router {
        // Axum 0.6 applies a default 2MB body limit
        Router::new()
            .route("/health", get(health_check))
            .route("/uplink", post(ingest_uplink))
            .route("/devices", get(list_devices))
            .route("/devices/:device_id", get(get_device))
            .layer(TraceLayer::new_for_http())
            .with_state(self.app_state.clone())
    }

    pub async fn serve(self) -> Result<()> {
        let app = self.build_router();

        info!("Starting HTTP server on {}", self.bind_addr);
        axum_server::bind(self.bind_addr)
            .serve(app.into_make_service())
            .await?;

        Ok(())
    }
}
