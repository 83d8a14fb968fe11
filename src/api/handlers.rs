use crate::engine::store::DeviceState;
use crate::engine::telemetry::{IngestOutcome, TelemetryEngine};
use crate::error::TrackerError;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::sync::Arc;

const MAX_DEVICE_ID_LENGTH: usize = 256;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TelemetryEngine>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub devices: usize,
}

/// Device list response
#[derive(Debug, Serialize)]
pub struct DeviceListResponse {
    pub total_devices: usize,
    pub devices: Vec<DeviceState>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for TrackerError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            TrackerError::DeviceNotFound(id) => (StatusCode::NOT_FOUND, "DeviceNotFound", id.clone()),
            // User input errors - safe to expose details
            TrackerError::UnsupportedDevice(_) => {
                (StatusCode::BAD_REQUEST, "UnsupportedDevice", self.to_string())
            }
            TrackerError::Validation(_) => (StatusCode::BAD_REQUEST, "ValidationError", self.to_string()),
            TrackerError::InvalidDevEui(_) => (StatusCode::BAD_REQUEST, "InvalidDevEui", self.to_string()),
            TrackerError::Decode(_) | TrackerError::JsonError(_) => {
                (StatusCode::BAD_REQUEST, "DecodeError", self.to_string())
            }
            _ => {
                // Log detailed error but return generic message
                let error_msg = self.to_string();
                tracing::error!(error = %error_msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalError",
                    "An internal error occurred. Please try again later.".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        devices: state.engine.store().device_count(),
    })
}

/// Network-server uplink webhook
pub async fn ingest_uplink(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<IngestOutcome>, TrackerError> {
    let outcome = state.engine.ingest_json(&body).map_err(|e| {
        if e.is_client_error() {
            tracing::warn!(error = %e, "Rejected uplink");
        }
        e
    })?;
    Ok(Json(outcome))
}

/// List all known devices
pub async fn list_devices(State(state): State<AppState>) -> Json<DeviceListResponse> {
    let devices = state.engine.store().list();
    Json(DeviceListResponse {
        total_devices: devices.len(),
        devices,
    })
}

/// Get one device's state
pub async fn get_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<DeviceState>, TrackerError> {
    if device_id.len() > MAX_DEVICE_ID_LENGTH {
        return Err(TrackerError::Validation(format!(
            "device id exceeds maximum length of {} characters",
            MAX_DEVICE_ID_LENGTH
        )));
    }

    state
        .engine
        .store()
        .get(&device_id)
        .map(Json)
        .ok_or(TrackerError::DeviceNotFound(device_id))
}
