/// Health check endpoint
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "storage": "postgres",
///   "database": "connected"
/// }
/// ```
///
/// The endpoint always answers 200; a failing storage backend shows up as
/// `"status": "degraded"`.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::app::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Application version
    pub version: String,

    /// Storage backend name
    pub storage: String,

    /// Storage reachability
    pub database: String,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database_status = match state.store.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach storage");
            "disconnected"
        }
    };

    Json(HealthResponse {
        status: if database_status == "connected" {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage: state.store.backend().to_string(),
        database: database_status.to_string(),
    })
}
