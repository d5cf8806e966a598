//! Admin API request handlers

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::admin::error::{AdminError, AdminResult};
use crate::admin::server::AdminState;

/// Body of the dual mode status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DualModeStatus {
    pub enabled: bool,
}

/// Liveness check
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Report whether SSL dual mode is enabled
///
/// Reads the flag fixed at startup; no connection state is involved.
pub async fn get_dual_mode(State(state): State<AdminState>) -> AdminResult<Json<serde_json::Value>> {
    let status = DualModeStatus {
        enabled: state.dual_mode.is_enabled(),
    };
    let body = serde_json::to_value(status).map_err(|e| {
        log::error!("Error building response for ssl dual mode status: {}", e);
        AdminError::Serialization(e)
    })?;
    Ok(Json(body))
}
