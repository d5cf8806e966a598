//! Admin API error types

use http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

/// Result type for admin API operations
pub type AdminResult<T> = Result<T, AdminError>;

/// Admin API error types
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub message: String,

    /// Optional detailed error information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (message, details) = match &self {
            AdminError::Io(e) => ("IO error", e.to_string()),
            AdminError::Serialization(e) => ("Serialization error", e.to_string()),
            AdminError::Internal(msg) => ("Internal server error", msg.clone()),
        };

        let body = ErrorResponse {
            message: message.to_string(),
            details: Some(details),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

impl From<crate::common::TransportError> for AdminError {
    fn from(err: crate::common::TransportError) -> Self {
        AdminError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_map_to_500() {
        let response = AdminError::Internal("broken".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let response = AdminError::from(json_err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
