//! Error types for the gateway layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use courier_conversations::SyncError;
use courier_database::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Gateway error types
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Conflict(_) => StatusCode::CONFLICT,
            GatewayError::DatabaseError(_) | GatewayError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = json!({
            "error": status.as_str(),
            "message": self.to_string(),
        });

        (status, Json(error_response)).into_response()
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<SyncError> for GatewayError {
    fn from(error: SyncError) -> Self {
        match error {
            SyncError::Validation { message } => GatewayError::InvalidRequest(message),
            SyncError::NotFound {
                conversation_id,
                message_id,
            } => GatewayError::NotFound(format!(
                "message {message_id} in conversation {conversation_id}"
            )),
            SyncError::InvalidTransition { from, to } => {
                GatewayError::Conflict(format!("status cannot move from {from} to {to}"))
            }
            SyncError::Store(StoreError::Conflict { .. }) => {
                GatewayError::Conflict("status changed concurrently, retry the request".to_string())
            }
            SyncError::Store(e) => {
                error!(error = %e, "store operation failed");
                GatewayError::DatabaseError(e.to_string())
            }
        }
    }
}

impl From<axum::extract::rejection::JsonRejection> for GatewayError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        GatewayError::InvalidRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_database::MessageStatus;

    #[test]
    fn test_sync_errors_map_to_status_codes() {
        let cases = [
            (SyncError::validation("empty id"), StatusCode::BAD_REQUEST),
            (SyncError::not_found("a", "m1"), StatusCode::NOT_FOUND),
            (
                SyncError::InvalidTransition {
                    from: MessageStatus::Read,
                    to: MessageStatus::Sent,
                },
                StatusCode::CONFLICT,
            ),
            (
                SyncError::Store(StoreError::Database("disk full".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(GatewayError::from(error).status_code(), expected);
        }
    }
}
