//! Error types for the conversation sync engine.

use courier_database::{MessageStatus, StoreError};
use thiserror::Error;

/// Result type alias for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Main error type for the sync engine
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Message not found: {conversation_id}/{message_id}")]
    NotFound {
        conversation_id: String,
        message_id: String,
    },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: MessageStatus,
        to: MessageStatus,
    },

    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl SyncError {
    /// Create a not found error for a message
    pub fn not_found(conversation_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self::NotFound {
            conversation_id: conversation_id.into(),
            message_id: message_id.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound {
                conversation_id,
                message_id,
            } => Self::NotFound {
                conversation_id,
                message_id,
            },
            other => Self::Store(other),
        }
    }
}
