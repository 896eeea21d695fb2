//! Error types for the database layer

use thiserror::Error;

use crate::entities::MessageStatus;

/// Failures raised by a message store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Message not found: {conversation_id}/{message_id}")]
    NotFound {
        conversation_id: String,
        message_id: String,
    },

    #[error("Status of {conversation_id}/{message_id} is no longer {expected}")]
    Conflict {
        conversation_id: String,
        message_id: String,
        expected: MessageStatus,
    },

    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),
}

impl StoreError {
    pub fn not_found(conversation_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self::NotFound {
            conversation_id: conversation_id.into(),
            message_id: message_id.into(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        StoreError::Database(error.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        StoreError::Migration(error.to_string())
    }
}
