//! Courier Database Crate
//!
//! Persistence for conversation messages: connection management, migrations,
//! entity types, and the [`MessageStore`] contract with its SQLite implementation.

use courier_config::DatabaseConfig;
use sqlx::SqlitePool;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod types;

pub use connection::prepare_database;
pub use migrations::run_migrations;

pub use repos::{AppendOutcome, MessageStore, SqliteMessageStore};

pub use entities::{
    Contact, Conversation, Direction, Message, MessageRecord, MessageStatus, ParseEnumError,
    StatusUpdate, MAX_CONTENT_LEN,
};

pub use types::{StoreError, StoreResult};

/// Initialize the database with migrations
pub async fn initialize_database(config: &DatabaseConfig) -> StoreResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| StoreError::Database(format!("{e:#}")))?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Open the configured database and wrap it in a [`SqliteMessageStore`]
pub async fn open_message_store(config: &DatabaseConfig) -> StoreResult<SqliteMessageStore> {
    let pool = initialize_database(config).await?;
    Ok(SqliteMessageStore::new(pool))
}
