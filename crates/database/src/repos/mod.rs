//! Database repository implementations

pub mod message_store;

pub use message_store::{AppendOutcome, MessageStore, SqliteMessageStore};
