//! Shared types for the conversation sync engine.

pub mod errors;
pub mod events;

pub use errors::{SyncError, SyncResult};
pub use events::HubEvent;
