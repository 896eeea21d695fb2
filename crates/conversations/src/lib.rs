//! Courier Conversations
//!
//! Keeps every connected client's view of conversations in step with the
//! message store: grouping and ordering, delivery status, live fan-out, and
//! typing signals.

pub mod services;
pub mod types;
pub mod viewer;

pub use services::{
    rebuild, BroadcastHub, ConversationAggregator, StatusChange, StatusTracker, SubscriberId,
    StatusPatch, Subscription, SyncEngine, TypingIndicator, TypingRelay, DEFAULT_TYPING_TIMEOUT,
};
pub use types::{HubEvent, SyncError, SyncResult};
pub use viewer::{ConversationViewer, ViewerUpdate};
