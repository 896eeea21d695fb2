//! Services making up the sync pipeline.

pub mod aggregator;
pub mod broadcast_hub;
pub mod status_tracker;
pub mod sync_engine;
pub mod typing;

pub use aggregator::{rebuild, ConversationAggregator, StatusPatch};
pub use broadcast_hub::{BroadcastHub, SubscriberId, Subscription};
pub use status_tracker::{StatusChange, StatusTracker};
pub use sync_engine::SyncEngine;
pub use typing::{TypingIndicator, TypingRelay, DEFAULT_TYPING_TIMEOUT};
