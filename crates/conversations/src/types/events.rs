//! Events fanned out to live subscribers.

use courier_database::{MessageRecord, StatusUpdate};
use serde::{Deserialize, Serialize};

/// Domain event delivered through the broadcast hub.
///
/// Serialized as `{"type": "<event name>", "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum HubEvent {
    /// A message was persisted for the first time
    NewMessage(MessageRecord),
    /// A message's delivery status changed
    StatusUpdated(StatusUpdate),
    /// Someone is typing in the conversation with this id
    UserTyping(String),
}

impl HubEvent {
    /// Get event type name for logging
    pub fn event_name(&self) -> &'static str {
        match self {
            HubEvent::NewMessage(_) => "new_message",
            HubEvent::StatusUpdated(_) => "status_updated",
            HubEvent::UserTyping(_) => "user_typing",
        }
    }

    pub fn conversation_id(&self) -> &str {
        match self {
            HubEvent::NewMessage(record) => record.conversation_id(),
            HubEvent::StatusUpdated(update) => &update.conversation_id,
            HubEvent::UserTyping(conversation_id) => conversation_id,
        }
    }
}
