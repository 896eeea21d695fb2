use serde::{Deserialize, Serialize};

use super::message::{Message, MessageRecord};

/// All messages exchanged with one contact, in materialized order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: String,
    pub name: String,
    pub number: String,
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Start a conversation from the first record that references it
    pub fn from_record(record: MessageRecord) -> Self {
        Self {
            conversation_id: record.message.conversation_id.clone(),
            name: record.contact.name,
            number: record.contact.number,
            messages: vec![record.message],
        }
    }

    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.message_id == message_id)
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.message(message_id).is_some()
    }
}
