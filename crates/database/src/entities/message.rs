use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Upper bound on message content, in bytes.
pub const MAX_CONTENT_LEN: usize = 65_536;

/// Which side of the conversation produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Incoming => "incoming",
            Direction::Outgoing => "outgoing",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incoming" => Ok(Direction::Incoming),
            "outgoing" => Ok(Direction::Outgoing),
            other => Err(ParseEnumError::new("direction", other)),
        }
    }
}

/// Delivery status of a message.
///
/// Progresses `pending -> sent -> delivered -> read`. `failed` can be reached
/// from any non-terminal state. `read` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
            MessageStatus::Failed => "failed",
        }
    }

    /// Position along the delivery progression. `failed` sits outside it.
    pub fn rank(&self) -> Option<u8> {
        match self {
            MessageStatus::Pending => Some(0),
            MessageStatus::Sent => Some(1),
            MessageStatus::Delivered => Some(2),
            MessageStatus::Read => Some(3),
            MessageStatus::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageStatus::Read | MessageStatus::Failed)
    }

    /// Whether moving from `self` to `next` is a forward transition.
    ///
    /// Staying on the same status is not a transition and returns `false`.
    pub fn can_transition_to(&self, next: MessageStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(current), Some(target)) => target > current,
            (None, Some(_)) => false,
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MessageStatus::Pending),
            "sent" => Ok(MessageStatus::Sent),
            "delivered" => Ok(MessageStatus::Delivered),
            "read" => Ok(MessageStatus::Read),
            "failed" => Ok(MessageStatus::Failed),
            other => Err(ParseEnumError::new("status", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Display metadata of the contact a conversation is held with
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub number: String,
}

/// A single message within a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Contact identifier of the owning conversation
    pub conversation_id: String,
    /// Identifier, unique within the conversation
    pub message_id: String,
    pub direction: Direction,
    pub content: String,
    /// Authoritative ordering key
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub status: MessageStatus,
}

/// A message together with its conversation's contact metadata.
///
/// This is the persisted row and the `new_message` event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    #[serde(flatten)]
    pub contact: Contact,
    #[serde(flatten)]
    pub message: Message,
}

impl MessageRecord {
    pub fn new(contact: Contact, message: Message) -> Self {
        Self { contact, message }
    }

    pub fn conversation_id(&self) -> &str {
        &self.message.conversation_id
    }

    pub fn message_id(&self) -> &str {
        &self.message.message_id
    }

    /// Validate record data before it is persisted
    pub fn validate(&self) -> Result<(), String> {
        if self.message.conversation_id.trim().is_empty() {
            return Err("conversation_id cannot be empty".to_string());
        }

        if self.message.message_id.trim().is_empty() {
            return Err("message_id cannot be empty".to_string());
        }

        if self.message.content.len() > MAX_CONTENT_LEN {
            return Err(format!(
                "message content too long (max {} bytes)",
                MAX_CONTENT_LEN
            ));
        }

        // Stored as nanoseconds since the epoch in an i64.
        if self.message.timestamp.timestamp_nanos_opt().is_none() {
            return Err(format!(
                "timestamp {} is outside the storable range (1677 to 2262)",
                self.message.timestamp.to_rfc3339()
            ));
        }

        Ok(())
    }
}

/// A status change addressed by `(conversation_id, message_id)`.
///
/// Doubles as the `status_updated` event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub conversation_id: String,
    pub message_id: String,
    pub status: MessageStatus,
}
