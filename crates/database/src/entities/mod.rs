//! Persisted entities and event payload shapes

pub mod conversation;
pub mod message;

pub use conversation::Conversation;
pub use message::{
    Contact, Direction, Message, MessageRecord, MessageStatus, ParseEnumError, StatusUpdate,
    MAX_CONTENT_LEN,
};
