//! Receiving-side state of a connected client.

use std::time::Duration;

use courier_database::Conversation;
use tracing::debug;

use crate::services::{ConversationAggregator, StatusPatch, TypingIndicator};
use crate::types::HubEvent;

/// What a hub event changed in a [`ConversationViewer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerUpdate {
    MessageAdded,
    StatusChanged,
    Typing,
    Ignored,
}

/// Mirror of the server's conversations plus the focused conversation's typing state.
pub struct ConversationViewer {
    conversations: ConversationAggregator,
    focused: Option<String>,
    typing: TypingIndicator,
}

impl ConversationViewer {
    pub fn new(history: Vec<Conversation>, typing_timeout: Duration) -> Self {
        Self {
            conversations: ConversationAggregator::from_conversations(history),
            focused: None,
            typing: TypingIndicator::new(typing_timeout),
        }
    }

    /// Focus a conversation. Typing state of the previous one is dropped.
    pub async fn focus(&mut self, conversation_id: impl Into<String>) {
        let conversation_id = conversation_id.into();
        if let Some(previous) = self.focused.replace(conversation_id.clone()) {
            if previous != conversation_id {
                self.typing.clear(&previous).await;
            }
        }
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    /// Apply one event pushed by the server
    pub async fn handle_event(&self, event: &HubEvent) -> ViewerUpdate {
        match event {
            HubEvent::NewMessage(record) => {
                if self.conversations.apply_new_message(record.clone()).await {
                    ViewerUpdate::MessageAdded
                } else {
                    ViewerUpdate::Ignored
                }
            }
            HubEvent::StatusUpdated(update) => {
                // Updates for one message may arrive out of order; only move forward.
                match self
                    .conversations
                    .advance_status(&update.conversation_id, &update.message_id, update.status)
                    .await
                {
                    StatusPatch::Applied => ViewerUpdate::StatusChanged,
                    StatusPatch::Stale | StatusPatch::Missing => ViewerUpdate::Ignored,
                }
            }
            HubEvent::UserTyping(conversation_id) => {
                if self.focused.as_deref() != Some(conversation_id.as_str()) {
                    debug!(conversation_id = %conversation_id, "typing for unfocused conversation ignored");
                    return ViewerUpdate::Ignored;
                }
                self.typing.signal(conversation_id).await;
                ViewerUpdate::Typing
            }
        }
    }

    /// Replace the mirror with freshly fetched history, e.g. after reconnecting
    pub async fn reload(&self, history: Vec<Conversation>) {
        self.conversations.reload(history).await;
    }

    /// Whether the focused conversation currently shows "typing…"
    pub async fn is_typing(&self) -> bool {
        match &self.focused {
            Some(conversation_id) => self.typing.is_typing(conversation_id).await,
            None => false,
        }
    }

    pub async fn conversations(&self) -> Vec<Conversation> {
        self.conversations.snapshot().await
    }

    pub async fn conversation(&self, conversation_id: &str) -> Option<Conversation> {
        self.conversations.conversation(conversation_id).await
    }

    pub fn typing(&self) -> &TypingIndicator {
        &self.typing
    }
}
