//! Grouped, deduplicated, time-ordered view of conversations.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use courier_database::{Conversation, Message, MessageRecord, MessageStatus};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::debug;

/// Group stored records into conversations.
///
/// Conversations appear in order of first reference and keep the input
/// order of their messages. Name and number come from the first record.
pub fn rebuild(records: impl IntoIterator<Item = MessageRecord>) -> Vec<Conversation> {
    let mut conversations: Vec<Conversation> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        match index.get(record.conversation_id()) {
            Some(&position) => conversations[position].messages.push(record.message),
            None => {
                index.insert(record.conversation_id().to_string(), conversations.len());
                conversations.push(Conversation::from_record(record));
            }
        }
    }

    conversations
}

struct ConversationEntry {
    conversation: Conversation,
    message_ids: HashSet<String>,
}

impl ConversationEntry {
    fn new(conversation: Conversation) -> Self {
        let message_ids = conversation
            .messages
            .iter()
            .map(|m| m.message_id.clone())
            .collect();
        Self {
            conversation,
            message_ids,
        }
    }

    fn merge(&mut self, message: Message) -> bool {
        if !self.message_ids.insert(message.message_id.clone()) {
            return false;
        }

        // Land after the last message that is not newer, keeping ties in arrival order.
        let messages = &mut self.conversation.messages;
        let position = messages
            .iter()
            .rposition(|existing| existing.timestamp <= message.timestamp)
            .map_or(0, |index| index + 1);
        messages.insert(position, message);
        true
    }

    fn message_mut(&mut self, message_id: &str) -> Option<&mut Message> {
        if !self.message_ids.contains(message_id) {
            return None;
        }
        self.conversation
            .messages
            .iter_mut()
            .find(|m| m.message_id == message_id)
    }
}

type SharedEntry = Arc<Mutex<ConversationEntry>>;

#[derive(Default)]
struct Registry {
    order: Vec<SharedEntry>,
    by_id: HashMap<String, SharedEntry>,
}

impl Registry {
    fn from_conversations(conversations: Vec<Conversation>) -> Self {
        let mut registry = Registry::default();
        for conversation in conversations {
            registry.insert(conversation);
        }
        registry
    }

    fn insert(&mut self, conversation: Conversation) -> SharedEntry {
        let id = conversation.conversation_id.clone();
        let entry = Arc::new(Mutex::new(ConversationEntry::new(conversation)));
        self.order.push(entry.clone());
        self.by_id.insert(id, entry.clone());
        entry
    }
}

/// Outcome of [`ConversationAggregator::advance_status`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPatch {
    /// The status moved forward
    Applied,
    /// The mirror already holds this status or a later one
    Stale,
    /// The conversation or message is not mirrored
    Missing,
}

/// In-memory mirror of the store, grouped by conversation.
///
/// Each conversation has its own lock, so updates to different conversations
/// never contend. The registry lock is only taken for writing when a new
/// conversation appears or the mirror is reloaded.
#[derive(Default)]
pub struct ConversationAggregator {
    registry: RwLock<Registry>,
    commit: Mutex<()>,
}

impl ConversationAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mirror from records in store order
    pub fn from_records(records: impl IntoIterator<Item = MessageRecord>) -> Self {
        Self::from_conversations(rebuild(records))
    }

    /// Build a mirror from already grouped conversations
    pub fn from_conversations(conversations: Vec<Conversation>) -> Self {
        Self {
            registry: RwLock::new(Registry::from_conversations(conversations)),
            commit: Mutex::new(()),
        }
    }

    /// Serializes a mirror change with the broadcast that announces it.
    ///
    /// Writers that publish hold this guard from the mirror update until the
    /// event is queued, so subscribers observe changes in mirror order. Never
    /// hold it across a store call.
    pub async fn commit_guard(&self) -> MutexGuard<'_, ()> {
        self.commit.lock().await
    }

    /// Replace the whole mirror
    pub async fn reload(&self, conversations: Vec<Conversation>) {
        let mut registry = self.registry.write().await;
        *registry = Registry::from_conversations(conversations);
        debug!(conversations = registry.order.len(), "aggregator reloaded");
    }

    /// Merge a freshly persisted record. Returns whether the mirror changed.
    pub async fn apply_new_message(&self, record: MessageRecord) -> bool {
        let existing = self
            .registry
            .read()
            .await
            .by_id
            .get(record.conversation_id())
            .cloned();

        let entry = match existing {
            Some(entry) => entry,
            None => {
                let mut registry = self.registry.write().await;
                // Another task may have created it while we waited for the write lock.
                match registry.by_id.get(record.conversation_id()).cloned() {
                    Some(entry) => entry,
                    None => {
                        debug!(
                            conversation_id = record.conversation_id(),
                            "conversation created"
                        );
                        registry.insert(Conversation::from_record(record));
                        return true;
                    }
                }
            }
        };

        let mut entry = entry.lock().await;
        let message_id = record.message.message_id.clone();
        let merged = entry.merge(record.message);
        if !merged {
            debug!(
                conversation_id = %entry.conversation.conversation_id,
                message_id = %message_id,
                "message already present"
            );
        }
        merged
    }

    /// Replace a message's status. Unknown conversations and messages are ignored.
    pub async fn apply_status_update(
        &self,
        conversation_id: &str,
        message_id: &str,
        status: MessageStatus,
    ) -> bool {
        self.patch_status(conversation_id, message_id, status, |_| true)
            .await
            != StatusPatch::Missing
    }

    /// Like [`apply_status_update`](Self::apply_status_update), but only moves
    /// the status forward along the delivery lifecycle.
    pub async fn advance_status(
        &self,
        conversation_id: &str,
        message_id: &str,
        status: MessageStatus,
    ) -> StatusPatch {
        self.patch_status(conversation_id, message_id, status, |current| {
            current.can_transition_to(status)
        })
        .await
    }

    async fn patch_status(
        &self,
        conversation_id: &str,
        message_id: &str,
        status: MessageStatus,
        accept: impl FnOnce(MessageStatus) -> bool,
    ) -> StatusPatch {
        let Some(entry) = self.registry.read().await.by_id.get(conversation_id).cloned() else {
            return StatusPatch::Missing;
        };

        let mut entry = entry.lock().await;
        let Some(message) = entry.message_mut(message_id) else {
            return StatusPatch::Missing;
        };

        if message.status == status || !accept(message.status) {
            return StatusPatch::Stale;
        }
        message.status = status;
        StatusPatch::Applied
    }

    /// Point-in-time copy of every conversation in first-seen order
    pub async fn snapshot(&self) -> Vec<Conversation> {
        let registry = self.registry.read().await;
        let mut conversations = Vec::with_capacity(registry.order.len());
        for entry in &registry.order {
            conversations.push(entry.lock().await.conversation.clone());
        }
        conversations
    }

    pub async fn conversation(&self, conversation_id: &str) -> Option<Conversation> {
        let entry = self
            .registry
            .read()
            .await
            .by_id
            .get(conversation_id)
            .cloned()?;
        let conversation = entry.lock().await.conversation.clone();
        Some(conversation)
    }

    /// Number of conversations
    pub async fn len(&self) -> usize {
        self.registry.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
