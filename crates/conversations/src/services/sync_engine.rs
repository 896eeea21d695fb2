//! Persist, merge, broadcast.

use std::sync::Arc;

use courier_database::{AppendOutcome, Conversation, MessageRecord, MessageStatus, MessageStore};
use tracing::{debug, info, warn};

use crate::services::{
    BroadcastHub, ConversationAggregator, StatusChange, StatusTracker, SubscriberId, Subscription,
    TypingRelay,
};
use crate::types::{HubEvent, SyncError, SyncResult};

/// Entry point for every ingest operation.
///
/// Each operation awaits the store first and only then touches the in-memory
/// mirror and the hub, so subscribers never see an event for a write that
/// failed.
pub struct SyncEngine<S> {
    store: Arc<S>,
    aggregator: Arc<ConversationAggregator>,
    hub: BroadcastHub,
    tracker: StatusTracker<S>,
    typing: TypingRelay,
}

impl<S: MessageStore> SyncEngine<S> {
    /// Build the engine and prime the mirror from the store
    pub async fn load(store: S, hub: BroadcastHub) -> SyncResult<Self> {
        let store = Arc::new(store);
        let records = store.query_all().await?;
        let message_count = records.len();
        let aggregator = Arc::new(ConversationAggregator::from_records(records));

        info!(
            conversations = aggregator.len().await,
            messages = message_count,
            "conversation mirror loaded"
        );

        Ok(Self {
            tracker: StatusTracker::new(store.clone(), aggregator.clone(), hub.clone()),
            typing: TypingRelay::new(hub.clone()),
            store,
            aggregator,
            hub,
        })
    }

    /// Ingest a message. Duplicates succeed without a second broadcast.
    pub async fn receive(&self, record: MessageRecord) -> SyncResult<AppendOutcome> {
        record.validate().map_err(SyncError::validation)?;

        let outcome = self.store.append(&record).await.map_err(|e| {
            warn!(
                conversation_id = record.conversation_id(),
                message_id = record.message_id(),
                error = %e,
                "failed to store message"
            );
            SyncError::from(e)
        })?;

        if outcome.is_duplicate() {
            debug!(
                conversation_id = record.conversation_id(),
                message_id = record.message_id(),
                "duplicate delivery acknowledged"
            );
            return Ok(outcome);
        }

        let _commit = self.aggregator.commit_guard().await;
        if self.aggregator.apply_new_message(record.clone()).await {
            self.hub.publish(HubEvent::NewMessage(record)).await;
        } else {
            // A status update for this message already merged and announced it.
            debug!(
                conversation_id = record.conversation_id(),
                message_id = record.message_id(),
                "message already mirrored"
            );
        }

        Ok(outcome)
    }

    pub async fn set_status(
        &self,
        conversation_id: &str,
        message_id: &str,
        status: MessageStatus,
    ) -> SyncResult<StatusChange> {
        self.tracker
            .set_status(conversation_id, message_id, status)
            .await
    }

    /// Grouped history as currently mirrored
    pub async fn history(&self) -> Vec<Conversation> {
        self.aggregator.snapshot().await
    }

    /// Rebuild the mirror from the store
    pub async fn reload(&self) -> SyncResult<()> {
        let records = self.store.query_all().await?;
        self.aggregator
            .reload(crate::services::rebuild(records))
            .await;
        Ok(())
    }

    pub async fn signal_typing(&self, origin: SubscriberId, conversation_id: &str) -> usize {
        self.typing.signal_typing(origin, conversation_id).await
    }

    pub async fn subscribe(&self) -> Subscription {
        self.hub.subscribe().await
    }

    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.hub.unsubscribe(id).await
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    pub fn aggregator(&self) -> &ConversationAggregator {
        &self.aggregator
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
