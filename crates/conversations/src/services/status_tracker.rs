//! Delivery status lifecycle.

use std::sync::Arc;

use courier_database::{MessageStatus, MessageStore, StatusUpdate, StoreError};
use tracing::{debug, info, warn};

use crate::services::{BroadcastHub, ConversationAggregator, StatusPatch};
use crate::types::{HubEvent, SyncError, SyncResult};

/// Attempts of the read-validate-write cycle before a conflict is surfaced
const MAX_ATTEMPTS: usize = 3;

/// Result of a status request that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// The stored status moved forward
    Applied { previous: MessageStatus },
    /// The message already had the requested status
    Unchanged,
}

/// Applies status transitions to the store, then the mirror, then subscribers.
pub struct StatusTracker<S> {
    store: Arc<S>,
    aggregator: Arc<ConversationAggregator>,
    hub: BroadcastHub,
}

impl<S: MessageStore> StatusTracker<S> {
    pub fn new(store: Arc<S>, aggregator: Arc<ConversationAggregator>, hub: BroadcastHub) -> Self {
        Self {
            store,
            aggregator,
            hub,
        }
    }

    pub async fn set_status(
        &self,
        conversation_id: &str,
        message_id: &str,
        status: MessageStatus,
    ) -> SyncResult<StatusChange> {
        let mut attempt = 0;
        let (previous, mut record) = loop {
            attempt += 1;

            let record = self
                .store
                .find(conversation_id, message_id)
                .await?
                .ok_or_else(|| SyncError::not_found(conversation_id, message_id))?;

            let current = record.message.status;
            if current == status {
                debug!(conversation_id, message_id, %status, "status unchanged");
                return Ok(StatusChange::Unchanged);
            }
            if !current.can_transition_to(status) {
                warn!(conversation_id, message_id, from = %current, to = %status, "rejected status transition");
                return Err(SyncError::InvalidTransition {
                    from: current,
                    to: status,
                });
            }

            match self
                .store
                .update_status(conversation_id, message_id, current, status)
                .await
            {
                Ok(()) => break (current, record),
                Err(StoreError::Conflict { .. }) if attempt < MAX_ATTEMPTS => {
                    debug!(conversation_id, message_id, attempt, "status changed concurrently, retrying");
                }
                Err(e) => {
                    warn!(conversation_id, message_id, error = %e, "status update failed");
                    return Err(e.into());
                }
            }
        };

        let _commit = self.aggregator.commit_guard().await;
        let patch = match self
            .aggregator
            .advance_status(conversation_id, message_id, status)
            .await
        {
            StatusPatch::Missing => {
                // The receive that stored this message has not reached the mirror yet.
                record.message.status = status;
                if self.aggregator.apply_new_message(record.clone()).await {
                    self.hub.publish(HubEvent::NewMessage(record)).await;
                }
                StatusPatch::Applied
            }
            patch => patch,
        };

        if patch == StatusPatch::Stale {
            debug!(conversation_id, message_id, %status, "mirror already past this status");
        } else {
            self.hub
                .publish(HubEvent::StatusUpdated(StatusUpdate {
                    conversation_id: conversation_id.to_string(),
                    message_id: message_id.to_string(),
                    status,
                }))
                .await;
        }

        info!(conversation_id, message_id, from = %previous, to = %status, "message status changed");
        Ok(StatusChange::Applied { previous })
    }
}
