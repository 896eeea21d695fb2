//! In-process fan-out of hub events to live subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use crate::types::HubEvent;

/// Identifies one subscriber for the lifetime of a hub
pub type SubscriberId = u64;

/// Receiving end of a hub subscription
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::UnboundedReceiver<HubEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next event. Returns `None` once the subscriber was removed.
    pub async fn recv(&mut self) -> Option<HubEvent> {
        self.receiver.recv().await
    }

    /// Take the next queued event without waiting
    pub fn try_recv(&mut self) -> Option<HubEvent> {
        self.receiver.try_recv().ok()
    }

    pub fn into_parts(self) -> (SubscriberId, mpsc::UnboundedReceiver<HubEvent>) {
        (self.id, self.receiver)
    }
}

#[derive(Default)]
struct HubInner {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::UnboundedSender<HubEvent>>>,
    next_id: AtomicU64,
}

/// Broadcast hub shared between the sync pipeline and connected clients.
///
/// Cloning yields another handle to the same subscriber registry. Separate
/// `BroadcastHub::new()` calls never share subscribers.
#[derive(Clone, Default)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber
    pub async fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (sender, receiver) = mpsc::unbounded_channel();

        self.inner.subscribers.write().await.insert(id, sender);
        debug!(subscriber_id = id, "subscriber registered");

        Subscription { id, receiver }
    }

    /// Remove a subscriber. Returns whether it was registered.
    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.inner.subscribers.write().await.remove(&id).is_some();
        if removed {
            debug!(subscriber_id = id, "subscriber removed");
        }
        removed
    }

    /// Deliver an event to every subscriber. Returns how many received it.
    pub async fn publish(&self, event: HubEvent) -> usize {
        self.deliver(event, None).await
    }

    /// Deliver an event to every subscriber except `origin`
    pub async fn publish_except(&self, event: HubEvent, origin: SubscriberId) -> usize {
        self.deliver(event, Some(origin)).await
    }

    pub async fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().await.len()
    }

    async fn deliver(&self, event: HubEvent, skip: Option<SubscriberId>) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        {
            let subscribers = self.inner.subscribers.read().await;
            for (id, sender) in subscribers.iter() {
                if Some(*id) == skip {
                    continue;
                }
                match sender.send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(_) => closed.push(*id),
                }
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.inner.subscribers.write().await;
            for id in &closed {
                subscribers.remove(id);
            }
            debug!(pruned = closed.len(), "pruned closed subscribers");
        }

        debug!(
            event = event.event_name(),
            conversation_id = event.conversation_id(),
            delivered,
            "published hub event"
        );
        delivered
    }
}
