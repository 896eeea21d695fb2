//! Typing signals: relay on the sending side, expiring indicator on the receiving side.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::services::{BroadcastHub, SubscriberId};
use crate::types::HubEvent;

pub const DEFAULT_TYPING_TIMEOUT: Duration = Duration::from_millis(1500);

/// Forwards typing signals to every subscriber except the one typing.
#[derive(Clone)]
pub struct TypingRelay {
    hub: BroadcastHub,
}

impl TypingRelay {
    pub fn new(hub: BroadcastHub) -> Self {
        Self { hub }
    }

    /// Returns how many subscribers were notified.
    pub async fn signal_typing(&self, origin: SubscriberId, conversation_id: &str) -> usize {
        if conversation_id.trim().is_empty() {
            debug!(origin, "ignored typing signal without conversation");
            return 0;
        }

        self.hub
            .publish_except(HubEvent::UserTyping(conversation_id.to_string()), origin)
            .await
    }
}

struct PendingExpiry {
    generation: u64,
    handle: JoinHandle<()>,
}

struct IndicatorInner {
    timeout: Duration,
    timers: Mutex<HashMap<String, PendingExpiry>>,
    generation: AtomicU64,
    active: watch::Sender<HashSet<String>>,
}

/// Tracks which conversations show "typing…", clearing each after a quiet period.
#[derive(Clone)]
pub struct TypingIndicator {
    inner: Arc<IndicatorInner>,
}

impl Default for TypingIndicator {
    fn default() -> Self {
        Self::new(DEFAULT_TYPING_TIMEOUT)
    }
}

impl TypingIndicator {
    pub fn new(timeout: Duration) -> Self {
        let (active, _) = watch::channel(HashSet::new());
        Self {
            inner: Arc::new(IndicatorInner {
                timeout,
                timers: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                active,
            }),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Mark a conversation as typing and restart its expiry timer
    pub async fn signal(&self, conversation_id: &str) {
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.clone();
        let key = conversation_id.to_string();

        let mut timers = self.inner.timers.lock().await;

        let handle = tokio::spawn({
            let key = key.clone();
            async move {
                tokio::time::sleep(inner.timeout).await;
                let mut timers = inner.timers.lock().await;
                // A newer signal may have replaced this timer after it fired.
                if timers.get(&key).map(|p| p.generation) == Some(generation) {
                    timers.remove(&key);
                    inner.active.send_modify(|active| {
                        active.remove(&key);
                    });
                    debug!(conversation_id = %key, "typing indicator expired");
                }
            }
        });

        if let Some(previous) = timers.insert(key.clone(), PendingExpiry { generation, handle }) {
            previous.handle.abort();
        }
        self.inner.active.send_if_modified(|active| active.insert(key));
    }

    /// Clear a conversation immediately
    pub async fn clear(&self, conversation_id: &str) {
        if let Some(pending) = self.inner.timers.lock().await.remove(conversation_id) {
            pending.handle.abort();
            self.inner.active.send_modify(|active| {
                active.remove(conversation_id);
            });
        }
    }

    pub async fn is_typing(&self, conversation_id: &str) -> bool {
        self.inner.timers.lock().await.contains_key(conversation_id)
    }

    /// Watch the set of conversations currently typing
    pub fn changes(&self) -> watch::Receiver<HashSet<String>> {
        self.inner.active.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn test_indicator_expires_after_timeout() {
        let indicator = TypingIndicator::new(Duration::from_millis(1500));

        indicator.signal("a").await;
        assert!(indicator.is_typing("a").await);

        sleep(Duration::from_millis(1400)).await;
        assert!(indicator.is_typing("a").await);

        sleep(Duration::from_millis(200)).await;
        assert!(!indicator.is_typing("a").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_signal_resets_timer() {
        let indicator = TypingIndicator::new(Duration::from_millis(1500));

        indicator.signal("a").await;
        sleep(Duration::from_millis(1000)).await;
        indicator.signal("a").await;

        // 2000ms after the first signal, 1000ms after the second.
        sleep(Duration::from_millis(1000)).await;
        assert!(indicator.is_typing("a").await);

        sleep(Duration::from_millis(600)).await;
        assert!(!indicator.is_typing("a").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_conversations_expire_independently() {
        let indicator = TypingIndicator::new(Duration::from_millis(1000));

        indicator.signal("a").await;
        sleep(Duration::from_millis(600)).await;
        indicator.signal("b").await;
        sleep(Duration::from_millis(500)).await;

        assert!(!indicator.is_typing("a").await);
        assert!(indicator.is_typing("b").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_changes_track_active_set() {
        let indicator = TypingIndicator::new(Duration::from_millis(1000));
        let mut changes = indicator.changes();

        indicator.signal("a").await;
        changes.changed().await.unwrap();
        assert!(changes.borrow_and_update().contains("a"));

        changes.changed().await.unwrap();
        assert!(changes.borrow_and_update().is_empty());
    }

    #[tokio::test]
    async fn test_clear_drops_pending_timer() {
        let indicator = TypingIndicator::default();

        indicator.signal("a").await;
        indicator.clear("a").await;

        assert!(!indicator.is_typing("a").await);
        assert_eq!(indicator.timeout(), DEFAULT_TYPING_TIMEOUT);
    }

    #[tokio::test]
    async fn test_relay_skips_origin() {
        let hub = BroadcastHub::new();
        let relay = TypingRelay::new(hub.clone());
        let mut origin = hub.subscribe().await;
        let mut peer = hub.subscribe().await;

        assert_eq!(relay.signal_typing(origin.id(), "+15550001").await, 1);
        assert_eq!(
            peer.recv().await,
            Some(HubEvent::UserTyping("+15550001".to_string()))
        );
        assert!(origin.try_recv().is_none());
        assert_eq!(relay.signal_typing(origin.id(), " ").await, 0);
    }
}
