//! The live fan-out side of SSE delivery (spec §4.4, §5).
//!
//! A bounded channel per subscriber, keyed per-stream so only subscribers of
//! a given session/card stream see its frames, backed by `mpsc` so overflow
//! is observable and terminates the subscriber rather than silently dropping
//! frames.

use crate::frame::SseFrame;
use dashmap::DashMap;
use std::hash::Hash;
use tokio::sync::mpsc;

/// Bounded per-subscriber buffer (spec §5: "e.g. 256 frames").
pub const SUBSCRIBER_BUFFER: usize = 256;

pub struct Subscription {
    pub id: u64,
    receiver: mpsc::Receiver<SseFrame>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<SseFrame> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<SseFrame> {
        self.receiver.try_recv().ok()
    }
}

struct Subscriber {
    id: u64,
    sender: mpsc::Sender<SseFrame>,
}

/// Fans out frames to subscribers of a keyed set of streams (session ids or
/// a single well-known key for the public agent-card stream). The
/// subscriber-list mutation is the only thing held behind a lock; delivery
/// itself fans out without holding it.
pub struct Broadcaster<K: Eq + Hash + Clone> {
    subscribers: DashMap<K, Vec<Subscriber>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl<K: Eq + Hash + Clone> Default for Broadcaster<K> {
    fn default() -> Self {
        Self {
            subscribers: DashMap::new(),
            next_id: std::sync::atomic::AtomicU64::new(1),
        }
    }
}

impl<K: Eq + Hash + Clone> Broadcaster<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber for `key` and returns its receiving half.
    pub fn subscribe(&self, key: K) -> Subscription {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers
            .entry(key)
            .or_default()
            .push(Subscriber { id, sender: tx });
        Subscription { id, receiver: rx }
    }

    pub fn unsubscribe(&self, key: &K, subscription_id: u64) {
        if let Some(mut list) = self.subscribers.get_mut(key) {
            list.retain(|s| s.id != subscription_id);
        }
    }

    /// Publishes `frame` to every current subscriber of `key`. A subscriber
    /// whose buffer is full is dropped with a terminal disconnect rather
    /// than blocking this call (spec §5 back-pressure policy); the
    /// broadcaster itself never panics or stalls because one client is
    /// slow.
    pub fn publish(&self, key: &K, frame: SseFrame) {
        let Some(mut list) = self.subscribers.get_mut(key) else {
            return;
        };
        list.retain(|sub| match sub.sender.try_send(frame.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(subscriber_id = sub.id, "sse subscriber overflowed buffer, dropping");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    pub fn subscriber_count(&self, key: &K) -> usize {
        self.subscribers.get(key).map(|l| l.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscribed_stream_only() {
        let broadcaster: Broadcaster<String> = Broadcaster::new();
        let mut sub_a = broadcaster.subscribe("stream_a".to_string());
        let mut sub_b = broadcaster.subscribe("stream_b".to_string());

        broadcaster.publish(
            &"stream_a".to_string(),
            SseFrame::event("session.event", "evt_1", serde_json::json!({})),
        );

        let got = sub_a.recv().await;
        assert!(matches!(got, Some(SseFrame::Event { .. })));

        drop(sub_b);
    }

    #[tokio::test]
    async fn overflowing_subscriber_is_dropped_without_blocking() {
        let broadcaster: Broadcaster<String> = Broadcaster::new();
        let key = "s1".to_string();
        let sub = broadcaster.subscribe(key.clone());

        for _ in 0..(SUBSCRIBER_BUFFER + 10) {
            broadcaster.publish(&key, SseFrame::keep_alive());
        }

        assert_eq!(broadcaster.subscriber_count(&key), 0);
        drop(sub);
    }

    #[tokio::test]
    async fn unsubscribe_removes_from_list() {
        let broadcaster: Broadcaster<String> = Broadcaster::new();
        let key = "s1".to_string();
        let sub = broadcaster.subscribe(key.clone());
        assert_eq!(broadcaster.subscriber_count(&key), 1);
        broadcaster.unsubscribe(&key, sub.id);
        assert_eq!(broadcaster.subscriber_count(&key), 0);
    }
}
