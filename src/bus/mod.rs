//! Synchronous publish/subscribe bus.
//!
//! The state store and the subscription registry both sit on top of a
//! [`PubSubBus`]. [`LocalBus`] is the in-process implementation; the trait
//! exists so tests and embedders can substitute their own transport.

use crate::types::{Callback, HandlerKey, Subscriber, Topic};
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Opaque handle for one bus subscription.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BusToken(pub u64);

impl fmt::Debug for BusToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BusToken({})", self.0)
    }
}

/// Contract the core depends on: synchronous fire-and-forget publish, with
/// every currently matching subscriber invoked before `publish` returns.
pub trait PubSubBus: Send + Sync {
    /// Deliver `payload` to every subscriber of `topic`.
    fn publish(&self, topic: &Topic, payload: &Value);

    /// Register a subscriber on a topic. Tokens are never reused.
    fn subscribe(&self, topic: Topic, subscriber: Subscriber) -> BusToken;

    /// Remove a single subscription. Returns false if the token is unknown.
    fn unsubscribe(&self, token: BusToken) -> bool;

    /// Remove every subscription carrying `key`, across all topics.
    /// Returns the number removed.
    fn unsubscribe_key(&self, key: &HandlerKey) -> usize;
}

struct BusEntry {
    token: BusToken,
    topic: Topic,
    key: HandlerKey,
    callback: Callback,
}

/// In-process bus.
///
/// Dispatch snapshots the matching subscriber list before invoking any
/// callback: a subscription added during dispatch does not see the in-flight
/// event, and one removed during dispatch may still be invoked once for it.
/// Callbacks must not block; they run on the publishing thread.
pub struct LocalBus {
    entries: RwLock<Vec<BusEntry>>,
    next_token: AtomicU64,
}

impl LocalBus {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Number of active subscriptions across all topics.
    pub fn subscription_count(&self) -> usize {
        self.entries.read().len()
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl PubSubBus for LocalBus {
    fn publish(&self, topic: &Topic, payload: &Value) {
        // Snapshot before dispatch so callbacks can re-enter the bus.
        let matching: Vec<Callback> = {
            let entries = self.entries.read();
            entries
                .iter()
                .filter(|e| &e.topic == topic)
                .map(|e| Callback::clone(&e.callback))
                .collect()
        };

        trace!(topic = %topic, subscribers = matching.len(), "publish");
        for callback in matching {
            callback(topic, payload);
        }
    }

    fn subscribe(&self, topic: Topic, subscriber: Subscriber) -> BusToken {
        let token = BusToken(self.next_token.fetch_add(1, Ordering::SeqCst));
        trace!(topic = %topic, handler = %subscriber.key(), ?token, "subscribe");

        self.entries.write().push(BusEntry {
            token,
            topic,
            key: subscriber.key().clone(),
            callback: subscriber.callback(),
        });
        token
    }

    fn unsubscribe(&self, token: BusToken) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.token != token);
        before != entries.len()
    }

    fn unsubscribe_key(&self, key: &HandlerKey) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| &e.key != key);
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn counting_subscriber(key: &str) -> (Subscriber, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let sub = Subscriber::new(key, move |_t, _v| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (sub, count)
    }

    #[test]
    fn test_publish_reaches_topic_subscribers_only() {
        let bus = LocalBus::new();
        let (sub_a, count_a) = counting_subscriber("a");
        let (sub_b, count_b) = counting_subscriber("b");

        bus.subscribe(Topic::new("t1"), sub_a);
        bus.subscribe(Topic::new("t2"), sub_b);

        bus.publish(&Topic::new("t1"), &json!(1));

        assert_eq!(count_a.load(Ordering::SeqCst), 1);
        assert_eq!(count_b.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsubscribe_by_token() {
        let bus = LocalBus::new();
        let (sub, count) = counting_subscriber("a");

        let token = bus.subscribe(Topic::new("t"), sub);
        assert!(bus.unsubscribe(token));
        assert!(!bus.unsubscribe(token));

        bus.publish(&Topic::new("t"), &json!(1));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsubscribe_key_spans_topics() {
        let bus = LocalBus::new();
        let (sub, count) = counting_subscriber("a");

        bus.subscribe(Topic::new("t1"), sub.clone());
        bus.subscribe(Topic::new("t2"), sub);
        assert_eq!(bus.subscription_count(), 2);

        assert_eq!(bus.unsubscribe_key(&HandlerKey::new("a")), 2);
        assert_eq!(bus.subscription_count(), 0);

        bus.publish(&Topic::new("t1"), &json!(1));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_subscribe_during_dispatch_misses_inflight_event() {
        let bus = Arc::new(LocalBus::new());
        let (late, late_count) = counting_subscriber("late");

        let bus_ref = Arc::clone(&bus);
        let adder = Subscriber::new("adder", move |_t, _v| {
            bus_ref.subscribe(Topic::new("t"), late.clone());
        });
        bus.subscribe(Topic::new("t"), adder);

        bus.publish(&Topic::new("t"), &json!(1));
        assert_eq!(late_count.load(Ordering::SeqCst), 0);

        // The next event does reach it.
        bus.publish(&Topic::new("t"), &json!(2));
        assert_eq!(late_count.load(Ordering::SeqCst), 1);
    }
}
