//! Registry of (topic, handler) subscriptions.

use crate::bus::{BusToken, PubSubBus};
use crate::error::{Error, Result};
use crate::types::{HandlerKey, Subscriber, Topic};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Wraps a [`PubSubBus`] so that (topic, handler) registration is
/// duplicate-checked and reversible.
///
/// The registry exclusively owns the bus tokens; callers identify a
/// subscription by its `(Topic, HandlerKey)` pair and never see a token.
/// Registering an already-active pair or cancelling a missing one is a
/// programmer error and fails immediately, not a condition to retry.
pub struct SubscriptionRegistry {
    /// handler key → topic → bus token.
    buckets: RwLock<HashMap<HandlerKey, HashMap<Topic, BusToken>>>,
    bus: Arc<dyn PubSubBus>,
}

impl SubscriptionRegistry {
    pub fn new(bus: Arc<dyn PubSubBus>) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            bus,
        }
    }

    /// Register a batch of (topic, subscriber) pairs, in order.
    ///
    /// Fails on the first pair whose `(handler key, topic)` is already
    /// active. Pairs before the failing one stay registered; pairs after it
    /// are not attempted.
    pub fn set_subs(&self, pairs: impl IntoIterator<Item = (Topic, Subscriber)>) -> Result<()> {
        for (topic, subscriber) in pairs {
            self.set_sub(topic, subscriber)?;
        }
        Ok(())
    }

    /// Register a single (topic, subscriber) pair.
    pub fn set_sub(&self, topic: Topic, subscriber: Subscriber) -> Result<()> {
        let key = subscriber.key().clone();

        {
            let buckets = self.buckets.read();
            if buckets.get(&key).is_some_and(|b| b.contains_key(&topic)) {
                return Err(Error::DuplicateSubscription {
                    topic,
                    handler: key,
                });
            }
        }

        let token = self.bus.subscribe(topic.clone(), subscriber);
        debug!(topic = %topic, handler = %key, "subscription registered");

        self.buckets
            .write()
            .entry(key)
            .or_default()
            .insert(topic, token);
        Ok(())
    }

    /// Cancel one (topic, handler) subscription.
    ///
    /// The handler's bucket is dropped entirely once its last topic is
    /// cancelled, so the key is immediately reusable.
    pub fn cancel_sub(&self, topic: &Topic, key: &HandlerKey) -> Result<()> {
        let token = {
            let mut buckets = self.buckets.write();
            let Some(bucket) = buckets.get_mut(key) else {
                return Err(Error::SubscriptionNotFound {
                    topic: topic.clone(),
                    handler: key.clone(),
                });
            };
            let Some(token) = bucket.remove(topic) else {
                return Err(Error::SubscriptionNotFound {
                    topic: topic.clone(),
                    handler: key.clone(),
                });
            };
            if bucket.is_empty() {
                buckets.remove(key);
            }
            token
        };

        self.bus.unsubscribe(token);
        debug!(topic = %topic, handler = %key, "subscription cancelled");
        Ok(())
    }

    /// Cancel every subscription for a handler, across all topics.
    ///
    /// Idempotent: a handler with no active subscriptions is a no-op.
    pub fn cancel_function(&self, key: &HandlerKey) {
        let removed = self.bus.unsubscribe_key(key);
        self.buckets.write().remove(key);
        debug!(handler = %key, removed, "handler cancelled");
    }

    /// Whether `(topic, key)` is currently registered.
    pub fn is_subscribed(&self, topic: &Topic, key: &HandlerKey) -> bool {
        self.buckets
            .read()
            .get(key)
            .is_some_and(|b| b.contains_key(topic))
    }

    /// Number of active subscriptions across all handlers.
    pub fn subscription_count(&self) -> usize {
        self.buckets.read().values().map(|b| b.len()).sum()
    }

    /// Diagnostic dump of the bucket structure.
    pub fn log_subs(&self) {
        let buckets = self.buckets.read();
        let shape: HashMap<&HandlerKey, Vec<&Topic>> = buckets
            .iter()
            .map(|(key, bucket)| (key, bucket.keys().collect()))
            .collect();
        info!(subscriptions = ?shape, "subscription dump");
    }
}
