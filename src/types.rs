//! Core identifier types shared by the bus, the state store, and the
//! subscription registry.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A notification topic on the bus.
///
/// State keys double as topics: `set_state("dataLoaded.crime", ...)`
/// publishes on the topic `dataLoaded.crime`. Key removals go out on the
/// distinguished [`Topic::cleared`] topic instead, carrying the removed
/// key's name as payload.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topic(pub String);

/// Topic on which key removals are announced.
pub const CLEARED_TOPIC: &str = "clearState";

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Topic(name.into())
    }

    /// The distinguished topic for "key cleared" notifications.
    pub fn cleared() -> Self {
        Topic(CLEARED_TOPIC.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Topic({})", self.0)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Topic {
    fn from(s: &str) -> Self {
        Topic(s.to_string())
    }
}

impl From<String> for Topic {
    fn from(s: String) -> Self {
        Topic(s)
    }
}

/// Caller-supplied identity for a handler.
///
/// Two [`Subscriber`]s carrying the same key are the same handler as far as
/// duplicate detection and cancellation are concerned; callers own key
/// uniqueness the same way they own state-key uniqueness.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandlerKey(pub String);

impl HandlerKey {
    pub fn new(name: impl Into<String>) -> Self {
        HandlerKey(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandlerKey({})", self.0)
    }
}

impl fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for HandlerKey {
    fn from(s: &str) -> Self {
        HandlerKey(s.to_string())
    }
}

impl From<String> for HandlerKey {
    fn from(s: String) -> Self {
        HandlerKey(s)
    }
}

/// Shared callback type invoked on publish.
pub type Callback = Arc<dyn Fn(&Topic, &Value) + Send + Sync>;

/// A handler with an explicit identity.
///
/// Cloning shares the underlying callback, so the same `Subscriber` value
/// reused across registration calls maps to the same identity.
#[derive(Clone)]
pub struct Subscriber {
    key: HandlerKey,
    callback: Callback,
}

impl Subscriber {
    pub fn new<F>(key: impl Into<HandlerKey>, callback: F) -> Self
    where
        F: Fn(&Topic, &Value) + Send + Sync + 'static,
    {
        Self {
            key: key.into(),
            callback: Arc::new(callback),
        }
    }

    pub fn key(&self) -> &HandlerKey {
        &self.key
    }

    pub fn callback(&self) -> Callback {
        Arc::clone(&self.callback)
    }

    /// Invoke the callback for one delivery.
    pub fn call(&self, topic: &Topic, payload: &Value) {
        (self.callback)(topic, payload)
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subscriber({})", self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_display_and_cleared() {
        let t = Topic::new("dataLoaded.crime");
        assert_eq!(t.to_string(), "dataLoaded.crime");
        assert_eq!(Topic::cleared().as_str(), CLEARED_TOPIC);
    }

    #[test]
    fn test_subscriber_clone_shares_identity() {
        let sub = Subscriber::new("render", |_t, _v| {});
        let copy = sub.clone();
        assert_eq!(sub.key(), copy.key());
        assert!(Arc::ptr_eq(&sub.callback(), &copy.callback()));
    }
}
