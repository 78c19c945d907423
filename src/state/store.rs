//! The state store itself.

use crate::bus::PubSubBus;
use crate::types::Topic;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// One key's value plus the value it replaced.
///
/// Two slots by construction; there is no deeper history to truncate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    pub current: Value,
    pub previous: Option<Value>,
}

impl StateEntry {
    fn first(value: Value) -> Self {
        Self {
            current: value,
            previous: None,
        }
    }

    /// Shift a new value in, retiring `current` to `previous`.
    fn push(&mut self, value: Value) {
        self.previous = Some(std::mem::replace(&mut self.current, value));
    }

    /// Most-recent-first view: `[current]` or `[current, previous]`.
    pub fn history(&self) -> Vec<&Value> {
        match &self.previous {
            Some(prev) => vec![&self.current, prev],
            None => vec![&self.current],
        }
    }
}

/// Single source of truth for named observable values.
///
/// Every accepted mutation publishes on the bus before the call returns:
/// a changed key publishes its new value on the key's own topic, a cleared
/// key publishes its name on [`Topic::cleared`]. Values compare by shallow
/// equality only — objects and arrays are always treated as changed, so
/// callers setting structured values should check for difference themselves
/// if re-sets are possible.
pub struct StateStore {
    entries: RwLock<HashMap<String, StateEntry>>,
    bus: Arc<dyn PubSubBus>,
}

impl StateStore {
    pub fn new(bus: Arc<dyn PubSubBus>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            bus,
        }
    }

    /// Record `value` under `key`, broadcasting if it is a real change.
    ///
    /// Setting a key to its current value (primitives only) is a no-op with
    /// no broadcast. The bus lock is released before dispatch, so handlers
    /// may read the store or set other keys.
    pub fn set_state(&self, key: impl Into<String>, value: Value) {
        let key = key.into();

        let accepted = {
            let mut entries = self.entries.write();
            match entries.entry(key.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(StateEntry::first(value.clone()));
                    true
                }
                Entry::Occupied(mut slot) => {
                    let entry = slot.get_mut();
                    if primitive_eq(&entry.current, &value) {
                        false
                    } else {
                        entry.push(value.clone());
                        true
                    }
                }
            }
        };

        if accepted {
            debug!(key = %key, value = %value, "state change");
            self.bus.publish(&Topic::new(key), &value);
        }
    }

    /// Cloned snapshot of the full key → entry mapping. Mutating the
    /// returned map never affects the store.
    pub fn get_state(&self) -> HashMap<String, StateEntry> {
        self.entries.read().clone()
    }

    /// Snapshot of a single entry.
    pub fn get(&self, key: &str) -> Option<StateEntry> {
        self.entries.read().get(key).cloned()
    }

    /// Current value of a single key.
    pub fn current(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).map(|e| e.current.clone())
    }

    /// Remove `key` unconditionally and broadcast the removal.
    ///
    /// Clearing an absent key is fine; the cleared notification goes out
    /// either way.
    pub fn clear_state(&self, key: &str) {
        self.entries.write().remove(key);
        debug!(key = %key, "state cleared");
        self.bus.publish(&Topic::cleared(), &Value::String(key.to_string()));
    }

    /// Diagnostic dump of the current mapping.
    pub fn log_state(&self) {
        info!(state = ?*self.entries.read(), "state dump");
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Shallow equality: primitives by value, structured values never equal.
fn primitive_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::LocalBus;
    use crate::types::Subscriber;
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store_with_bus() -> (StateStore, Arc<LocalBus>) {
        let bus = Arc::new(LocalBus::new());
        (StateStore::new(bus.clone()), bus)
    }

    fn count_on(bus: &Arc<LocalBus>, topic: &str) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        bus.subscribe(
            Topic::new(topic),
            Subscriber::new(format!("count-{topic}"), move |_t, _v| {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        );
        count
    }

    #[test]
    fn test_two_sets_keep_both_values() {
        let (store, _bus) = store_with_bus();
        store.set_state("zone", json!("ward"));
        store.set_state("zone", json!("tract"));

        let entry = store.get("zone").unwrap();
        assert_eq!(entry.history(), vec![&json!("tract"), &json!("ward")]);
    }

    #[test]
    fn test_equal_primitive_set_is_silent() {
        let (store, bus) = store_with_bus();
        let broadcasts = count_on(&bus, "zone");

        store.set_state("zone", json!("ward"));
        store.set_state("zone", json!("ward"));

        let entry = store.get("zone").unwrap();
        assert_eq!(entry.history(), vec![&json!("ward")]);
        assert_eq!(broadcasts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_structured_values_always_count_as_changed() {
        let (store, bus) = store_with_bus();
        let broadcasts = count_on(&bus, "filter");

        store.set_state("filter", json!({"overlay": "crime"}));
        store.set_state("filter", json!({"overlay": "crime"}));

        let entry = store.get("filter").unwrap();
        assert_eq!(entry.history().len(), 2);
        assert_eq!(broadcasts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_clear_removes_and_broadcasts() {
        let (store, bus) = store_with_bus();
        let cleared = count_on(&bus, crate::types::CLEARED_TOPIC);

        store.set_state("zone", json!("ward"));
        store.clear_state("zone");

        assert!(store.get("zone").is_none());
        assert_eq!(cleared.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear_absent_key_still_broadcasts_name() {
        let (store, bus) = store_with_bus();
        let payloads = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&payloads);
        bus.subscribe(
            Topic::cleared(),
            Subscriber::new("record-cleared", move |_t, v| {
                sink.lock().push(v.clone());
            }),
        );

        store.clear_state("never-set");

        assert_eq!(*payloads.lock(), vec![json!("never-set")]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let (store, _bus) = store_with_bus();
        store.set_state("zone", json!("ward"));

        let mut snapshot = store.get_state();
        snapshot.remove("zone");

        assert!(store.get("zone").is_some());
    }

    #[test]
    fn test_handler_may_set_other_keys() {
        let (store, bus) = store_with_bus();
        let store = Arc::new(store);

        let inner = Arc::clone(&store);
        bus.subscribe(
            Topic::new("dataLoaded.crime"),
            Subscriber::new("chain", move |_t, _v| {
                inner.set_state("overlayReady", json!(true));
            }),
        );

        store.set_state("dataLoaded.crime", json!(true));
        assert_eq!(store.current("overlayReady"), Some(json!(true)));
    }

    proptest! {
        #[test]
        fn prop_history_depth_never_exceeds_two(values in proptest::collection::vec(0u32..1000, 1..50)) {
            let (store, _bus) = store_with_bus();
            for v in &values {
                store.set_state("k", json!(v));
            }
            let entry = store.get("k").unwrap();
            prop_assert!(entry.history().len() <= 2);
        }

        #[test]
        fn prop_latest_distinct_value_wins(a in 0u32..1000, b in 0u32..1000) {
            prop_assume!(a != b);
            let (store, _bus) = store_with_bus();
            store.set_state("k", json!(a));
            store.set_state("k", json!(b));
            let entry = store.get("k").unwrap();
            let (b_val, a_val) = (json!(b), json!(a));
            prop_assert_eq!(entry.history(), vec![&b_val, &a_val]);
        }
    }
}
