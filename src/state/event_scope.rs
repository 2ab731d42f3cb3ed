//! Pending event triggers per event scope.

use crate::Key;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};

/// A pending event delivered into a scope, waiting to be injected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTrigger {
    /// Unique within the scope; consumption order is ascending event key
    pub event_key: Key,

    /// The catch element to activate
    pub element_id: String,

    /// Opaque variables payload
    pub variables: Bytes,
}

/// Store of event triggers, ordered by event key per scope
#[derive(Debug, Default)]
pub struct EventScopeStore {
    triggers: HashMap<Key, BTreeMap<Key, EventTrigger>>,
}

impl EventScopeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a trigger at a scope.
    pub fn trigger_event(
        &mut self,
        scope_key: Key,
        event_key: Key,
        element_id: impl Into<String>,
        variables: Bytes,
    ) {
        self.triggers.entry(scope_key).or_default().insert(
            event_key,
            EventTrigger {
                event_key,
                element_id: element_id.into(),
                variables,
            },
        );
    }

    /// Earliest outstanding trigger of a scope, if any.
    pub fn peek_event_trigger(&self, scope_key: Key) -> Option<&EventTrigger> {
        self.triggers
            .get(&scope_key)
            .and_then(|triggers| triggers.values().next())
    }

    /// Delete a trigger; the trigger is consumed atomically with this call.
    pub fn delete_trigger(&mut self, scope_key: Key, event_key: Key) {
        if let Some(triggers) = self.triggers.get_mut(&scope_key) {
            triggers.remove(&event_key);
            if triggers.is_empty() {
                self.triggers.remove(&scope_key);
            }
        }
    }

    /// Drop all triggers of a scope.
    pub fn delete_scope(&mut self, scope_key: Key) {
        self.triggers.remove(&scope_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peek_returns_earliest_event_key() {
        let mut store = EventScopeStore::new();
        store.trigger_event(1, 30, "b", Bytes::new());
        store.trigger_event(1, 10, "a", Bytes::new());
        store.trigger_event(1, 20, "c", Bytes::new());

        let trigger = store.peek_event_trigger(1).unwrap();
        assert_eq!(trigger.event_key, 10);
        assert_eq!(trigger.element_id, "a");
    }

    #[test]
    fn test_triggers_consumed_in_ascending_order() {
        let mut store = EventScopeStore::new();
        store.trigger_event(1, 5, "a", Bytes::new());
        store.trigger_event(1, 3, "b", Bytes::new());
        store.trigger_event(1, 9, "c", Bytes::new());

        let mut consumed = Vec::new();
        while let Some(trigger) = store.peek_event_trigger(1).cloned() {
            consumed.push(trigger.event_key);
            store.delete_trigger(1, trigger.event_key);
        }

        assert_eq!(consumed, vec![3, 5, 9]);
        assert!(store.peek_event_trigger(1).is_none());
    }

    #[test]
    fn test_scopes_are_independent() {
        let mut store = EventScopeStore::new();
        store.trigger_event(1, 1, "a", Bytes::new());
        store.trigger_event(2, 2, "b", Bytes::new());

        store.delete_trigger(1, 1);
        assert!(store.peek_event_trigger(1).is_none());
        assert_eq!(store.peek_event_trigger(2).unwrap().event_key, 2);
    }
}
