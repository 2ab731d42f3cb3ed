//! Element instances and their deferred records.

use crate::engine::record::{WorkflowInstanceIntent, WorkflowInstanceRecord};
use crate::Key;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle state of an element instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementInstanceState {
    Activating,
    Activated,
    Completing,
    Completed,
    Terminating,
    Terminated,
}

impl ElementInstanceState {
    /// Whether an instance in this state can still be terminated
    pub fn can_terminate(self) -> bool {
        matches!(
            self,
            ElementInstanceState::Activating
                | ElementInstanceState::Activated
                | ElementInstanceState::Completing
        )
    }
}

/// A live execution node of a workflow instance.
///
/// A scope is interrupted iff `interrupting_event_key > 0`; once set, the
/// key never changes until the scope terminates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementInstance {
    pub key: Key,
    pub parent_key: Key,
    pub state: ElementInstanceState,
    pub record: WorkflowInstanceRecord,
    active_tokens: u32,
    interrupting_event_key: Key,
}

impl ElementInstance {
    pub fn new(
        key: Key,
        parent_key: Key,
        record: WorkflowInstanceRecord,
        state: ElementInstanceState,
    ) -> Self {
        Self {
            key,
            parent_key,
            state,
            record,
            active_tokens: 0,
            interrupting_event_key: 0,
        }
    }

    pub fn element_id(&self) -> &str {
        &self.record.element_id
    }

    pub fn spawn_token(&mut self) {
        self.active_tokens += 1;
    }

    pub fn consume_token(&mut self) {
        debug_assert!(self.active_tokens > 0);
        self.active_tokens = self.active_tokens.saturating_sub(1);
    }

    pub fn active_tokens(&self) -> u32 {
        self.active_tokens
    }

    pub fn is_active(&self) -> bool {
        self.state == ElementInstanceState::Activated
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupting_event_key > 0
    }

    pub fn interrupting_event_key(&self) -> Key {
        self.interrupting_event_key
    }

    pub fn set_interrupting_event_key(&mut self, key: Key) {
        self.interrupting_event_key = key;
    }
}

/// Why a record was staged under a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// Staged for later publication
    Deferred,

    /// Kept for incident resolution
    Failed,
}

/// A record staged under a scope for later publication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub key: Key,
    pub record: WorkflowInstanceRecord,
    pub intent: WorkflowInstanceIntent,
    pub purpose: Purpose,
}

/// Store of element instances, child relations and staged records
#[derive(Debug, Default)]
pub struct ElementInstanceStore {
    instances: HashMap<Key, ElementInstance>,
    children: HashMap<Key, Vec<Key>>,
    stored_records: HashMap<Key, Vec<StoredRecord>>,
}

impl ElementInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an element instance. A `parent_key` of 0 marks a top-level
    /// instance.
    pub fn new_instance(
        &mut self,
        key: Key,
        parent_key: Key,
        record: WorkflowInstanceRecord,
        state: ElementInstanceState,
    ) {
        if parent_key != 0 {
            self.children.entry(parent_key).or_default().push(key);
        }
        self.instances
            .insert(key, ElementInstance::new(key, parent_key, record, state));
    }

    pub fn get(&self, key: Key) -> Option<&ElementInstance> {
        self.instances.get(&key)
    }

    pub fn get_mut(&mut self, key: Key) -> Option<&mut ElementInstance> {
        self.instances.get_mut(&key)
    }

    /// Child instance keys of a scope, in creation order
    pub fn children(&self, scope_key: Key) -> Vec<Key> {
        self.children.get(&scope_key).cloned().unwrap_or_default()
    }

    /// Stage a record under `scope_key` for the child instance `child_key`.
    pub fn store_record(
        &mut self,
        child_key: Key,
        scope_key: Key,
        record: WorkflowInstanceRecord,
        intent: WorkflowInstanceIntent,
        purpose: Purpose,
    ) {
        self.stored_records
            .entry(scope_key)
            .or_default()
            .push(StoredRecord {
                key: child_key,
                record,
                intent,
                purpose,
            });
    }

    /// Deferred records of a scope, in deferral order
    pub fn deferred_records(&self, scope_key: Key) -> Vec<&StoredRecord> {
        self.stored_records
            .get(&scope_key)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.purpose == Purpose::Deferred)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop the staged record for `child_key` under `scope_key`.
    pub fn remove_stored_record(&mut self, scope_key: Key, child_key: Key) {
        if let Some(records) = self.stored_records.get_mut(&scope_key) {
            records.retain(|r| r.key != child_key);
            if records.is_empty() {
                self.stored_records.remove(&scope_key);
            }
        }
    }

    /// Remove an instance; its staged records are discarded with it.
    pub fn remove_instance(&mut self, key: Key) {
        if let Some(instance) = self.instances.remove(&key) {
            if let Some(siblings) = self.children.get_mut(&instance.parent_key) {
                siblings.retain(|&child| child != key);
            }
        }
        self.children.remove(&key);
        self.stored_records.remove(&key);
    }
}
