//! Variable documents per scope.

use crate::Key;
use bytes::Bytes;
use std::collections::HashMap;

/// Store of scope variables and temporary variable documents.
///
/// Temporary variables carry an event trigger's payload to the element
/// instance minted for it; they are picked up (and removed) when that
/// instance activates.
#[derive(Debug, Default)]
pub struct VariablesStore {
    variables: HashMap<(Key, String), Bytes>,
    temporary: HashMap<Key, Bytes>,
}

impl VariablesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_variable(&mut self, scope_key: Key, name: impl Into<String>, value: Bytes) {
        self.variables.insert((scope_key, name.into()), value);
    }

    pub fn variable(&self, scope_key: Key, name: &str) -> Option<&Bytes> {
        self.variables.get(&(scope_key, name.to_string()))
    }

    pub fn set_temporary_variables(&mut self, element_instance_key: Key, document: Bytes) {
        self.temporary.insert(element_instance_key, document);
    }

    pub fn temporary_variables(&self, element_instance_key: Key) -> Option<&Bytes> {
        self.temporary.get(&element_instance_key)
    }

    pub fn remove_temporary_variables(&mut self, element_instance_key: Key) {
        self.temporary.remove(&element_instance_key);
    }
}
