//! Deployed workflow lookup.

use crate::engine::record::BpmnElementType;
use crate::Key;
use std::collections::HashMap;

/// A workflow as deployed; immutable once stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedWorkflow {
    pub key: Key,
    pub bpmn_process_id: String,
    pub version: u32,
    pub root_element_id: String,
    pub root_element_type: BpmnElementType,
}

/// Store of deployed workflows, keyed by workflow key
#[derive(Debug, Default)]
pub struct WorkflowStore {
    workflows: HashMap<Key, DeployedWorkflow>,
}

impl WorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, workflow: DeployedWorkflow) {
        self.workflows.insert(workflow.key, workflow);
    }

    pub fn workflow_by_key(&self, key: Key) -> Option<&DeployedWorkflow> {
        self.workflows.get(&key)
    }
}
