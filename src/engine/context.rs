//! Per-call element context.

use crate::engine::record::WorkflowInstanceRecord;
use crate::state::ElementInstance;
use crate::Key;

/// Identifies the element instance a behavior call operates on, together
/// with its current record value.
#[derive(Debug, Clone)]
pub struct BpmnElementContext {
    pub element_instance_key: Key,
    pub flow_scope_key: Key,
    pub record: WorkflowInstanceRecord,
}

impl BpmnElementContext {
    pub fn new(element_instance_key: Key, record: WorkflowInstanceRecord) -> Self {
        Self {
            element_instance_key,
            flow_scope_key: record.flow_scope_key,
            record,
        }
    }

    /// Context of an existing element instance
    pub fn of(instance: &ElementInstance) -> Self {
        Self {
            element_instance_key: instance.key,
            flow_scope_key: instance.parent_key,
            record: instance.record.clone(),
        }
    }

    pub fn workflow_key(&self) -> Key {
        self.record.workflow_key
    }

    pub fn workflow_instance_key(&self) -> Key {
        self.record.workflow_instance_key
    }

    /// Scope against which variable expressions are resolved
    pub fn variables_scope_key(&self) -> Key {
        self.flow_scope_key
    }
}
