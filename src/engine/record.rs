//! Workflow instance records appended to the log stream.

use crate::Key;
use serde::{Deserialize, Serialize};

/// BPMN element kind of a record or element instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BpmnElementType {
    #[default]
    Process,
    SubProcess,
    StartEvent,
    IntermediateCatchEvent,
    BoundaryEvent,
    EndEvent,
    ServiceTask,
    ReceiveTask,
    EventBasedGateway,
}

/// Lifecycle intent of a workflow instance record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowInstanceIntent {
    ElementActivating,
    ElementActivated,
    ElementCompleting,
    ElementCompleted,
    ElementTerminating,
    ElementTerminated,
}

/// Value of a workflow instance record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WorkflowInstanceRecord {
    pub bpmn_process_id: String,
    pub version: u32,
    pub workflow_key: Key,
    pub workflow_instance_key: Key,
    pub element_id: String,
    pub flow_scope_key: Key,
    pub element_type: BpmnElementType,
}
