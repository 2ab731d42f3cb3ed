//! Executable element model consumed by the behavior.
//!
//! Only the slice of the deployed-model API this core reads: catch event
//! declarations, boundary event attachments, event-gateway targets. The
//! model loader producing these lives outside the core.

use crate::engine::expression::Expression;
use crate::engine::record::BpmnElementType;
use bytes::Bytes;
use std::time::Duration;

/// A declared catch event of an element
#[derive(Debug, Clone)]
pub struct ExecutableCatchEvent {
    pub id: String,
    pub event_type: CatchEventType,
}

/// Kind of catch event and the data needed to subscribe to it
#[derive(Debug, Clone)]
pub enum CatchEventType {
    /// Message catch: name and correlation key are evaluated against the
    /// scope's variables at subscription time
    Message {
        name: Expression,
        correlation_key: Expression,
    },

    /// Timer catch, due after the given duration
    Timer { due_in: Duration },

    /// Signal catch by literal name
    Signal { name: Bytes },
}

/// An element that declares catch events to subscribe to
pub trait CatchEventSupplier {
    fn catch_events(&self) -> &[ExecutableCatchEvent];
}

/// An activity that may carry boundary events
pub trait ActivityElement: CatchEventSupplier {
    fn boundary_events(&self) -> &[ExecutableBoundaryEvent];
}

/// A boundary event attached to an activity
#[derive(Debug, Clone)]
pub struct ExecutableBoundaryEvent {
    pub id: String,
    pub interrupting: bool,
}

/// An activity (service task, sub-process, ...) with boundary events
#[derive(Debug, Clone, Default)]
pub struct ExecutableActivity {
    pub id: String,
    pub boundary_events: Vec<ExecutableBoundaryEvent>,
    pub catch_events: Vec<ExecutableCatchEvent>,
}

impl CatchEventSupplier for ExecutableActivity {
    fn catch_events(&self) -> &[ExecutableCatchEvent] {
        &self.catch_events
    }
}

impl ActivityElement for ExecutableActivity {
    fn boundary_events(&self) -> &[ExecutableBoundaryEvent] {
        &self.boundary_events
    }
}

/// A receive task: waits for its own message and may carry boundary events
#[derive(Debug, Clone, Default)]
pub struct ExecutableReceiveTask {
    pub id: String,
    pub boundary_events: Vec<ExecutableBoundaryEvent>,
    pub catch_events: Vec<ExecutableCatchEvent>,
}

impl CatchEventSupplier for ExecutableReceiveTask {
    fn catch_events(&self) -> &[ExecutableCatchEvent] {
        &self.catch_events
    }
}

impl ActivityElement for ExecutableReceiveTask {
    fn boundary_events(&self) -> &[ExecutableBoundaryEvent] {
        &self.boundary_events
    }
}

/// A flow node reachable from an event-based gateway
#[derive(Debug, Clone)]
pub struct ExecutableFlowNode {
    pub id: String,
    pub element_type: BpmnElementType,
}

/// An outgoing sequence flow of a gateway
#[derive(Debug, Clone)]
pub struct ExecutableSequenceFlow {
    pub target: ExecutableFlowNode,
}

/// An event-based gateway with its outgoing sequence flows
#[derive(Debug, Clone, Default)]
pub struct ExecutableEventBasedGateway {
    pub id: String,
    pub outgoing: Vec<ExecutableSequenceFlow>,
    pub catch_events: Vec<ExecutableCatchEvent>,
}

impl CatchEventSupplier for ExecutableEventBasedGateway {
    fn catch_events(&self) -> &[ExecutableCatchEvent] {
        &self.catch_events
    }
}

/// A start event, possibly the start of an event sub-process
#[derive(Debug, Clone, Default)]
pub struct ExecutableStartEvent {
    pub id: String,
    pub interrupting: bool,

    /// Element id of the event sub-process this start event belongs to,
    /// if any
    pub event_sub_process: Option<String>,

    pub catch_events: Vec<ExecutableCatchEvent>,
}

impl CatchEventSupplier for ExecutableStartEvent {
    fn catch_events(&self) -> &[ExecutableCatchEvent] {
        &self.catch_events
    }
}
