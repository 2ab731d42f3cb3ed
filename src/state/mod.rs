//! Persisted state abstractions of one engine partition.
//!
//! The partition owns these stores exclusively; cross-partition interaction
//! happens only through subscription commands. The persistence engine
//! behind them is not part of this core, so the stores expose the
//! observable operations only.

pub mod element_instance;
pub mod event_scope;
pub mod key_generator;
pub mod variables;
pub mod workflow;

pub use element_instance::{
    ElementInstance, ElementInstanceState, ElementInstanceStore, Purpose, StoredRecord,
};
pub use event_scope::{EventScopeStore, EventTrigger};
pub use key_generator::KeyGenerator;
pub use variables::VariablesStore;
pub use workflow::{DeployedWorkflow, WorkflowStore};

/// Aggregate of all stores owned by one partition.
///
/// One owner, no back-pointers: behaviors borrow the aggregate for the
/// duration of a call instead of holding references to each other.
#[derive(Debug, Default)]
pub struct EngineState {
    pub workflows: WorkflowStore,
    pub element_instances: ElementInstanceStore,
    pub event_scopes: EventScopeStore,
    pub variables: VariablesStore,
    pub key_generator: KeyGenerator,
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }
}
