//! Event-subscription and cross-partition routing core of a partitioned
//! BPMN workflow engine.
//!
//! Workflow instances run as state machines over partitioned logs.
//! Business events are correlated across partitions to the owning instance
//! (the [`subscription`] router) and injected into its execution at
//! well-defined scopes (the [`engine`] behavior).

pub mod config;
pub mod engine;
pub mod protocol;
pub mod state;
pub mod stream;
pub mod subscription;
pub mod topology;
pub mod transport;

/// Index of one shard of the replicated event log. Each partition has
/// exactly one leader at a time.
pub type PartitionId = i32;

/// Monotonic 64-bit identifier, unique within its partition
pub type Key = u64;

pub use config::PartitionConfig;
pub use engine::{BpmnElementContext, BpmnProcessingError, Engine, ErrorType, Failure};
pub use subscription::{Dispatch, SubscriptionCommandSender, SubscriptionError};
pub use topology::{
    NodeInfo, PartitionLeaderTable, TopologyManager, TopologyPartitionListener,
};
pub use transport::{ClientOutput, ClientTransport, TimeoutError, TransportError};

use slog::Drain;

/// Default terminal logger for embedders that do not pass their own.
pub fn default_logger(partition_id: PartitionId) -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    slog::Logger::root(drain, slog::o!("partition_id" => partition_id))
}
