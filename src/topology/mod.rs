//! Partition topology view.
//!
//! Tracks which node currently leads each partition. The table is
//! read-mostly: it is updated only by topology callbacks and consulted on
//! every subscription command send.

use crate::PartitionId;
use slog::{debug, Logger};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Addresses of one broker node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub node_id: u64,

    /// Endpoint for inter-partition subscription traffic
    pub subscription_api_address: String,

    /// Endpoint for topic/partition discovery
    pub management_api_address: String,
}

/// Listener interface fed by the cluster protocol.
///
/// Implementations are notified on the owning partition's processor, so no
/// ordering is needed beyond the call-posting order.
pub trait TopologyPartitionListener: Send + Sync {
    /// A partition gained (or changed) its leader
    fn on_partition_leader(&self, partition_id: PartitionId, leader: NodeInfo);

    /// A partition currently has no leader
    fn on_partition_leader_lost(&self, partition_id: PartitionId);
}

/// Source of topology events
pub trait TopologyManager {
    fn add_topology_partition_listener(&mut self, listener: Arc<dyn TopologyPartitionListener>);
}

/// Leader table maintained from topology events.
///
/// Keeps the `PartitionId -> NodeInfo` mapping plus the distinguished
/// system-partition leader address used for bootstrap requests.
pub struct PartitionLeaderTable {
    system_partition_id: PartitionId,
    leaders: RwLock<HashMap<PartitionId, NodeInfo>>,
    system_partition_leader: RwLock<Option<String>>,
    logger: Logger,
}

impl PartitionLeaderTable {
    pub fn new(system_partition_id: PartitionId, logger: Logger) -> Self {
        Self {
            system_partition_id,
            leaders: RwLock::new(HashMap::new()),
            system_partition_leader: RwLock::new(None),
            logger,
        }
    }

    /// Current leader of a partition, if known
    pub fn partition_leader(&self, partition_id: PartitionId) -> Option<NodeInfo> {
        self.leaders.read().unwrap().get(&partition_id).cloned()
    }

    /// Management address of the system partition leader, if known
    pub fn system_partition_leader(&self) -> Option<String> {
        self.system_partition_leader.read().unwrap().clone()
    }

    /// Number of partitions with a known leader
    pub fn known_leader_count(&self) -> usize {
        self.leaders.read().unwrap().len()
    }
}

impl TopologyPartitionListener for PartitionLeaderTable {
    fn on_partition_leader(&self, partition_id: PartitionId, leader: NodeInfo) {
        debug!(self.logger, "Partition leader updated";
            "partition_id" => partition_id, "node_id" => leader.node_id);

        if partition_id == self.system_partition_id {
            *self.system_partition_leader.write().unwrap() =
                Some(leader.management_api_address.clone());
        }
        self.leaders.write().unwrap().insert(partition_id, leader);
    }

    fn on_partition_leader_lost(&self, partition_id: PartitionId) {
        debug!(self.logger, "Partition leader lost"; "partition_id" => partition_id);

        if partition_id == self.system_partition_id {
            *self.system_partition_leader.write().unwrap() = None;
        }
        self.leaders.write().unwrap().remove(&partition_id);
    }
}

/// Static topology source for single-process setups and tests
#[derive(Default)]
pub struct StaticTopologyManager {
    listeners: Vec<Arc<dyn TopologyPartitionListener>>,
}

impl StaticTopologyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a leader update to every registered listener
    pub fn publish_partition_leader(&self, partition_id: PartitionId, leader: NodeInfo) {
        for listener in &self.listeners {
            listener.on_partition_leader(partition_id, leader.clone());
        }
    }

    /// Push a leader-lost notification to every registered listener
    pub fn publish_partition_leader_lost(&self, partition_id: PartitionId) {
        for listener in &self.listeners {
            listener.on_partition_leader_lost(partition_id);
        }
    }
}

impl TopologyManager for StaticTopologyManager {
    fn add_topology_partition_listener(&mut self, listener: Arc<dyn TopologyPartitionListener>) {
        self.listeners.push(listener);
    }
}
