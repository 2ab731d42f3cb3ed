//! Configuration for one partition's subscription core.

use crate::PartitionId;
use std::time::Duration;

const DEFAULT_FETCH_TOPICS_TIMEOUT: Duration = Duration::from_secs(15);

/// Configuration of the partition that owns a router and behavior instance.
pub struct PartitionConfig {
    /// Topic this partition's log stream belongs to
    pub topic_name: String,

    /// Id of the local partition; stamped into outgoing commands so
    /// acknowledgements find their way back
    pub partition_id: PartitionId,

    /// Deadline for the one-shot topic bootstrap
    pub fetch_topics_timeout: Duration,
}

impl PartitionConfig {
    pub fn new(topic_name: impl Into<String>, partition_id: PartitionId) -> Self {
        Self {
            topic_name: topic_name.into(),
            partition_id,
            fetch_topics_timeout: DEFAULT_FETCH_TOPICS_TIMEOUT,
        }
    }

    /// Set the bootstrap deadline.
    pub fn with_fetch_topics_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_topics_timeout = timeout;
        self
    }
}
