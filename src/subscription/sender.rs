//! Subscription command router.
//!
//! Delivers the five subscription commands to the partition leader that
//! owns the target state, and copes with leader churn and unknown topology.

use crate::config::PartitionConfig;
use crate::protocol::{
    CloseMessageSubscription, CorrelateWorkflowInstanceSubscription, FetchCreatedTopicsRequest,
    FetchCreatedTopicsResponse, OpenMessageSubscription, OpenedMessageSubscription,
    RejectCorrelateMessageSubscription, SubscriptionCommand,
};
use crate::subscription::hash;
use crate::topology::PartitionLeaderTable;
use crate::transport::{ClientTransport, RemoteAddress, TimeoutError};
use crate::{Key, PartitionId};
use bytes::{Bytes, BytesMut};
use slog::{debug, info, Logger};
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

/// Outcome of handing a subscription command to the transport.
///
/// `Advance` does not always mean "sent": when no leader is known for the
/// target partition the command is deliberately skipped, because the
/// pending-subscription check on the stream processor resends it once the
/// topology settles. Only a transport refusal demands an immediate retry.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The transport accepted the frame, or no leader is known yet and the
    /// stream will replay. The caller may advance.
    Advance,

    /// The transport refused the frame. The caller must retry the record.
    Retry,
}

impl Dispatch {
    pub fn should_advance(self) -> bool {
        matches!(self, Dispatch::Advance)
    }
}

/// Errors raised at the router boundary
#[derive(Debug, Clone)]
pub enum SubscriptionError {
    /// The partition id list is not installed yet; the topic bootstrap has
    /// not completed
    PartitionIdsUnavailable,
}

impl fmt::Display for SubscriptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionError::PartitionIdsUnavailable => {
                write!(f, "No partition ids available")
            }
        }
    }
}

impl std::error::Error for SubscriptionError {}

/// Partition-aware, leader-tracking sender for subscription commands.
///
/// Composes the leader table, the two client transports (management and
/// subscription), and the correlation-key hash. All sends are non-blocking;
/// only [`fetch_created_topics`](Self::fetch_created_topics) suspends.
pub struct SubscriptionCommandSender {
    config: PartitionConfig,
    leader_table: Arc<PartitionLeaderTable>,
    management_client: Arc<ClientTransport>,
    subscription_client: Arc<ClientTransport>,
    partition_ids: RwLock<Option<Vec<PartitionId>>>,

    // Reused across sends. The owning processor is single-threaded, so the
    // lock is uncontended.
    encode_buffer: Mutex<BytesMut>,

    logger: Logger,
}

impl SubscriptionCommandSender {
    pub fn new(
        config: PartitionConfig,
        leader_table: Arc<PartitionLeaderTable>,
        management_client: Arc<ClientTransport>,
        subscription_client: Arc<ClientTransport>,
        logger: Logger,
    ) -> Self {
        Self {
            config,
            leader_table,
            management_client,
            subscription_client,
            partition_ids: RwLock::new(None),
            encode_buffer: Mutex::new(BytesMut::with_capacity(256)),
            logger,
        }
    }

    /// Open a message subscription on the partition owning the correlation
    /// key. The target partition is derived from the key bytes alone, so
    /// every broker routes the same key to the same partition.
    pub fn open_message_subscription(
        &self,
        workflow_instance_key: Key,
        activity_instance_key: Key,
        message_name: &Bytes,
        correlation_key: &Bytes,
    ) -> Result<Dispatch, SubscriptionError> {
        let subscription_partition_id = self.subscription_partition_id(correlation_key)?;

        let command = SubscriptionCommand::Open(OpenMessageSubscription {
            subscription_partition_id,
            workflow_instance_partition_id: self.config.partition_id,
            workflow_instance_key,
            activity_instance_key,
            message_name: message_name.clone(),
            correlation_key: correlation_key.clone(),
        });

        Ok(self.send_subscription_command(subscription_partition_id, &command))
    }

    /// Acknowledge an opened subscription back to the originating partition.
    pub fn opened_message_subscription(
        &self,
        workflow_instance_partition_id: PartitionId,
        workflow_instance_key: Key,
        activity_instance_key: Key,
        message_name: &Bytes,
    ) -> Dispatch {
        let command = SubscriptionCommand::Opened(OpenedMessageSubscription {
            workflow_instance_partition_id,
            workflow_instance_key,
            activity_instance_key,
            message_name: message_name.clone(),
        });

        self.send_subscription_command(workflow_instance_partition_id, &command)
    }

    /// Deliver the payload that triggers the workflow-side subscription.
    pub fn correlate_workflow_instance_subscription(
        &self,
        workflow_instance_partition_id: PartitionId,
        workflow_instance_key: Key,
        activity_instance_key: Key,
        message_name: &Bytes,
        payload: &Bytes,
    ) -> Dispatch {
        let command = SubscriptionCommand::Correlate(CorrelateWorkflowInstanceSubscription {
            workflow_instance_partition_id,
            workflow_instance_key,
            activity_instance_key,
            message_name: message_name.clone(),
            payload: payload.clone(),
        });

        self.send_subscription_command(workflow_instance_partition_id, &command)
    }

    /// Close a subscription on the partition that owns it.
    pub fn close_message_subscription(
        &self,
        subscription_partition_id: PartitionId,
        workflow_instance_key: Key,
        activity_instance_key: Key,
        message_name: &Bytes,
    ) -> Dispatch {
        let command = SubscriptionCommand::Close(CloseMessageSubscription {
            subscription_partition_id,
            workflow_instance_key,
            activity_instance_key,
            message_name: message_name.clone(),
        });

        self.send_subscription_command(subscription_partition_id, &command)
    }

    /// Reject a correlation, returning the message to the subscription
    /// partition. Routed by correlation key, like open.
    pub fn reject_correlate_workflow_instance_subscription(
        &self,
        workflow_instance_key: Key,
        activity_instance_key: Key,
        message_name: &Bytes,
        correlation_key: &Bytes,
    ) -> Result<Dispatch, SubscriptionError> {
        let subscription_partition_id = self.subscription_partition_id(correlation_key)?;

        let command = SubscriptionCommand::RejectCorrelate(RejectCorrelateMessageSubscription {
            subscription_partition_id,
            workflow_instance_partition_id: self.config.partition_id,
            workflow_instance_key,
            activity_instance_key,
            message_name: message_name.clone(),
            correlation_key: correlation_key.clone(),
        });

        Ok(self.send_subscription_command(subscription_partition_id, &command))
    }

    /// True once the initial topology fetch (or an explicit install)
    /// completed.
    pub fn has_partition_ids(&self) -> bool {
        self.partition_ids.read().unwrap().is_some()
    }

    /// Install the ordered partition id list directly, for setups where the
    /// partitions are known on startup.
    pub fn install_partition_ids(&self, partition_ids: Vec<PartitionId>) {
        info!(self.logger, "Installed partition ids"; "count" => partition_ids.len());
        *self.partition_ids.write().unwrap() = Some(partition_ids);
    }

    /// One-shot asynchronous bootstrap of the partition id list.
    ///
    /// Retries internally on transient failures; fails with a
    /// [`TimeoutError`] if the system-partition leader cannot be reached
    /// within the configured deadline.
    pub async fn fetch_created_topics(&self) -> Result<(), TimeoutError> {
        let request = self.encode_request();

        let response = self
            .management_client
            .send_request_with_retry(
                || self.system_partition_leader_remote(),
                |response| FetchCreatedTopicsResponse::decode(&mut response.clone()).is_ok(),
                request,
                self.config.fetch_topics_timeout,
            )
            .await?;

        self.handle_fetch_created_topics_response(response);
        Ok(())
    }

    fn encode_request(&self) -> Bytes {
        let mut buf = self.encode_buffer.lock().unwrap();
        buf.clear();
        FetchCreatedTopicsRequest.encode(&mut buf);
        buf.split().freeze()
    }

    fn system_partition_leader_remote(&self) -> Option<RemoteAddress> {
        self.leader_table
            .system_partition_leader()
            .map(|address| self.management_client.register_remote_address(&address))
    }

    fn handle_fetch_created_topics_response(&self, mut response: Bytes) {
        // The acceptor already verified the frame decodes
        if let Ok(decoded) = FetchCreatedTopicsResponse::decode(&mut response) {
            for topic in decoded.topics {
                if topic.topic_name == self.config.topic_name {
                    self.install_partition_ids(topic.partition_ids);
                }
            }
        }
    }

    /// Partition owning a correlation key, per the shared id list.
    pub fn subscription_partition_id(
        &self,
        correlation_key: &[u8],
    ) -> Result<PartitionId, SubscriptionError> {
        let partition_ids = self.partition_ids.read().unwrap();
        let partition_ids = partition_ids
            .as_ref()
            .ok_or(SubscriptionError::PartitionIdsUnavailable)?;
        Ok(hash::partition_for_correlation_key(
            partition_ids,
            correlation_key,
        ))
    }

    fn send_subscription_command(
        &self,
        receiver_partition_id: PartitionId,
        command: &SubscriptionCommand,
    ) -> Dispatch {
        let leader = match self.leader_table.partition_leader(receiver_partition_id) {
            Some(leader) => leader,
            None => {
                // No leader known yet; the stream processor replays later
                debug!(self.logger, "Skipping subscription command, leader unknown";
                    "partition_id" => receiver_partition_id);
                return Dispatch::Advance;
            }
        };

        let remote = self
            .subscription_client
            .register_remote_address(&leader.subscription_api_address);

        let frame = {
            let mut buf = self.encode_buffer.lock().unwrap();
            buf.clear();
            command.encode(&mut buf);
            buf.split().freeze()
        };

        if self.subscription_client.send_message(&remote, frame) {
            Dispatch::Advance
        } else {
            debug!(self.logger, "Transport refused subscription command";
                "partition_id" => receiver_partition_id);
            Dispatch::Retry
        }
    }
}
