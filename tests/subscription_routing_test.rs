//! Cross-partition routing scenarios: correlation stability, leader churn,
//! and the topic bootstrap.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use partiflow::protocol::{
    FetchCreatedTopicsRequest, FetchCreatedTopicsResponse, SubscriptionCommand, TopicPartitions,
};
use partiflow::subscription::partition_for_correlation_key;
use partiflow::topology::{
    NodeInfo, StaticTopologyManager, TopologyManager, TopologyPartitionListener,
};
use partiflow::transport::{
    ChannelOutput, ClientOutput, OutboundMessage, RemoteAddress, TransportError,
};
use partiflow::{
    ClientTransport, PartitionConfig, PartitionId, PartitionLeaderTable, SubscriptionCommandSender,
};
use slog::{o, Logger};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn test_logger() -> Logger {
    Logger::root(slog::Discard, o!())
}

fn node(node_id: u64) -> NodeInfo {
    NodeInfo {
        node_id,
        subscription_api_address: format!("10.0.0.{}:26502", node_id),
        management_api_address: format!("10.0.0.{}:26501", node_id),
    }
}

/// Records every frame handed to the transport
struct RecordingOutput {
    sent: Mutex<Vec<OutboundMessage>>,
}

impl RecordingOutput {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClientOutput for RecordingOutput {
    fn send_message(&self, remote: &RemoteAddress, frame: Bytes) -> bool {
        self.sent.lock().unwrap().push(OutboundMessage {
            address: remote.address.clone(),
            frame,
        });
        true
    }

    async fn send_request(
        &self,
        remote: &RemoteAddress,
        _request: Bytes,
    ) -> Result<Bytes, TransportError> {
        Err(TransportError::NoResponse {
            address: remote.address.clone(),
        })
    }
}

fn sender_with_output(
    partition_id: PartitionId,
    output: Arc<RecordingOutput>,
) -> (SubscriptionCommandSender, Arc<PartitionLeaderTable>) {
    let leader_table = Arc::new(PartitionLeaderTable::new(0, test_logger()));
    let management = Arc::new(ClientTransport::new(output.clone(), test_logger()));
    let subscription = Arc::new(ClientTransport::new(output, test_logger()));

    let sender = SubscriptionCommandSender::new(
        PartitionConfig::new("orders", partition_id),
        leader_table.clone(),
        management,
        subscription,
        test_logger(),
    );

    (sender, leader_table)
}

#[test]
fn test_correlation_routing_is_stable_across_routers() {
    let partition_ids = vec![1, 3, 5];
    let correlation_key = Bytes::from_static(b"order-42");

    let output_a = Arc::new(RecordingOutput::new());
    let output_b = Arc::new(RecordingOutput::new());
    let (sender_a, table_a) = sender_with_output(1, output_a.clone());
    let (sender_b, table_b) = sender_with_output(3, output_b.clone());

    for table in [&table_a, &table_b] {
        for partition_id in &partition_ids {
            table.on_partition_leader(*partition_id, node(*partition_id as u64));
        }
    }

    sender_a.install_partition_ids(partition_ids.clone());
    sender_b.install_partition_ids(partition_ids.clone());

    let dispatch_a = sender_a
        .open_message_subscription(100, 200, &Bytes::from_static(b"order-placed"), &correlation_key)
        .unwrap();
    let dispatch_b = sender_b
        .open_message_subscription(700, 800, &Bytes::from_static(b"order-placed"), &correlation_key)
        .unwrap();
    assert!(dispatch_a.should_advance());
    assert!(dispatch_b.should_advance());

    let expected_partition = partition_for_correlation_key(&partition_ids, b"order-42");

    let decode_target = |output: &RecordingOutput| {
        let sent = output.sent();
        assert_eq!(sent.len(), 1);
        let mut frame = sent[0].frame.clone();
        match SubscriptionCommand::decode(&mut frame).unwrap() {
            SubscriptionCommand::Open(cmd) => (cmd.subscription_partition_id, sent[0].address.clone()),
            other => panic!("Expected open command, got {:?}", other),
        }
    };

    let (partition_a, address_a) = decode_target(&output_a);
    let (partition_b, address_b) = decode_target(&output_b);

    assert_eq!(partition_a, expected_partition);
    assert_eq!(partition_b, expected_partition);
    assert_eq!(address_a, address_b);
}

#[test]
fn test_retry_on_unknown_leader() {
    let output = Arc::new(RecordingOutput::new());
    let (sender, leader_table) = sender_with_output(1, output.clone());
    sender.install_partition_ids(vec![1, 3, 5]);

    // Leader table is empty: the command is skipped but the caller advances
    let dispatch = sender
        .open_message_subscription(
            100,
            200,
            &Bytes::from_static(b"order-placed"),
            &Bytes::from_static(b"order-42"),
        )
        .unwrap();
    assert!(dispatch.should_advance());
    assert_eq!(output.sent().len(), 0);

    // Topology update installs leaders through the listener interface
    let mut manager = StaticTopologyManager::new();
    manager.add_topology_partition_listener(leader_table);
    for partition_id in [1, 3, 5] {
        manager.publish_partition_leader(partition_id, node(partition_id as u64));
    }

    // The next call sends exactly one message
    let dispatch = sender
        .open_message_subscription(
            100,
            200,
            &Bytes::from_static(b"order-placed"),
            &Bytes::from_static(b"order-42"),
        )
        .unwrap();
    assert!(dispatch.should_advance());
    assert_eq!(output.sent().len(), 1);
}

#[tokio::test]
async fn test_fetch_created_topics_installs_partition_ids() {
    let (output, _messages, mut requests) = ChannelOutput::new(8);
    let leader_table = Arc::new(PartitionLeaderTable::new(0, test_logger()));
    let management = Arc::new(
        ClientTransport::new(Arc::new(output), test_logger())
            .with_retry_interval(Duration::from_millis(5)),
    );
    let (subscription_output, _sub_messages, _sub_requests) = ChannelOutput::new(8);
    let subscription = Arc::new(ClientTransport::new(
        Arc::new(subscription_output),
        test_logger(),
    ));

    let sender = SubscriptionCommandSender::new(
        PartitionConfig::new("orders", 1).with_fetch_topics_timeout(Duration::from_secs(5)),
        leader_table.clone(),
        management,
        subscription,
        test_logger(),
    );

    // System partition leader answers with the created topics
    tokio::spawn(async move {
        while let Some(request) = requests.recv().await {
            let mut frame = request.frame.clone();
            FetchCreatedTopicsRequest::decode(&mut frame).unwrap();

            let response = FetchCreatedTopicsResponse {
                topics: vec![
                    TopicPartitions {
                        topic_name: "internal".to_string(),
                        partition_ids: vec![0],
                    },
                    TopicPartitions {
                        topic_name: "orders".to_string(),
                        partition_ids: vec![1, 3, 5],
                    },
                ],
            };
            let mut buf = BytesMut::new();
            response.encode(&mut buf);
            let _ = request.response_tx.send(buf.freeze());
        }
    });

    // Leader becomes known only after the first resolver misses
    let table = leader_table.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        table.on_partition_leader(0, node(9));
    });

    assert!(!sender.has_partition_ids());
    sender.fetch_created_topics().await.unwrap();
    assert!(sender.has_partition_ids());
}

#[tokio::test]
async fn test_fetch_created_topics_times_out_without_system_leader() {
    let (output, _messages, _requests) = ChannelOutput::new(8);
    let leader_table = Arc::new(PartitionLeaderTable::new(0, test_logger()));
    let management = Arc::new(
        ClientTransport::new(Arc::new(output), test_logger())
            .with_retry_interval(Duration::from_millis(5)),
    );
    let (subscription_output, _sub_messages, _sub_requests) = ChannelOutput::new(8);
    let subscription = Arc::new(ClientTransport::new(
        Arc::new(subscription_output),
        test_logger(),
    ));

    let sender = SubscriptionCommandSender::new(
        PartitionConfig::new("orders", 1).with_fetch_topics_timeout(Duration::from_millis(50)),
        leader_table,
        management,
        subscription,
        test_logger(),
    );

    let result = sender.fetch_created_topics().await;
    assert!(result.is_err());
    assert!(!sender.has_partition_ids());
}

#[test]
fn test_commands_for_same_destination_keep_call_order() {
    let output = Arc::new(RecordingOutput::new());
    let (sender, leader_table) = sender_with_output(1, output.clone());
    leader_table.on_partition_leader(3, node(3));

    for activity_instance_key in [10, 11, 12] {
        let dispatch = sender.opened_message_subscription(
            3,
            100,
            activity_instance_key,
            &Bytes::from_static(b"order-placed"),
        );
        assert!(dispatch.should_advance());
    }

    let keys: Vec<u64> = output
        .sent()
        .iter()
        .map(|message| {
            let mut frame = message.frame.clone();
            match SubscriptionCommand::decode(&mut frame).unwrap() {
                SubscriptionCommand::Opened(cmd) => cmd.activity_instance_key,
                other => panic!("Expected opened command, got {:?}", other),
            }
        })
        .collect();

    assert_eq!(keys, vec![10, 11, 12]);
}
