//! Wire records of the subscription protocol.
//!
//! Every record is a length-prefixed structured frame: a `u32` frame length,
//! one type byte, fixed-width little-endian integers, and `u32`
//! length-prefixed byte strings. Message names, correlation keys and
//! payloads are opaque byte buffers; equality is byte-level.

use crate::{Key, PartitionId};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

const MESSAGE_TYPE_OPEN: u8 = 1;
const MESSAGE_TYPE_OPENED: u8 = 2;
const MESSAGE_TYPE_CORRELATE: u8 = 3;
const MESSAGE_TYPE_CLOSE: u8 = 4;
const MESSAGE_TYPE_REJECT_CORRELATE: u8 = 5;
const MESSAGE_TYPE_FETCH_TOPICS_REQUEST: u8 = 6;
const MESSAGE_TYPE_FETCH_TOPICS_RESPONSE: u8 = 7;

/// Errors that can occur while decoding a protocol frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame ended before all declared fields were read
    TruncatedFrame,

    /// The type byte does not name a known record
    UnknownMessageType(u8),

    /// A text field was not valid UTF-8
    InvalidUtf8,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::TruncatedFrame => write!(f, "Frame is truncated"),
            ProtocolError::UnknownMessageType(t) => {
                write!(f, "Unknown message type byte {}", t)
            }
            ProtocolError::InvalidUtf8 => write!(f, "Text field is not valid UTF-8"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Opens a message subscription on the partition owning the correlation key.
///
/// Carries `subscription_partition_id` so the receiving partition can echo
/// it in the acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenMessageSubscription {
    pub subscription_partition_id: PartitionId,
    pub workflow_instance_partition_id: PartitionId,
    pub workflow_instance_key: Key,
    pub activity_instance_key: Key,
    pub message_name: Bytes,
    pub correlation_key: Bytes,
}

/// Acknowledges an opened subscription back to the originating partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedMessageSubscription {
    pub workflow_instance_partition_id: PartitionId,
    pub workflow_instance_key: Key,
    pub activity_instance_key: Key,
    pub message_name: Bytes,
}

/// Delivers the payload that triggers the workflow-side subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelateWorkflowInstanceSubscription {
    pub workflow_instance_partition_id: PartitionId,
    pub workflow_instance_key: Key,
    pub activity_instance_key: Key,
    pub message_name: Bytes,
    pub payload: Bytes,
}

/// Closes a subscription on the partition that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseMessageSubscription {
    pub subscription_partition_id: PartitionId,
    pub workflow_instance_key: Key,
    pub activity_instance_key: Key,
    pub message_name: Bytes,
}

/// Rejects a correlation, returning the message to the subscription
/// partition for re-correlation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectCorrelateMessageSubscription {
    pub subscription_partition_id: PartitionId,
    pub workflow_instance_partition_id: PartitionId,
    pub workflow_instance_key: Key,
    pub activity_instance_key: Key,
    pub message_name: Bytes,
    pub correlation_key: Bytes,
}

/// One of the five subscription wire records
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionCommand {
    Open(OpenMessageSubscription),
    Opened(OpenedMessageSubscription),
    Correlate(CorrelateWorkflowInstanceSubscription),
    Close(CloseMessageSubscription),
    RejectCorrelate(RejectCorrelateMessageSubscription),
}

impl SubscriptionCommand {
    /// Encode the record into `buf` as a complete frame.
    pub fn encode(&self, buf: &mut BytesMut) {
        let body_start = begin_frame(buf);

        match self {
            SubscriptionCommand::Open(cmd) => {
                buf.put_u8(MESSAGE_TYPE_OPEN);
                buf.put_i32_le(cmd.subscription_partition_id);
                buf.put_i32_le(cmd.workflow_instance_partition_id);
                buf.put_u64_le(cmd.workflow_instance_key);
                buf.put_u64_le(cmd.activity_instance_key);
                put_bytes(buf, &cmd.message_name);
                put_bytes(buf, &cmd.correlation_key);
            }
            SubscriptionCommand::Opened(cmd) => {
                buf.put_u8(MESSAGE_TYPE_OPENED);
                buf.put_i32_le(cmd.workflow_instance_partition_id);
                buf.put_u64_le(cmd.workflow_instance_key);
                buf.put_u64_le(cmd.activity_instance_key);
                put_bytes(buf, &cmd.message_name);
            }
            SubscriptionCommand::Correlate(cmd) => {
                buf.put_u8(MESSAGE_TYPE_CORRELATE);
                buf.put_i32_le(cmd.workflow_instance_partition_id);
                buf.put_u64_le(cmd.workflow_instance_key);
                buf.put_u64_le(cmd.activity_instance_key);
                put_bytes(buf, &cmd.message_name);
                put_bytes(buf, &cmd.payload);
            }
            SubscriptionCommand::Close(cmd) => {
                buf.put_u8(MESSAGE_TYPE_CLOSE);
                buf.put_i32_le(cmd.subscription_partition_id);
                buf.put_u64_le(cmd.workflow_instance_key);
                buf.put_u64_le(cmd.activity_instance_key);
                put_bytes(buf, &cmd.message_name);
            }
            SubscriptionCommand::RejectCorrelate(cmd) => {
                buf.put_u8(MESSAGE_TYPE_REJECT_CORRELATE);
                buf.put_i32_le(cmd.subscription_partition_id);
                buf.put_i32_le(cmd.workflow_instance_partition_id);
                buf.put_u64_le(cmd.workflow_instance_key);
                buf.put_u64_le(cmd.activity_instance_key);
                put_bytes(buf, &cmd.message_name);
                put_bytes(buf, &cmd.correlation_key);
            }
        }

        end_frame(buf, body_start);
    }

    /// Decode a complete frame.
    pub fn decode(frame: &mut Bytes) -> Result<Self, ProtocolError> {
        let mut body = read_frame(frame)?;
        let message_type = get_u8(&mut body)?;

        match message_type {
            MESSAGE_TYPE_OPEN => Ok(SubscriptionCommand::Open(OpenMessageSubscription {
                subscription_partition_id: get_i32(&mut body)?,
                workflow_instance_partition_id: get_i32(&mut body)?,
                workflow_instance_key: get_u64(&mut body)?,
                activity_instance_key: get_u64(&mut body)?,
                message_name: get_bytes(&mut body)?,
                correlation_key: get_bytes(&mut body)?,
            })),
            MESSAGE_TYPE_OPENED => Ok(SubscriptionCommand::Opened(OpenedMessageSubscription {
                workflow_instance_partition_id: get_i32(&mut body)?,
                workflow_instance_key: get_u64(&mut body)?,
                activity_instance_key: get_u64(&mut body)?,
                message_name: get_bytes(&mut body)?,
            })),
            MESSAGE_TYPE_CORRELATE => Ok(SubscriptionCommand::Correlate(
                CorrelateWorkflowInstanceSubscription {
                    workflow_instance_partition_id: get_i32(&mut body)?,
                    workflow_instance_key: get_u64(&mut body)?,
                    activity_instance_key: get_u64(&mut body)?,
                    message_name: get_bytes(&mut body)?,
                    payload: get_bytes(&mut body)?,
                },
            )),
            MESSAGE_TYPE_CLOSE => Ok(SubscriptionCommand::Close(CloseMessageSubscription {
                subscription_partition_id: get_i32(&mut body)?,
                workflow_instance_key: get_u64(&mut body)?,
                activity_instance_key: get_u64(&mut body)?,
                message_name: get_bytes(&mut body)?,
            })),
            MESSAGE_TYPE_REJECT_CORRELATE => Ok(SubscriptionCommand::RejectCorrelate(
                RejectCorrelateMessageSubscription {
                    subscription_partition_id: get_i32(&mut body)?,
                    workflow_instance_partition_id: get_i32(&mut body)?,
                    workflow_instance_key: get_u64(&mut body)?,
                    activity_instance_key: get_u64(&mut body)?,
                    message_name: get_bytes(&mut body)?,
                    correlation_key: get_bytes(&mut body)?,
                },
            )),
            other => Err(ProtocolError::UnknownMessageType(other)),
        }
    }
}

/// Bootstrap request for the created topics of the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCreatedTopicsRequest;

impl FetchCreatedTopicsRequest {
    pub fn encode(&self, buf: &mut BytesMut) {
        let body_start = begin_frame(buf);
        buf.put_u8(MESSAGE_TYPE_FETCH_TOPICS_REQUEST);
        end_frame(buf, body_start);
    }

    pub fn decode(frame: &mut Bytes) -> Result<Self, ProtocolError> {
        let mut body = read_frame(frame)?;
        let message_type = get_u8(&mut body)?;
        if message_type != MESSAGE_TYPE_FETCH_TOPICS_REQUEST {
            return Err(ProtocolError::UnknownMessageType(message_type));
        }
        Ok(FetchCreatedTopicsRequest)
    }
}

/// One topic with its ordered partition id list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPartitions {
    pub topic_name: String,
    pub partition_ids: Vec<PartitionId>,
}

/// Bootstrap response listing all created topics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCreatedTopicsResponse {
    pub topics: Vec<TopicPartitions>,
}

impl FetchCreatedTopicsResponse {
    pub fn encode(&self, buf: &mut BytesMut) {
        let body_start = begin_frame(buf);
        buf.put_u8(MESSAGE_TYPE_FETCH_TOPICS_RESPONSE);
        buf.put_u32_le(self.topics.len() as u32);
        for topic in &self.topics {
            put_bytes(buf, topic.topic_name.as_bytes());
            buf.put_u32_le(topic.partition_ids.len() as u32);
            for partition_id in &topic.partition_ids {
                buf.put_i32_le(*partition_id);
            }
        }
        end_frame(buf, body_start);
    }

    pub fn decode(frame: &mut Bytes) -> Result<Self, ProtocolError> {
        let mut body = read_frame(frame)?;
        let message_type = get_u8(&mut body)?;
        if message_type != MESSAGE_TYPE_FETCH_TOPICS_RESPONSE {
            return Err(ProtocolError::UnknownMessageType(message_type));
        }

        let topic_count = get_u32(&mut body)?;
        let mut topics = Vec::with_capacity(topic_count as usize);
        for _ in 0..topic_count {
            let name_bytes = get_bytes(&mut body)?;
            let topic_name = String::from_utf8(name_bytes.to_vec())
                .map_err(|_| ProtocolError::InvalidUtf8)?;

            let partition_count = get_u32(&mut body)?;
            let mut partition_ids = Vec::with_capacity(partition_count as usize);
            for _ in 0..partition_count {
                partition_ids.push(get_i32(&mut body)?);
            }

            topics.push(TopicPartitions {
                topic_name,
                partition_ids,
            });
        }

        Ok(FetchCreatedTopicsResponse { topics })
    }
}

fn begin_frame(buf: &mut BytesMut) -> usize {
    let body_start = buf.len();
    buf.put_u32_le(0); // frame length, patched by end_frame
    body_start
}

fn end_frame(buf: &mut BytesMut, body_start: usize) {
    let frame_len = (buf.len() - body_start - 4) as u32;
    buf[body_start..body_start + 4].copy_from_slice(&frame_len.to_le_bytes());
}

fn read_frame(frame: &mut Bytes) -> Result<Bytes, ProtocolError> {
    let frame_len = get_u32(frame)? as usize;
    if frame.remaining() < frame_len {
        return Err(ProtocolError::TruncatedFrame);
    }
    Ok(frame.split_to(frame_len))
}

fn put_bytes(buf: &mut BytesMut, value: &[u8]) {
    buf.put_u32_le(value.len() as u32);
    buf.put_slice(value);
}

fn get_bytes(buf: &mut Bytes) -> Result<Bytes, ProtocolError> {
    let len = get_u32(buf)? as usize;
    if buf.remaining() < len {
        return Err(ProtocolError::TruncatedFrame);
    }
    Ok(buf.split_to(len))
}

fn get_u8(buf: &mut Bytes) -> Result<u8, ProtocolError> {
    if buf.remaining() < 1 {
        return Err(ProtocolError::TruncatedFrame);
    }
    Ok(buf.get_u8())
}

fn get_u32(buf: &mut Bytes) -> Result<u32, ProtocolError> {
    if buf.remaining() < 4 {
        return Err(ProtocolError::TruncatedFrame);
    }
    Ok(buf.get_u32_le())
}

fn get_i32(buf: &mut Bytes) -> Result<i32, ProtocolError> {
    if buf.remaining() < 4 {
        return Err(ProtocolError::TruncatedFrame);
    }
    Ok(buf.get_i32_le())
}

fn get_u64(buf: &mut Bytes) -> Result<u64, ProtocolError> {
    if buf.remaining() < 8 {
        return Err(ProtocolError::TruncatedFrame);
    }
    Ok(buf.get_u64_le())
}
