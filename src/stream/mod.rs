//! Log stream writer of the local partition.

use crate::engine::record::{WorkflowInstanceIntent, WorkflowInstanceRecord};
use crate::Key;
use slog::{debug, Logger};

/// How a record entered the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// First record for a newly minted key
    NewEvent,

    /// Record continuing the lifecycle of an existing key
    FollowUpEvent,
}

/// A record appended to the local log stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenRecord {
    pub kind: WriteKind,
    pub key: Key,
    pub intent: WorkflowInstanceIntent,
    pub value: WorkflowInstanceRecord,
}

/// Appends follow-up records to the local partition's log stream.
///
/// Appends preserve call order; readers observe the records in the order
/// they were written here.
pub struct LogStreamWriter {
    records: Vec<WrittenRecord>,
    logger: Logger,
}

impl LogStreamWriter {
    pub fn new(logger: Logger) -> Self {
        Self {
            records: Vec::new(),
            logger,
        }
    }

    pub fn append_new_event(
        &mut self,
        key: Key,
        intent: WorkflowInstanceIntent,
        value: WorkflowInstanceRecord,
    ) {
        self.append(WriteKind::NewEvent, key, intent, value);
    }

    pub fn append_follow_up_event(
        &mut self,
        key: Key,
        intent: WorkflowInstanceIntent,
        value: WorkflowInstanceRecord,
    ) {
        self.append(WriteKind::FollowUpEvent, key, intent, value);
    }

    fn append(
        &mut self,
        kind: WriteKind,
        key: Key,
        intent: WorkflowInstanceIntent,
        value: WorkflowInstanceRecord,
    ) {
        debug!(self.logger, "Appending record";
            "key" => key, "intent" => format!("{:?}", intent),
            "element_id" => value.element_id.clone());
        self.records.push(WrittenRecord {
            kind,
            key,
            intent,
            value,
        });
    }

    /// All records appended so far, in append order.
    pub fn records(&self) -> &[WrittenRecord] {
        &self.records
    }

    /// Records written for one key, in append order.
    pub fn records_for_key(&self, key: Key) -> Vec<&WrittenRecord> {
        self.records.iter().filter(|r| r.key == key).collect()
    }
}
