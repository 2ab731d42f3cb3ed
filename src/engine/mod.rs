//! BPMN event-subscription behavior of one partition.
//!
//! The engine owns all per-partition state and behaviors and passes itself
//! into each operation, so behaviors never hold references to each other.
//! All operations run on the partition's single-threaded processor.

pub mod catch_events;
pub mod context;
pub mod error;
pub mod expression;
pub mod model;
pub mod record;

mod event_subscription;
mod state_behavior;
mod transition;

pub use catch_events::CatchEventBehavior;
pub use context::BpmnElementContext;
pub use error::{BpmnProcessingError, ErrorType, Failure};
pub use expression::{EvaluationError, Expression};

use crate::state::EngineState;
use crate::stream::LogStreamWriter;
use crate::subscription::SubscriptionCommandSender;
use slog::Logger;
use std::sync::Arc;

/// One partition's execution engine: state, stream writer and behaviors.
pub struct Engine {
    state: EngineState,
    stream_writer: LogStreamWriter,
    catch_event_behavior: CatchEventBehavior,
    logger: Logger,
}

impl Engine {
    pub fn new(command_sender: Arc<SubscriptionCommandSender>, logger: Logger) -> Self {
        Self {
            state: EngineState::new(),
            stream_writer: LogStreamWriter::new(logger.clone()),
            catch_event_behavior: CatchEventBehavior::new(command_sender, logger.clone()),
            logger,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut EngineState {
        &mut self.state
    }

    pub fn stream_writer(&self) -> &LogStreamWriter {
        &self.stream_writer
    }

    pub fn catch_event_behavior(&self) -> &CatchEventBehavior {
        &self.catch_event_behavior
    }
}
