//! Catch event subscriptions of element scopes.
//!
//! Subscribing a scope evaluates the subscription data first and opens the
//! subscriptions only afterwards, so an evaluation failure leaves no
//! half-opened state behind. Message subscriptions travel through the
//! command sender; timer and signal subscriptions are local to the
//! partition.

use crate::engine::context::BpmnElementContext;
use crate::engine::error::{ErrorType, Failure};
use crate::engine::expression::{self, EvaluationError, Expression};
use crate::engine::model::{CatchEventSupplier, CatchEventType, ExecutableCatchEvent};
use crate::state::VariablesStore;
use crate::subscription::{Dispatch, SubscriptionCommandSender};
use crate::{Key, PartitionId};
use bytes::Bytes;
use slog::{debug, Logger};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// A subscription held open for a scope
#[derive(Debug, Clone)]
enum OpenedSubscription {
    Message {
        subscription_partition_id: PartitionId,
        message_name: Bytes,
    },
    Timer {
        element_id: String,
    },
    Signal {
        name: Bytes,
    },
}

/// Evaluated subscription data, not yet opened
enum PendingSubscription {
    Message {
        subscription_partition_id: PartitionId,
        message_name: Bytes,
        correlation_key: Bytes,
    },
    Timer {
        element_id: String,
        due_in: Duration,
    },
    Signal {
        name: Bytes,
    },
}

/// Subscribes scopes to their declared catch events and closes the
/// subscriptions again when the scope is left.
pub struct CatchEventBehavior {
    command_sender: Arc<SubscriptionCommandSender>,
    subscriptions: HashMap<Key, Vec<OpenedSubscription>>,
    logger: Logger,
}

impl CatchEventBehavior {
    pub fn new(command_sender: Arc<SubscriptionCommandSender>, logger: Logger) -> Self {
        Self {
            command_sender,
            subscriptions: HashMap::new(),
            logger,
        }
    }

    /// Install subscriptions for all catch events of the element.
    ///
    /// On failure nothing is opened; the failure names the scope at which
    /// the incident is to be raised.
    pub fn subscribe_to_events<E>(
        &mut self,
        variables: &VariablesStore,
        context: &BpmnElementContext,
        element: &E,
    ) -> Result<(), Failure>
    where
        E: CatchEventSupplier + ?Sized,
    {
        // Evaluate everything before opening anything
        let mut pending = Vec::new();
        for catch_event in element.catch_events() {
            pending.push(self.evaluate_subscription(variables, context, catch_event)?);
        }

        let opened: Vec<OpenedSubscription> = pending
            .into_iter()
            .map(|subscription| self.open_subscription(context, subscription))
            .collect();

        if !opened.is_empty() {
            self.subscriptions
                .entry(context.element_instance_key)
                .or_default()
                .extend(opened);
        }

        Ok(())
    }

    /// Close all subscriptions owned by the scope. Idempotent.
    pub fn unsubscribe_from_events(&mut self, context: &BpmnElementContext) {
        let opened = match self.subscriptions.remove(&context.element_instance_key) {
            Some(opened) => opened,
            None => return,
        };

        for subscription in opened {
            match subscription {
                OpenedSubscription::Message {
                    subscription_partition_id,
                    message_name,
                } => {
                    let dispatch = self.command_sender.close_message_subscription(
                        subscription_partition_id,
                        context.workflow_instance_key(),
                        context.element_instance_key,
                        &message_name,
                    );
                    if !dispatch.should_advance() {
                        debug!(self.logger, "Close refused by transport, pending check resends";
                            "element_instance_key" => context.element_instance_key);
                    }
                }
                OpenedSubscription::Timer { .. } | OpenedSubscription::Signal { .. } => {
                    // local only, dropping the entry is the close
                }
            }
        }
    }

    /// Whether the scope currently holds any subscription
    pub fn has_subscriptions(&self, scope_key: Key) -> bool {
        self.subscriptions.contains_key(&scope_key)
    }

    fn evaluate_subscription(
        &self,
        variables: &VariablesStore,
        context: &BpmnElementContext,
        catch_event: &ExecutableCatchEvent,
    ) -> Result<PendingSubscription, Failure> {
        match &catch_event.event_type {
            CatchEventType::Message {
                name,
                correlation_key,
            } => {
                let message_name = self.evaluate_message_name(variables, context, name)?;
                let correlation_key =
                    self.extract_correlation_key(variables, context, correlation_key)?;

                let subscription_partition_id = self
                    .command_sender
                    .subscription_partition_id(&correlation_key)
                    .map_err(|e| {
                        Failure::new(
                            e.to_string(),
                            ErrorType::Unknown,
                            context.variables_scope_key(),
                        )
                    })?;

                Ok(PendingSubscription::Message {
                    subscription_partition_id,
                    message_name,
                    correlation_key,
                })
            }
            CatchEventType::Timer { due_in } => Ok(PendingSubscription::Timer {
                element_id: catch_event.id.clone(),
                due_in: *due_in,
            }),
            CatchEventType::Signal { name } => Ok(PendingSubscription::Signal {
                name: name.clone(),
            }),
        }
    }

    fn open_subscription(
        &self,
        context: &BpmnElementContext,
        subscription: PendingSubscription,
    ) -> OpenedSubscription {
        match subscription {
            PendingSubscription::Message {
                subscription_partition_id,
                message_name,
                correlation_key,
            } => {
                // Partition ids were resolved during evaluation, so the
                // only reason not to transmit here is missing topology or
                // backpressure; both are replayed by the pending check
                let dispatch = self
                    .command_sender
                    .open_message_subscription(
                        context.workflow_instance_key(),
                        context.element_instance_key,
                        &message_name,
                        &correlation_key,
                    )
                    .unwrap_or(Dispatch::Retry);
                if !dispatch.should_advance() {
                    debug!(self.logger, "Open refused by transport, pending check resends";
                        "element_instance_key" => context.element_instance_key);
                }

                OpenedSubscription::Message {
                    subscription_partition_id,
                    message_name,
                }
            }
            PendingSubscription::Timer { element_id, due_in } => {
                debug!(self.logger, "Timer subscription installed";
                    "element_id" => element_id.clone(), "due_in_ms" => due_in.as_millis() as u64);
                OpenedSubscription::Timer { element_id }
            }
            PendingSubscription::Signal { name } => OpenedSubscription::Signal { name },
        }
    }

    fn evaluate_message_name(
        &self,
        variables: &VariablesStore,
        context: &BpmnElementContext,
        name: &Expression,
    ) -> Result<Bytes, Failure> {
        expression::evaluate(name, context.variables_scope_key(), variables).map_err(
            |e| match e {
                EvaluationError::Evaluation { message } => Failure::new(
                    format!("Failed to evaluate message name: {}", message),
                    ErrorType::ExtractValueError,
                    context.element_instance_key,
                ),
                EvaluationError::ValueNotFound { message } => Failure::new(
                    format!("Failed to evaluate message name: {}", message),
                    ErrorType::ExtractValueError,
                    context.variables_scope_key(),
                ),
            },
        )
    }

    fn extract_correlation_key(
        &self,
        variables: &VariablesStore,
        context: &BpmnElementContext,
        correlation_key: &Expression,
    ) -> Result<Bytes, Failure> {
        expression::evaluate(correlation_key, context.variables_scope_key(), variables).map_err(
            |e| match e {
                EvaluationError::Evaluation { message } => Failure::new(
                    message,
                    ErrorType::ExtractValueError,
                    context.element_instance_key,
                ),
                EvaluationError::ValueNotFound { message } => Failure::new(
                    message,
                    ErrorType::ExtractValueError,
                    context.variables_scope_key(),
                ),
            },
        )
    }
}
