//! Event-subscription behavior: binds event triggers to scopes and injects
//! them into the execution as activating records.
//!
//! Trigger consumption is atomic per call: peek the earliest trigger, run
//! the handler, store the trigger variables against the minted key, delete
//! the trigger. A missing trigger means the scope was already left and the
//! event is discarded.

use crate::engine::context::BpmnElementContext;
use crate::engine::error::{BpmnProcessingError, Failure};
use crate::engine::model::{
    ActivityElement, CatchEventSupplier, ExecutableEventBasedGateway, ExecutableReceiveTask,
    ExecutableStartEvent,
};
use crate::engine::record::{BpmnElementType, WorkflowInstanceIntent, WorkflowInstanceRecord};
use crate::engine::Engine;
use crate::state::{
    DeployedWorkflow, ElementInstance, ElementInstanceState, EventTrigger, Purpose,
};
use crate::Key;
use slog::debug;

fn no_workflow_found_message(workflow_key: Key) -> String {
    format!(
        "Expected to create an instance of workflow with key '{}', but no such workflow was found",
        workflow_key
    )
}

fn no_triggered_event_message(workflow_key: Key) -> String {
    format!(
        "Expected to create an instance of workflow with key '{}', but no triggered event could be found",
        workflow_key
    )
}

/// Record for the event element: the scope's record value with the
/// triggered element id and type set.
fn event_record(
    value: &WorkflowInstanceRecord,
    trigger: &EventTrigger,
    element_type: BpmnElementType,
) -> WorkflowInstanceRecord {
    let mut record = value.clone();
    record.element_id = trigger.element_id.clone();
    record.element_type = element_type;
    record
}

fn is_interrupted(instance: &ElementInstance) -> bool {
    instance.active_tokens() == 2 && instance.is_interrupted() && instance.is_active()
}

impl Engine {
    /// Install subscriptions for the element's catch events.
    pub fn subscribe_to_events<E>(
        &mut self,
        element: &E,
        context: &BpmnElementContext,
    ) -> Result<(), Failure>
    where
        E: CatchEventSupplier + ?Sized,
    {
        self.catch_event_behavior
            .subscribe_to_events(&self.state.variables, context, element)
    }

    /// Remove all pending subscriptions owned by the scope. Idempotent.
    pub fn unsubscribe_from_events(&mut self, context: &BpmnElementContext) {
        self.catch_event_behavior.unsubscribe_from_events(context);
    }

    /// A receive task saw an event: either one of its boundary events
    /// triggered, or its own message arrived and the task completes.
    pub fn trigger_boundary_or_intermediate_event(
        &mut self,
        element: &ExecutableReceiveTask,
        context: &BpmnElementContext,
    ) -> Result<(), BpmnProcessingError> {
        self.trigger_event(context, |engine, trigger| {
            let triggered_boundary_event = element
                .boundary_events()
                .iter()
                .any(|boundary_event| boundary_event.id == trigger.element_id);

            if triggered_boundary_event {
                engine.trigger_boundary_event_of(element, context, trigger)
            } else {
                engine.transition_to_completing(context);
                Ok(context.element_instance_key)
            }
        })
    }

    /// Consume the trigger and complete the catch element.
    pub fn trigger_intermediate_event(
        &mut self,
        context: &BpmnElementContext,
    ) -> Result<(), BpmnProcessingError> {
        self.trigger_event(context, |engine, _trigger| {
            engine.transition_to_completing(context);
            Ok(context.element_instance_key)
        })
    }

    /// A boundary event of the activity triggered.
    pub fn trigger_boundary_event<E>(
        &mut self,
        element: &E,
        context: &BpmnElementContext,
    ) -> Result<(), BpmnProcessingError>
    where
        E: ActivityElement + ?Sized,
    {
        self.trigger_event(context, |engine, trigger| {
            engine.trigger_boundary_event_of(element, context, trigger)
        })
    }

    fn trigger_boundary_event_of<E>(
        &mut self,
        element: &E,
        context: &BpmnElementContext,
        trigger: &EventTrigger,
    ) -> Result<Key, BpmnProcessingError>
    where
        E: ActivityElement + ?Sized,
    {
        let boundary_event = element
            .boundary_events()
            .iter()
            .find(|boundary_event| boundary_event.id == trigger.element_id)
            .ok_or_else(|| {
                BpmnProcessingError::new(
                    context,
                    format!(
                        "Expected boundary event with id '{}' but not found.",
                        trigger.element_id
                    ),
                )
            })?;

        let record = event_record(&context.record, trigger, BpmnElementType::BoundaryEvent);
        let interrupting = boundary_event.interrupting;

        let boundary_element_instance_key = self.state.key_generator.next_key();
        if interrupting {
            // The deferred event is published only after the activity and
            // its children finished terminating
            self.defer_activating_event(context, boundary_element_instance_key, record);
            self.transition_to_terminating(context);
        } else {
            self.publish_activating_event(context, boundary_element_instance_key, record);
        }

        Ok(boundary_element_instance_key)
    }

    /// Publish the deferred boundary event once termination completed.
    pub fn publish_triggered_boundary_event(&mut self, context: &BpmnElementContext) {
        self.publish_triggered_event(context, BpmnElementType::BoundaryEvent);
    }

    /// An event of the gateway triggered: defer the target's activation and
    /// complete the gateway.
    pub fn trigger_event_based_gateway(
        &mut self,
        element: &ExecutableEventBasedGateway,
        context: &BpmnElementContext,
    ) -> Result<(), BpmnProcessingError> {
        self.trigger_event(context, |engine, trigger| {
            let target = element
                .outgoing
                .iter()
                .map(|sequence_flow| &sequence_flow.target)
                .find(|target| target.id == trigger.element_id)
                .ok_or_else(|| {
                    BpmnProcessingError::new(
                        context,
                        format!(
                            "Expected an event attached to the event-based gateway with id '{}' but not found.",
                            trigger.element_id
                        ),
                    )
                })?;

            let record = event_record(&context.record, trigger, target.element_type);

            let event_element_instance_key = engine.state.key_generator.next_key();
            engine.defer_activating_event(context, event_element_instance_key, record);
            engine.transition_to_completing(context);

            Ok(event_element_instance_key)
        })
    }

    /// Publish the deferred gateway target once the gateway completed.
    pub fn publish_triggered_event_based_gateway(&mut self, context: &BpmnElementContext) {
        self.publish_triggered_event(context, BpmnElementType::IntermediateCatchEvent);
    }

    /// Mint a workflow instance from a triggered start event.
    ///
    /// The event trigger lives at the workflow key's scope; it is consumed
    /// here and its variables travel with the deferred start event.
    pub fn trigger_start_event(
        &mut self,
        context: &BpmnElementContext,
    ) -> Result<(), BpmnProcessingError> {
        let workflow_key = context.workflow_key();
        let workflow_instance_key = context.workflow_instance_key();

        let workflow = self
            .state
            .workflows
            .workflow_by_key(workflow_key)
            .cloned()
            .ok_or_else(|| {
                // workflows are never deleted, so this is a bug indicator
                BpmnProcessingError::new(context, no_workflow_found_message(workflow_key))
            })?;

        let triggered_event = self
            .state
            .event_scopes
            .peek_event_trigger(workflow_key)
            .cloned()
            .ok_or_else(|| {
                BpmnProcessingError::new(context, no_triggered_event_message(workflow_key))
            })?;

        self.create_workflow_instance(&workflow, workflow_instance_key);

        let mut record = event_record(
            &context.record,
            &triggered_event,
            BpmnElementType::StartEvent,
        );
        record.workflow_instance_key = workflow_instance_key;
        record.version = workflow.version;
        record.bpmn_process_id = workflow.bpmn_process_id.clone();
        record.flow_scope_key = workflow_instance_key;

        let new_event_instance_key = self.state.key_generator.next_key();
        self.state.element_instances.store_record(
            new_event_instance_key,
            workflow_instance_key,
            record,
            WorkflowInstanceIntent::ElementActivating,
            Purpose::Deferred,
        );

        self.state
            .variables
            .set_temporary_variables(new_event_instance_key, triggered_event.variables.clone());

        self.state
            .event_scopes
            .delete_trigger(workflow_key, triggered_event.event_key);

        Ok(())
    }

    fn create_workflow_instance(
        &mut self,
        workflow: &DeployedWorkflow,
        workflow_instance_key: Key,
    ) {
        let record = WorkflowInstanceRecord {
            bpmn_process_id: workflow.bpmn_process_id.clone(),
            version: workflow.version,
            workflow_key: workflow.key,
            workflow_instance_key,
            element_id: workflow.root_element_id.clone(),
            flow_scope_key: 0,
            element_type: workflow.root_element_type,
        };

        self.state.element_instances.new_instance(
            workflow_instance_key,
            0,
            record.clone(),
            ElementInstanceState::Activating,
        );

        self.stream_writer.append_follow_up_event(
            workflow_instance_key,
            WorkflowInstanceIntent::ElementActivating,
            record,
        );
    }

    /// Publish the deferred start event under the workflow instance.
    ///
    /// Returns false when no deferred start event exists, which is legal
    /// during scope teardown.
    pub fn publish_triggered_start_event(&mut self, context: &BpmnElementContext) -> bool {
        let deferred_start_event = self
            .state
            .element_instances
            .deferred_records(context.element_instance_key)
            .into_iter()
            .find(|record| {
                record.record.element_type == BpmnElementType::StartEvent
                    && record.intent == WorkflowInstanceIntent::ElementActivating
            })
            .map(|record| (record.key, record.record.clone()));

        match deferred_start_event {
            Some((element_instance_key, record)) => {
                self.state
                    .element_instances
                    .remove_stored_record(context.element_instance_key, element_instance_key);

                self.stream_writer.append_new_event(
                    element_instance_key,
                    WorkflowInstanceIntent::ElementActivating,
                    record.clone(),
                );

                self.create_child_element_instance(context, element_instance_key, record);
                self.update_element_instance(context, ElementInstance::spawn_token);
                true
            }
            None => false,
        }
    }

    /// An event sub-process of the flow scope triggered.
    ///
    /// Operates on the flow scope of `context`. A scope that is already
    /// interrupted discards further triggers.
    pub fn trigger_event_sub_process(
        &mut self,
        start_event: &ExecutableStartEvent,
        context: &BpmnElementContext,
    ) -> Result<(), BpmnProcessingError> {
        let flow_scope_context = match self.flow_scope_instance(context) {
            Some(flow_scope) => {
                if flow_scope.interrupting_event_key() > 0 {
                    // the flow scope is already interrupted - discard
                    debug!(self.logger, "Discarding event sub-process trigger, scope interrupted";
                        "flow_scope_key" => flow_scope.key);
                    return Ok(());
                }
                BpmnElementContext::of(flow_scope)
            }
            None => {
                // the scope is gone, so is the event
                return Ok(());
            }
        };

        let event_sub_process_id = start_event.event_sub_process.clone().ok_or_else(|| {
            BpmnProcessingError::new(
                context,
                format!(
                    "Expected start event '{}' to belong to an event sub-process",
                    start_event.id
                ),
            )
        })?;

        let interrupting = start_event.interrupting;

        self.trigger_event(&flow_scope_context, |engine, trigger| {
            let mut record = event_record(&context.record, trigger, BpmnElementType::SubProcess);
            record.element_id = event_sub_process_id;

            let event_element_instance_key = engine.state.key_generator.next_key();
            if interrupting {
                engine.trigger_interrupting_event_sub_process(
                    context,
                    &flow_scope_context,
                    record,
                    event_element_instance_key,
                );
            } else {
                // non-interrupting event sub-processes activate immediately
                engine.publish_activating_event(context, event_element_instance_key, record);
            }

            Ok(event_element_instance_key)
        })
    }

    fn trigger_interrupting_event_sub_process(
        &mut self,
        context: &BpmnElementContext,
        flow_scope_context: &BpmnElementContext,
        record: WorkflowInstanceRecord,
        event_element_instance_key: Key,
    ) {
        self.unsubscribe_from_events(flow_scope_context);

        let no_active_child_instances = self.terminate_child_instances(flow_scope_context);
        if no_active_child_instances {
            self.publish_activating_event(context, event_element_instance_key, record);
        } else {
            // wait until the last child terminated
            self.defer_activating_event(flow_scope_context, event_element_instance_key, record);
        }

        self.update_flow_scope_instance(context, |flow_scope| {
            flow_scope.spawn_token();
            flow_scope.set_interrupting_event_key(event_element_instance_key);
        });
    }

    /// Publish the deferred interrupting event sub-process once the scope
    /// reached the interrupted state.
    pub fn publish_triggered_event_sub_process(&mut self, context: &BpmnElementContext) {
        let interrupting_event_key = match self
            .state
            .element_instances
            .get(context.element_instance_key)
        {
            Some(instance) if is_interrupted(instance) => instance.interrupting_event_key(),
            _ => return,
        };

        let deferred = self
            .state
            .element_instances
            .deferred_records(context.element_instance_key)
            .into_iter()
            .find(|record| {
                record.key == interrupting_event_key
                    && record.record.element_type == BpmnElementType::SubProcess
            })
            .map(|record| (record.key, record.record.clone()));

        if let Some((element_instance_key, record)) = deferred {
            self.state
                .element_instances
                .remove_stored_record(context.element_instance_key, element_instance_key);

            self.stream_writer.append_new_event(
                element_instance_key,
                WorkflowInstanceIntent::ElementActivating,
                record.clone(),
            );

            self.create_child_element_instance(context, element_instance_key, record);
        }
    }

    /// Atomic trigger consumption: peek, handle, attach variables, delete.
    fn trigger_event<F>(
        &mut self,
        context: &BpmnElementContext,
        handler: F,
    ) -> Result<(), BpmnProcessingError>
    where
        F: FnOnce(&mut Self, &EventTrigger) -> Result<Key, BpmnProcessingError>,
    {
        let event_trigger = match self
            .state
            .event_scopes
            .peek_event_trigger(context.element_instance_key)
        {
            Some(trigger) => trigger.clone(),
            None => {
                // the event scope was left - discard the event
                return Ok(());
            }
        };

        let event_element_instance_key = handler(self, &event_trigger)?;

        self.state
            .variables
            .set_temporary_variables(event_element_instance_key, event_trigger.variables.clone());

        self.state
            .event_scopes
            .delete_trigger(context.element_instance_key, event_trigger.event_key);

        Ok(())
    }

    fn defer_activating_event(
        &mut self,
        context: &BpmnElementContext,
        event_element_instance_key: Key,
        record: WorkflowInstanceRecord,
    ) {
        self.state.element_instances.store_record(
            event_element_instance_key,
            context.element_instance_key,
            record,
            WorkflowInstanceIntent::ElementActivating,
            Purpose::Deferred,
        );
    }

    /// Append the activating record, create the child instance in the flow
    /// scope, and spawn a token there.
    fn publish_activating_event(
        &mut self,
        context: &BpmnElementContext,
        element_instance_key: Key,
        record: WorkflowInstanceRecord,
    ) {
        self.stream_writer.append_new_event(
            element_instance_key,
            WorkflowInstanceIntent::ElementActivating,
            record.clone(),
        );

        self.create_element_instance_in_flow_scope(context, element_instance_key, record);
        self.spawn_token(context);
    }

    /// Deferred -> publish handoff: first deferred activating record of the
    /// given element type under this scope.
    fn publish_triggered_event(
        &mut self,
        context: &BpmnElementContext,
        element_type: BpmnElementType,
    ) {
        let deferred = self
            .state
            .element_instances
            .deferred_records(context.element_instance_key)
            .into_iter()
            .find(|record| {
                record.record.element_type == element_type
                    && record.intent == WorkflowInstanceIntent::ElementActivating
            })
            .map(|record| (record.key, record.record.clone()));

        if let Some((element_instance_key, record)) = deferred {
            self.state
                .element_instances
                .remove_stored_record(context.element_instance_key, element_instance_key);
            self.publish_activating_event(context, element_instance_key, record);
        }
    }
}
