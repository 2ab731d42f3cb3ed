//! Element-instance state access shared by the behavior operations.

use crate::engine::context::BpmnElementContext;
use crate::engine::record::WorkflowInstanceRecord;
use crate::engine::Engine;
use crate::state::{ElementInstance, ElementInstanceState};
use crate::Key;

impl Engine {
    pub(crate) fn flow_scope_instance(&self, context: &BpmnElementContext) -> Option<&ElementInstance> {
        self.state.element_instances.get(context.flow_scope_key)
    }

    /// Create an element instance inside the context's flow scope.
    pub(crate) fn create_element_instance_in_flow_scope(
        &mut self,
        context: &BpmnElementContext,
        element_instance_key: Key,
        record: WorkflowInstanceRecord,
    ) {
        self.state.element_instances.new_instance(
            element_instance_key,
            context.flow_scope_key,
            record,
            ElementInstanceState::Activating,
        );
    }

    /// Create an element instance as a direct child of the context element.
    pub(crate) fn create_child_element_instance(
        &mut self,
        context: &BpmnElementContext,
        element_instance_key: Key,
        record: WorkflowInstanceRecord,
    ) {
        self.state.element_instances.new_instance(
            element_instance_key,
            context.element_instance_key,
            record,
            ElementInstanceState::Activating,
        );
    }

    /// Spawn a token in the context's flow scope.
    pub(crate) fn spawn_token(&mut self, context: &BpmnElementContext) {
        if let Some(flow_scope) = self.state.element_instances.get_mut(context.flow_scope_key) {
            flow_scope.spawn_token();
        }
    }

    pub(crate) fn update_element_instance<F>(&mut self, context: &BpmnElementContext, update: F)
    where
        F: FnOnce(&mut ElementInstance),
    {
        if let Some(instance) = self.state.element_instances.get_mut(context.element_instance_key) {
            update(instance);
        }
    }

    pub(crate) fn update_flow_scope_instance<F>(&mut self, context: &BpmnElementContext, update: F)
    where
        F: FnOnce(&mut ElementInstance),
    {
        if let Some(flow_scope) = self.state.element_instances.get_mut(context.flow_scope_key) {
            update(flow_scope);
        }
    }
}
