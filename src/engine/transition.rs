//! Lifecycle transitions invoked by the event-subscription behavior.

use crate::engine::context::BpmnElementContext;
use crate::engine::record::WorkflowInstanceIntent;
use crate::engine::Engine;
use crate::state::ElementInstanceState;

impl Engine {
    /// Move the element towards completion; the completing record follows
    /// on the stream.
    pub fn transition_to_completing(&mut self, context: &BpmnElementContext) {
        self.transition_to(
            context,
            ElementInstanceState::Completing,
            WorkflowInstanceIntent::ElementCompleting,
        );
    }

    /// Move the element towards termination (interrupting path).
    pub fn transition_to_terminating(&mut self, context: &BpmnElementContext) {
        self.transition_to(
            context,
            ElementInstanceState::Terminating,
            WorkflowInstanceIntent::ElementTerminating,
        );
    }

    fn transition_to(
        &mut self,
        context: &BpmnElementContext,
        state: ElementInstanceState,
        intent: WorkflowInstanceIntent,
    ) {
        if let Some(instance) = self.state.element_instances.get_mut(context.element_instance_key)
        {
            instance.state = state;
        }
        self.stream_writer.append_follow_up_event(
            context.element_instance_key,
            intent,
            context.record.clone(),
        );
    }

    /// Request termination of all active children of the scope.
    ///
    /// Returns true when no child needed terminating, i.e. the scope was
    /// already quiet.
    pub(crate) fn terminate_child_instances(
        &mut self,
        flow_scope_context: &BpmnElementContext,
    ) -> bool {
        let children = self
            .state
            .element_instances
            .children(flow_scope_context.element_instance_key);

        let mut active_children = false;
        for child_key in children {
            let child_context = match self.state.element_instances.get(child_key) {
                Some(child) if child.state.can_terminate() => BpmnElementContext::of(child),
                _ => continue,
            };

            active_children = true;
            self.transition_to_terminating(&child_context);
        }

        !active_children
    }
}
