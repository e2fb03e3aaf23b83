//! Per-state runtime objects and the context handed to actions.

use crate::core::{EventId, NodeId, StateDefinition};
use crate::runtime::error::{MachineError, Result};
use crate::runtime::machine::{MachineInner, StateMachine};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::error;

/// Runtime counterpart of a [`StateDefinition`].
///
/// A machine creates exactly one instance per definition when it is built and
/// reuses it on every entry. The instance keeps a weak reference to its
/// machine so it never keeps the machine alive on its own.
pub struct StateInstance {
    node: NodeId,
    definition: Arc<StateDefinition>,
    machine: Weak<MachineInner>,
}

impl StateInstance {
    pub(crate) fn new(
        node: NodeId,
        definition: Arc<StateDefinition>,
        machine: Weak<MachineInner>,
    ) -> Self {
        Self {
            node,
            definition,
            machine,
        }
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn definition(&self) -> &Arc<StateDefinition> {
        &self.definition
    }

    /// The owning machine, if it still exists.
    pub fn machine(&self) -> Option<StateMachine> {
        self.machine.upgrade().map(StateMachine::from_inner)
    }

    /// A context bound to the owning machine.
    pub fn context(&self) -> Result<StateContext> {
        self.machine()
            .map(|machine| self.context_for(machine))
            .ok_or(MachineError::Detached)
    }

    /// Queue this state's own name as an event.
    pub async fn queue_event(&self) -> Result<()> {
        let machine = self.machine().ok_or(MachineError::Detached)?;
        machine.queue_event(self.name()).await
    }

    fn context_for(&self, machine: StateMachine) -> StateContext {
        StateContext {
            state: self.name().to_owned(),
            machine,
        }
    }

    /// Run entry actions in registration order. Failures are logged and the
    /// remaining actions still run.
    pub(crate) async fn enter(&self, machine: &StateMachine) {
        for action in self.definition.entry_actions() {
            if let Err(e) = action(self.context_for(machine.clone())).await {
                error!(
                    machine = %machine.name(),
                    state = %self.name(),
                    error = %e,
                    "Entry action failed"
                );
            }
        }
    }

    /// Run exit actions in registration order. Failures are logged and the
    /// remaining actions still run.
    pub(crate) async fn exit(&self, machine: &StateMachine) {
        for action in self.definition.exit_actions() {
            if let Err(e) = action(self.context_for(machine.clone())).await {
                error!(
                    machine = %machine.name(),
                    state = %self.name(),
                    error = %e,
                    "Exit action failed"
                );
            }
        }
    }

    /// Offer `event` to this state's handlers in registration order.
    ///
    /// Returns `Ok(true)` as soon as one handler consumes the event. A failing
    /// handler stops dispatch and is reported as [`MachineError::Action`].
    pub(crate) async fn process_event(
        &self,
        machine: &StateMachine,
        event: &EventId,
    ) -> Result<bool> {
        for handler in self.definition.handlers(event.as_str()) {
            let consumed = handler(self.context_for(machine.clone()))
                .await
                .map_err(|source| MachineError::Action {
                    state: self.name().to_owned(),
                    source: Box::new(source),
                })?;

            if consumed {
                return Ok(true);
            }
        }

        Ok(false)
    }
}

impl fmt::Debug for StateInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateInstance")
            .field("name", &self.name())
            .field("node", &self.node)
            .finish()
    }
}

/// Handle passed to every entry, exit and event action.
///
/// Holds a strong clone of the machine for the duration of the call, so an
/// action can request transitions and queue events.
#[derive(Clone, Debug)]
pub struct StateContext {
    state: String,
    machine: StateMachine,
}

impl StateContext {
    /// Name of the state whose action is running.
    pub fn state_name(&self) -> &str {
        &self.state
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    /// The instance of the state whose action is running.
    pub fn state(&self) -> Option<Arc<StateInstance>> {
        self.machine.instance(&self.state)
    }

    /// Request a transition. Fails with
    /// [`MachineError::TransitionInProgress`] when called from an entry or
    /// exit action.
    pub async fn transition_to(&self, target: &str) -> Result<()> {
        self.machine.transition_to(target).await
    }

    pub async fn queue_event(&self, event: impl Into<EventId>) -> Result<()> {
        self.machine.queue_event(event).await
    }

    pub fn try_queue_event(&self, event: impl Into<EventId>) -> Result<()> {
        self.machine.try_queue_event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ActionError;
    use std::sync::Mutex;

    fn machine(states: Vec<Arc<StateDefinition>>) -> StateMachine {
        StateMachine::builder().states(states).build().unwrap()
    }

    #[tokio::test]
    async fn instance_reports_its_definition() {
        let machine = machine(vec![StateDefinition::builder("Idle").build()]);

        let idle = machine.instance("Idle").unwrap();
        assert_eq!(idle.name(), "Idle");
        assert_eq!(idle.definition().name(), "Idle");
        assert_eq!(idle.machine().unwrap().id(), machine.id());
        assert_eq!(idle.context().unwrap().state_name(), "Idle");
    }

    #[tokio::test]
    async fn instance_detaches_when_machine_is_dropped() {
        let machine = machine(vec![StateDefinition::builder("Idle").build()]);
        let idle = machine.instance("Idle").unwrap();
        drop(machine);

        assert!(idle.machine().is_none());
        assert!(matches!(idle.context(), Err(MachineError::Detached)));
        assert!(matches!(idle.queue_event().await, Err(MachineError::Detached)));
    }

    #[tokio::test]
    async fn handlers_stop_at_first_consumer() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (c1, c2, c3) = (calls.clone(), calls.clone(), calls.clone());
        let state = StateDefinition::builder("Idle")
            .on_event("tick", move |_ctx| {
                let calls = c1.clone();
                async move {
                    calls.lock().unwrap().push(1);
                    Ok(false)
                }
            })
            .on_event("tick", move |_ctx| {
                let calls = c2.clone();
                async move {
                    calls.lock().unwrap().push(2);
                    Ok(true)
                }
            })
            .on_event("tick", move |_ctx| {
                let calls = c3.clone();
                async move {
                    calls.lock().unwrap().push(3);
                    Ok(true)
                }
            })
            .build();
        let machine = machine(vec![state]);
        let idle = machine.instance("Idle").unwrap();

        let consumed = idle
            .process_event(&machine, &EventId::from("tick"))
            .await
            .unwrap();

        assert!(consumed);
        assert_eq!(*calls.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn failing_handler_is_reported_with_state_name() {
        let state = StateDefinition::builder("Idle")
            .on_event("tick", |_ctx| async { Err(ActionError::failed("boom")) })
            .build();
        let machine = machine(vec![state]);
        let idle = machine.instance("Idle").unwrap();

        let result = idle.process_event(&machine, &EventId::from("tick")).await;

        match result {
            Err(MachineError::Action { state, source }) => {
                assert_eq!(state, "Idle");
                assert_eq!(source.to_string(), "boom");
            }
            other => panic!("Expected action error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unregistered_event_is_not_consumed() {
        let machine = machine(vec![StateDefinition::builder("Idle").build()]);
        let idle = machine.instance("Idle").unwrap();

        let consumed = idle
            .process_event(&machine, &EventId::from("unknown"))
            .await
            .unwrap();

        assert!(!consumed);
    }

    #[tokio::test]
    async fn queue_event_uses_state_name() {
        let consumed = Arc::new(Mutex::new(false));
        let flag = consumed.clone();
        let state = StateDefinition::builder("Idle")
            .on_event("Idle", move |_ctx| {
                let flag = flag.clone();
                async move {
                    *flag.lock().unwrap() = true;
                    Ok(true)
                }
            })
            .build();
        let machine = machine(vec![state]);
        machine.start().await.unwrap();

        machine.instance("Idle").unwrap().queue_event().await.unwrap();
        machine.run_once().await.unwrap();

        assert!(*consumed.lock().unwrap());
    }
}
