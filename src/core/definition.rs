//! State definitions and the action types attached to them.
//!
//! A `StateDefinition` is the immutable description of one state: its name,
//! the definition it is nested in, whether it claims to be the initial state
//! among its siblings, and the ordered actions registered for it. Definitions
//! are shared behind `Arc` so the same definition can be handed to several
//! machines, and so a child can reference its parent.

use crate::builder::StateBuilder;
use crate::runtime::{ActionError, StateContext};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Future returned by entry and exit actions.
pub type ActionFuture = BoxFuture<'static, Result<(), ActionError>>;

/// Future returned by event handlers. `Ok(true)` means the event was consumed.
pub type HandlerFuture = BoxFuture<'static, Result<bool, ActionError>>;

/// Entry or exit action. Receives a context bound to the owning machine.
pub type Action = Arc<dyn Fn(StateContext) -> ActionFuture + Send + Sync>;

/// Event handler. Handlers for one event run in registration order until one
/// reports the event as consumed.
pub type EventHandler = Arc<dyn Fn(StateContext) -> HandlerFuture + Send + Sync>;

/// Opaque identifier of an event delivered to the active state.
///
/// # Example
///
/// ```rust
/// use nestor::EventId;
///
/// let id = EventId::from("power_on");
/// assert_eq!(id.as_str(), "power_on");
/// assert_eq!(id.to_string(), "power_on");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Create an event id from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for EventId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&String> for EventId {
    fn from(id: &String) -> Self {
        Self(id.clone())
    }
}

impl Borrow<str> for EventId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable description of a single state.
///
/// Built with [`StateDefinition::builder`]. Entry actions, exit actions and
/// per-event handler lists keep the order they were registered in; that order
/// is the order they run in.
///
/// # Example
///
/// ```rust
/// use nestor::StateDefinition;
///
/// let powered_on = StateDefinition::builder("PoweredOn").build();
/// let idle = StateDefinition::builder("Idle")
///     .parent(&powered_on)
///     .initial()
///     .build();
///
/// assert_eq!(idle.name(), "Idle");
/// assert_eq!(idle.parent().map(|p| p.name()), Some("PoweredOn"));
/// assert!(idle.is_initial());
/// ```
pub struct StateDefinition {
    pub(crate) name: String,
    pub(crate) parent: Option<Arc<StateDefinition>>,
    pub(crate) initial: bool,
    pub(crate) entry_actions: Vec<Action>,
    pub(crate) exit_actions: Vec<Action>,
    pub(crate) handlers: HashMap<EventId, Vec<EventHandler>>,
}

impl StateDefinition {
    /// Start registering a state with the given name.
    pub fn builder(name: impl Into<String>) -> StateBuilder {
        StateBuilder::new(name)
    }

    /// Unique name of the state.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The definition this state is nested in, if any.
    pub fn parent(&self) -> Option<&Arc<StateDefinition>> {
        self.parent.as_ref()
    }

    /// Whether this state was explicitly declared initial among its siblings.
    pub fn is_initial(&self) -> bool {
        self.initial
    }

    /// Entry actions in registration order.
    pub fn entry_actions(&self) -> &[Action] {
        &self.entry_actions
    }

    /// Exit actions in registration order.
    pub fn exit_actions(&self) -> &[Action] {
        &self.exit_actions
    }

    /// Handlers registered for `event`, in registration order.
    ///
    /// Returns an empty slice when nothing is registered for the event.
    pub fn handlers(&self, event: &str) -> &[EventHandler] {
        self.handlers
            .get(event)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Event ids this state has at least one handler for.
    pub fn events(&self) -> impl Iterator<Item = &EventId> {
        self.handlers.keys()
    }
}

impl fmt::Debug for StateDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut events: Vec<&str> = self.handlers.keys().map(EventId::as_str).collect();
        events.sort_unstable();

        f.debug_struct("StateDefinition")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field("initial", &self.initial)
            .field("entry_actions", &self.entry_actions.len())
            .field("exit_actions", &self.exit_actions.len())
            .field("events", &events)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_id_conversions_agree() {
        let from_str = EventId::from("tick");
        let from_string = EventId::from(String::from("tick"));
        let from_new = EventId::new("tick");

        assert_eq!(from_str, from_string);
        assert_eq!(from_str, from_new);
        assert_eq!(from_str.as_str(), "tick");
    }

    #[test]
    fn event_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&EventId::from("power_on")).unwrap();
        assert_eq!(json, "\"power_on\"");

        let back: EventId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_str(), "power_on");
    }

    #[test]
    fn handlers_for_unknown_event_is_empty() {
        let state = StateDefinition::builder("Idle").build();

        assert!(state.handlers("missing").is_empty());
        assert_eq!(state.events().count(), 0);
    }

    #[test]
    fn debug_output_names_parent_and_events() {
        let parent = StateDefinition::builder("PoweredOn").build();
        let child = StateDefinition::builder("Idle")
            .parent(&parent)
            .on_event("brew", |_ctx| async { Ok(true) })
            .build();

        let debug = format!("{child:?}");
        assert!(debug.contains("\"Idle\""));
        assert!(debug.contains("Some(\"PoweredOn\")"));
        assert!(debug.contains("brew"));
    }
}
