//! Builder for registering a state and its actions.

use crate::core::{Action, EventHandler, EventId, StateDefinition};
use crate::runtime::{ActionError, StateContext};
use futures_util::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Fluent registration of a state's parent, initial marker and actions.
///
/// Actions are kept exactly in the order they are registered: that order is
/// the order they run in. Nothing is reordered or deduplicated.
///
/// # Example
///
/// ```rust
/// use nestor::StateDefinition;
///
/// let powered_off = StateDefinition::builder("PoweredOff")
///     .initial()
///     .on_entry(|_ctx| async { Ok(()) })
///     .on_event("power_on", |ctx| async move {
///         ctx.transition_to("PoweredOn").await?;
///         Ok(true)
///     })
///     .build();
///
/// assert_eq!(powered_off.entry_actions().len(), 1);
/// assert_eq!(powered_off.handlers("power_on").len(), 1);
/// ```
pub struct StateBuilder {
    name: String,
    parent: Option<Arc<StateDefinition>>,
    initial: bool,
    entry_actions: Vec<Action>,
    exit_actions: Vec<Action>,
    handlers: HashMap<EventId, Vec<EventHandler>>,
}

impl StateBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            initial: false,
            entry_actions: Vec::new(),
            exit_actions: Vec::new(),
            handlers: HashMap::new(),
        }
    }

    /// Nest this state inside `parent`.
    pub fn parent(mut self, parent: &Arc<StateDefinition>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    /// Declare this state the initial state among its siblings.
    pub fn initial(mut self) -> Self {
        self.initial = true;
        self
    }

    /// Append an action run when the state is entered.
    pub fn on_entry<F, Fut>(mut self, action: F) -> Self
    where
        F: Fn(StateContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
    {
        let action: Action = Arc::new(move |ctx: StateContext| action(ctx).boxed());
        self.entry_actions.push(action);
        self
    }

    /// Append an action run when the state is exited.
    pub fn on_exit<F, Fut>(mut self, action: F) -> Self
    where
        F: Fn(StateContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
    {
        let action: Action = Arc::new(move |ctx: StateContext| action(ctx).boxed());
        self.exit_actions.push(action);
        self
    }

    /// Append a handler for `event`. Returning `Ok(true)` consumes the event
    /// and stops later handlers for it from running.
    pub fn on_event<E, F, Fut>(mut self, event: E, handler: F) -> Self
    where
        E: Into<EventId>,
        F: Fn(StateContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, ActionError>> + Send + 'static,
    {
        let handler: EventHandler = Arc::new(move |ctx: StateContext| handler(ctx).boxed());
        self.handlers.entry(event.into()).or_default().push(handler);
        self
    }

    /// Finish registration.
    pub fn build(self) -> Arc<StateDefinition> {
        Arc::new(StateDefinition {
            name: self.name,
            parent: self.parent,
            initial: self.initial,
            entry_actions: self.entry_actions,
            exit_actions: self.exit_actions,
            handlers: self.handlers,
        })
    }
}
