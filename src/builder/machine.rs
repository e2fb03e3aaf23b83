//! Builder for constructing state machines.

use crate::builder::error::ConfigurationError;
use crate::config::MachineConfig;
use crate::core::{StateDefinition, StateTree};
use crate::runtime::StateMachine;
use std::sync::Arc;

/// Builder for constructing state machines with a fluent API.
///
/// # Example
///
/// ```rust
/// use nestor::{StateDefinition, StateMachine};
///
/// let powered_off = StateDefinition::builder("PoweredOff").build();
/// let powered_on = StateDefinition::builder("PoweredOn").build();
/// let idle = StateDefinition::builder("Idle").parent(&powered_on).build();
///
/// let machine = StateMachine::builder()
///     .name("CoffeeMaker")
///     .initial(powered_off)
///     .states([powered_on, idle])
///     .build()
///     .unwrap();
///
/// assert_eq!(machine.name(), "CoffeeMaker");
/// assert!(machine.state().is_none());
/// ```
#[derive(Default)]
pub struct MachineBuilder {
    config: MachineConfig,
    states: Vec<Arc<StateDefinition>>,
    initial: Vec<String>,
}

impl MachineBuilder {
    /// Create a builder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: MachineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the machine name used in log records.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Bound the event queue. `0` keeps it unbounded.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Set how many transitions the history keeps.
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.config.history_limit = limit;
        self
    }

    /// Add a state definition.
    pub fn state(mut self, state: Arc<StateDefinition>) -> Self {
        self.states.push(state);
        self
    }

    /// Add several state definitions, keeping their order.
    pub fn states<I>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = Arc<StateDefinition>>,
    {
        self.states.extend(states);
        self
    }

    /// Add a state definition and mark it initial among its siblings,
    /// regardless of its own marker.
    pub fn initial(mut self, state: Arc<StateDefinition>) -> Self {
        self.initial.push(state.name().to_owned());
        self.states.push(state);
        self
    }

    /// Build the tree, resolve initial states and create the machine.
    pub fn build(self) -> Result<StateMachine, ConfigurationError> {
        let mut tree = StateTree::from_definitions(self.states)?;

        for name in &self.initial {
            if let Some(id) = tree.find(name) {
                tree.mark_initial(id);
            }
        }
        tree.resolve_initial_states()?;

        Ok(StateMachine::new(tree, self.config))
    }
}
