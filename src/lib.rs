//! Nestor: an async hierarchical state machine engine
//!
//! States nest inside one another. Transitions between any two states run the
//! exit actions of every state being left, innermost first, then the entry
//! actions of every state being entered, outermost first. States shared by
//! both branches stay active and see no actions. The machine always settles on
//! a leaf: a composite target resolves to its innermost initial sub-state.
//!
//! # Core Concepts
//!
//! - **StateDefinition**: A state's name, parent and ordered actions, built with
//!   [`StateDefinition::builder`]
//! - **StateTree**: The validated hierarchy with inferred initial states
//! - **StateMachine**: The runtime that owns the active state and consumes
//!   events one at a time
//!
//! # Example
//!
//! ```rust
//! use nestor::{StateDefinition, StateMachine};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let powered_off = StateDefinition::builder("PoweredOff").build();
//! let powered_on = StateDefinition::builder("PoweredOn").build();
//! let idle = StateDefinition::builder("Idle")
//!     .parent(&powered_on)
//!     .initial()
//!     .build();
//! let brewing = StateDefinition::builder("Brewing").parent(&powered_on).build();
//!
//! let machine = StateMachine::builder()
//!     .name("CoffeeMaker")
//!     .initial(powered_off)
//!     .states([powered_on, idle, brewing])
//!     .build()?;
//!
//! machine.start().await?;
//! machine.transition_to("PoweredOn").await?;
//! assert_eq!(machine.state_name().as_deref(), Some("Idle"));
//!
//! machine.stop().await?;
//! assert!(machine.state().is_none());
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod core;
pub mod runtime;

// Re-export commonly used types
pub use builder::{ConfigurationError, MachineBuilder, StateBuilder};
pub use config::MachineConfig;
pub use crate::core::{EventId, StateDefinition};
pub use runtime::{ActionError, Dispatch, MachineError, StateContext, StateInstance, StateMachine};
