//! Builder API for registering states and constructing machines.
//!
//! This module is the registration side of the crate: `StateBuilder` attaches
//! ordered entry, exit and event actions to a state, and `MachineBuilder`
//! assembles definitions into a validated machine.

pub mod error;
pub mod machine;
pub mod state;

pub use error::ConfigurationError;
pub use machine::MachineBuilder;
pub use state::StateBuilder;
