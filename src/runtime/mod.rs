//! Runtime: lifecycle, event queue and state instances.

pub mod error;
pub mod instance;
pub mod machine;
pub(crate) mod queue;

pub use error::{ActionError, MachineError, Result};
pub use instance::{StateContext, StateInstance};
pub use machine::{Dispatch, StateMachine};
