//! Core state hierarchy types and logic.
//!
//! This module contains the structural half of the machine:
//! - State definitions and the action types attached to them
//! - The arena-backed state tree
//! - Initial-state inference and validation
//! - Least-common-ancestor transition planning
//! - Bounded transition history
//!
//! Nothing here runs actions or touches the event queue; that is the
//! runtime's job.

mod definition;
mod history;
mod initial;
mod transition;
mod tree;

pub use definition::{Action, ActionFuture, EventHandler, EventId, HandlerFuture, StateDefinition};
pub use history::{TransitionHistory, TransitionRecord, DEFAULT_HISTORY_LIMIT};
pub use initial::{InitialStateCheck, InitialStateViolation};
pub use transition::{plan_transition, transition_path, TransitionPlan};
pub use tree::{NodeId, StateNode, StateTree, ROOT_NAME};
