//! Runtime errors.

use thiserror::Error;

/// Errors returned by state machine operations.
///
/// Rejections (`AlreadyStarted`, `AlreadyRunning`, `TransitionInProgress`,
/// `UnknownState`, `InvalidOperation`) leave the machine exactly as it was.
#[derive(Debug, Error)]
pub enum MachineError {
    #[error("State machine already started")]
    AlreadyStarted,

    #[error("State machine is already running and must be stopped before running again")]
    AlreadyRunning,

    #[error("Cannot transition while a transition is already in progress")]
    TransitionInProgress,

    #[error("State '{name}' is not known to this state machine")]
    UnknownState { name: String },

    #[error("Invalid operation: {reason}")]
    InvalidOperation { reason: String },

    #[error("Event queue is full")]
    QueueFull,

    #[error("Event queue is closed")]
    QueueClosed,

    #[error("State instance is no longer attached to a state machine")]
    Detached,

    #[error("Action of state '{state}' failed: {source}")]
    Action {
        state: String,
        #[source]
        source: Box<ActionError>,
    },
}

/// Error returned by user-supplied entry, exit and event actions.
///
/// Machine errors convert into it, so actions can use `?` on context calls.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Machine(#[from] MachineError),

    #[error("{0}")]
    Failed(String),
}

impl ActionError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

pub type Result<T, E = MachineError> = std::result::Result<T, E>;
