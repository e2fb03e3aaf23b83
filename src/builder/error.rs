//! Construction errors for state trees and machines.

use crate::core::InitialStateViolation;
use thiserror::Error;

/// Errors that make a set of state definitions unusable.
///
/// Raised synchronously while building; a machine is never constructed from
/// input that fails here.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Must provide at least one state")]
    Empty,

    #[error("State names must not be empty")]
    InvalidName,

    #[error("State '{name}' is declared more than once")]
    DuplicateState { name: String },

    #[error("State hierarchy is cyclic: {}", .chain.join(" -> "))]
    Cycle { chain: Vec<String> },

    #[error("Invalid initial states: {}", describe(.0))]
    InitialStates(Vec<InitialStateViolation>),

    #[error("Invalid machine configuration: {0}")]
    InvalidConfig(String),
}

fn describe(violations: &[InitialStateViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
