//! Initial-state inference and validation.
//!
//! Every composite node must end up with exactly one initial child so that a
//! transition into it can settle on a leaf. Sibling groups without an explicit
//! marker get one inferred when the choice is unambiguous. Violations are
//! accumulated across the whole tree with `Validation` rather than stopping at
//! the first bad sibling group.

use crate::builder::ConfigurationError;
use crate::core::tree::{NodeId, StateTree};
use std::collections::HashSet;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;

/// A composite state whose initial sub state is missing or contradictory.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InitialStateViolation {
    #[error(
        "Composite state '{parent}' has multiple sub states but none declared as the initial sub state; mark one of: {}",
        .siblings.join(", ")
    )]
    Ambiguous {
        parent: String,
        siblings: Vec<String>,
    },

    #[error(
        "Composite state '{parent}' has no sub state declared as the initial state; mark one of: {}",
        .siblings.join(", ")
    )]
    Missing {
        parent: String,
        siblings: Vec<String>,
    },

    #[error(
        "Composite state '{parent}' has multiple sub states declared as the initial state: {}",
        .conflicting.join(", ")
    )]
    Multiple {
        parent: String,
        conflicting: Vec<String>,
    },
}

/// Outcome of an initial-state pass over the tree.
pub type InitialStateCheck = Validation<(), NonEmptyVec<InitialStateViolation>>;

impl StateTree {
    /// Fill in the initial child of every sibling group that has no marker.
    ///
    /// The root's children and single-child groups take their first member.
    /// Any other unmarked group is ambiguous.
    pub fn infer_initial_states(&mut self) -> InitialStateCheck {
        let mut checks: Vec<InitialStateCheck> = Vec::new();

        for index in 0..self.nodes().len() {
            let node = &self.nodes()[index];
            let children = node.children().to_vec();
            let is_root = node.is_root();
            let parent = node.name().to_owned();

            if children.is_empty() || children.iter().any(|&c| self.node(c).is_initial()) {
                continue;
            }

            if is_root || children.len() == 1 {
                self.mark_initial(children[0]);
                checks.push(Validation::success(()));
            } else {
                checks.push(Validation::fail(InitialStateViolation::Ambiguous {
                    parent,
                    siblings: self.names(&children),
                }));
            }
        }

        Validation::all_vec(checks).map(|_| ())
    }

    /// Check that every composite node has exactly one initial child.
    pub fn validate_initial_states(&self) -> InitialStateCheck {
        self.check_initial_states(&HashSet::new())
    }

    /// Infer missing initial states, then validate the result.
    ///
    /// Violations from both passes are reported together. A group already
    /// reported ambiguous is not reported again as missing.
    pub fn resolve_initial_states(&mut self) -> Result<(), ConfigurationError> {
        let inferred = self.infer_initial_states();
        let ambiguous: HashSet<String> = match &inferred {
            Validation::Failure(errors) => errors
                .iter()
                .filter_map(|violation| match violation {
                    InitialStateViolation::Ambiguous { parent, .. } => Some(parent.clone()),
                    _ => None,
                })
                .collect(),
            Validation::Success(_) => HashSet::new(),
        };
        let validated = self.check_initial_states(&ambiguous);

        match Validation::all_vec(vec![inferred, validated]) {
            Validation::Success(_) => Ok(()),
            Validation::Failure(errors) => Err(into_configuration_error(&errors)),
        }
    }

    fn check_initial_states(&self, ambiguous: &HashSet<String>) -> InitialStateCheck {
        let checks: Vec<InitialStateCheck> = self
            .nodes()
            .iter()
            .filter(|node| node.is_composite())
            .map(|node| {
                let initial: Vec<NodeId> = node
                    .children()
                    .iter()
                    .copied()
                    .filter(|&c| self.node(c).is_initial())
                    .collect();

                match initial.len() {
                    1 => Validation::success(()),
                    0 if ambiguous.contains(node.name()) => Validation::success(()),
                    0 => Validation::fail(InitialStateViolation::Missing {
                        parent: node.name().to_owned(),
                        siblings: self.names(node.children()),
                    }),
                    _ => Validation::fail(InitialStateViolation::Multiple {
                        parent: node.name().to_owned(),
                        conflicting: self.names(&initial),
                    }),
                }
            })
            .collect();

        Validation::all_vec(checks).map(|_| ())
    }

    /// The initial child of `id`, if it is composite.
    pub fn initial_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)
            .children()
            .iter()
            .copied()
            .find(|&c| self.node(c).is_initial())
    }

    /// Descend through initial children until a leaf is reached.
    ///
    /// Returns `id` itself when it is already a leaf.
    pub fn find_innermost_initial_sub_state(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(child) = self.initial_child(current) {
            current = child;
        }
        current
    }
}

fn into_configuration_error(errors: &NonEmptyVec<InitialStateViolation>) -> ConfigurationError {
    ConfigurationError::InitialStates(errors.iter().cloned().collect())
}
