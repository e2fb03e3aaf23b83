//! Least-common-ancestor transition planning.
//!
//! Planning is pure: it reads the tree and returns the ordered lists of states
//! to exit and enter. Running the hooks is the runtime's job.

use crate::core::tree::{NodeId, StateTree};

/// Ordered exit and entry sets for moving from one leaf to another.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionPlan {
    /// Active leaf before the transition, `None` for the first one.
    pub source: Option<NodeId>,
    /// Leaf the machine settles on.
    pub destination: NodeId,
    /// States to exit, innermost first.
    pub exit: Vec<NodeId>,
    /// States to enter, outermost first.
    pub entry: Vec<NodeId>,
}

impl TransitionPlan {
    /// True when the destination is already the active leaf.
    pub fn is_noop(&self) -> bool {
        self.source == Some(self.destination)
    }
}

/// Plan a transition to `requested`, resolving a composite target to its
/// innermost initial leaf first.
pub fn plan_transition(
    tree: &StateTree,
    source: Option<NodeId>,
    requested: NodeId,
) -> TransitionPlan {
    let destination = tree.find_innermost_initial_sub_state(requested);
    transition_path(tree, source, destination)
}

/// Compute exit and entry sets between `source` and `destination` as given.
///
/// Both chains are compared by node identity. The implicit root is a common
/// ancestor of everything and is never exited or entered.
pub fn transition_path(
    tree: &StateTree,
    source: Option<NodeId>,
    destination: NodeId,
) -> TransitionPlan {
    let destination_path = tree.node(destination).path();

    let Some(source_id) = source else {
        return TransitionPlan {
            source: None,
            destination,
            exit: Vec::new(),
            entry: destination_path.into_iter().skip(1).collect(),
        };
    };

    let source_path = tree.node(source_id).path();
    let shared = common_prefix_len(&source_path, &destination_path);

    TransitionPlan {
        source,
        destination,
        exit: source_path[shared..].iter().rev().copied().collect(),
        entry: destination_path[shared..].to_vec(),
    }
}

fn common_prefix_len(left: &[NodeId], right: &[NodeId]) -> usize {
    left.iter()
        .zip(right)
        .take_while(|(l, r)| l == r)
        .count()
}
