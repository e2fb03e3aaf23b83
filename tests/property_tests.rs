//! Property-based tests for the state tree and transition planning.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated state hierarchies.

use nestor::core::{plan_transition, transition_path, NodeId, StateTree, ROOT_NAME};
use nestor::{StateDefinition, StateMachine};
use proptest::prelude::*;
use proptest::sample::Index;
use std::sync::Arc;

prop_compose! {
    /// Parent index for each state; a state can only nest inside an earlier one.
    fn arbitrary_forest()(
        slots in prop::collection::vec(prop::option::of(any::<Index>()), 1..16)
    ) -> Vec<Option<usize>> {
        slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| if i == 0 { None } else { slot.map(|idx| idx.index(i)) })
            .collect()
    }
}

/// Build definitions for a forest. The first child of every group is marked
/// initial so the resulting tree always validates.
fn definitions(parents: &[Option<usize>]) -> Vec<Arc<StateDefinition>> {
    let mut defs: Vec<Arc<StateDefinition>> = Vec::with_capacity(parents.len());
    let mut group_has_initial = vec![false; parents.len()];
    let mut root_has_initial = false;

    for (i, parent) in parents.iter().enumerate() {
        let mut builder = StateDefinition::builder(format!("S{i}"));
        let claimed = match parent {
            Some(p) => std::mem::replace(&mut group_has_initial[*p], true),
            None => std::mem::replace(&mut root_has_initial, true),
        };
        if let Some(p) = parent {
            builder = builder.parent(&defs[*p]);
        }
        if !claimed {
            builder = builder.initial();
        }
        defs.push(builder.build());
    }

    defs
}

fn tree(parents: &[Option<usize>]) -> StateTree {
    let mut tree = StateTree::from_definitions(definitions(parents)).unwrap();
    tree.resolve_initial_states().unwrap();
    tree
}

/// Root-first chain of names computed from the definitions alone.
fn name_chain(parents: &[Option<usize>], index: usize) -> Vec<String> {
    let mut chain = vec![format!("S{index}")];
    let mut current = parents[index];
    while let Some(p) = current {
        chain.push(format!("S{p}"));
        current = parents[p];
    }
    chain.reverse();
    chain
}

fn node(tree: &StateTree, index: usize) -> NodeId {
    tree.find(&format!("S{index}")).unwrap()
}

proptest! {
    #[test]
    fn ancestors_match_walked_parent_chain(parents in arbitrary_forest()) {
        let tree = tree(&parents);

        for state in tree.states() {
            let mut walked = Vec::new();
            let mut current = state.parent();
            while let Some(id) = current {
                walked.push(id);
                current = tree.node(id).parent();
            }
            walked.reverse();

            prop_assert_eq!(state.ancestors(), walked.as_slice());
            prop_assert_eq!(walked.first().copied(), Some(NodeId::ROOT));
        }
    }

    #[test]
    fn tree_contains_every_definition(parents in arbitrary_forest()) {
        let tree = tree(&parents);

        prop_assert_eq!(tree.len(), parents.len());
        for i in 0..parents.len() {
            let chain: Vec<String> = tree.node(node(&tree, i))
                .path()
                .into_iter()
                .skip(1)
                .map(|id| tree.name(id).to_owned())
                .collect();
            prop_assert_eq!(chain, name_chain(&parents, i));
        }
    }

    #[test]
    fn exit_and_entry_follow_common_prefix(
        parents in arbitrary_forest(),
        from in any::<Index>(),
        to in any::<Index>(),
    ) {
        let tree = tree(&parents);
        let (from, to) = (from.index(parents.len()), to.index(parents.len()));
        let plan = transition_path(&tree, Some(node(&tree, from)), node(&tree, to));

        let source = name_chain(&parents, from);
        let destination = name_chain(&parents, to);
        let shared = source
            .iter()
            .zip(&destination)
            .take_while(|(s, d)| s == d)
            .count();

        let expected_exit: Vec<String> = source[shared..].iter().rev().cloned().collect();
        let expected_entry: Vec<String> = destination[shared..].to_vec();

        prop_assert_eq!(tree.names(&plan.exit), expected_exit);
        prop_assert_eq!(tree.names(&plan.entry), expected_entry);
        prop_assert!(!plan.exit.contains(&NodeId::ROOT));
        prop_assert!(!plan.entry.contains(&NodeId::ROOT));
    }

    #[test]
    fn self_transition_is_noop(parents in arbitrary_forest(), at in any::<Index>()) {
        let tree = tree(&parents);
        let id = node(&tree, at.index(parents.len()));

        let plan = transition_path(&tree, Some(id), id);

        prop_assert!(plan.is_noop());
        prop_assert!(plan.exit.is_empty());
        prop_assert!(plan.entry.is_empty());
    }

    #[test]
    fn planned_destination_is_always_a_leaf(
        parents in arbitrary_forest(),
        to in any::<Index>(),
    ) {
        let tree = tree(&parents);
        let requested = node(&tree, to.index(parents.len()));

        let plan = plan_transition(&tree, None, requested);

        prop_assert!(tree.node(plan.destination).is_simple());
        prop_assert!(tree.node(plan.destination).ancestors().contains(&requested)
            || plan.destination == requested);
        prop_assert_eq!(plan.entry.last().copied(), Some(plan.destination));
        prop_assert_ne!(tree.name(plan.entry[0]), ROOT_NAME);
    }

    #[test]
    fn machine_starts_on_a_leaf(parents in arbitrary_forest()) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let machine = StateMachine::builder()
            .states(definitions(&parents))
            .build()
            .unwrap();

        runtime.block_on(machine.start()).unwrap();

        let active = machine.state().unwrap();
        prop_assert!(machine.tree().node(active.node()).is_simple());
        prop_assert_eq!(machine.history().len(), 1);
    }
}
