//! Arena-backed tree of nested states.
//!
//! The tree is built once from a set of [`StateDefinition`]s and never changes
//! shape afterwards. Nodes live in a flat `Vec` and refer to each other by
//! [`NodeId`]; a node's parent is a lookup index, never an owner. Every node
//! caches its root-first ancestor chain so that transition planning is
//! O(depth).

use crate::builder::ConfigurationError;
use crate::core::definition::StateDefinition;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Display name of the implicit root node.
pub const ROOT_NAME: &str = "[*]";

/// Index of a node inside a [`StateTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// The implicit root every tree starts with.
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// A state's position in the tree.
#[derive(Clone, Debug)]
pub struct StateNode {
    id: NodeId,
    definition: Option<Arc<StateDefinition>>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    ancestors: Vec<NodeId>,
    pub(crate) initial: bool,
}

impl StateNode {
    fn root() -> Self {
        Self {
            id: NodeId::ROOT,
            definition: None,
            parent: None,
            children: Vec::new(),
            ancestors: Vec::new(),
            initial: true,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.definition
            .as_deref()
            .map_or(ROOT_NAME, StateDefinition::name)
    }

    /// The wrapped definition. `None` only for the implicit root.
    pub fn definition(&self) -> Option<&Arc<StateDefinition>> {
        self.definition.as_ref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Sub states in declaration order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Root-first chain from the implicit root down to this node's parent.
    pub fn ancestors(&self) -> &[NodeId] {
        &self.ancestors
    }

    /// Root-first chain ending with this node.
    pub fn path(&self) -> Vec<NodeId> {
        let mut path = Vec::with_capacity(self.ancestors.len() + 1);
        path.extend_from_slice(&self.ancestors);
        path.push(self.id);
        path
    }

    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    pub fn is_root(&self) -> bool {
        self.id == NodeId::ROOT
    }

    pub fn is_composite(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn is_simple(&self) -> bool {
        self.children.is_empty()
    }

    /// Whether this node is the initial state among its siblings.
    pub fn is_initial(&self) -> bool {
        self.initial
    }
}

/// Owner of every node of a state hierarchy.
///
/// # Example
///
/// ```rust
/// use nestor::core::{NodeId, StateTree};
/// use nestor::StateDefinition;
///
/// let a = StateDefinition::builder("A").build();
/// let b = StateDefinition::builder("B").parent(&a).build();
///
/// // Only the leaf is listed; its parent is inserted on the way down.
/// let tree = StateTree::from_definitions(vec![b]).unwrap();
///
/// let a_id = tree.find("A").unwrap();
/// let b_id = tree.find("B").unwrap();
/// assert_eq!(tree.node(b_id).ancestors(), &[NodeId::ROOT, a_id]);
/// assert_eq!(tree.len(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct StateTree {
    nodes: Vec<StateNode>,
    index: HashMap<String, NodeId>,
}

impl StateTree {
    /// Build the structure of the tree from the given definitions.
    ///
    /// Ancestors reachable through parent references are inserted even when
    /// they are not listed. Initial states are not inferred here, see
    /// [`StateTree::resolve_initial_states`].
    pub fn from_definitions<I>(definitions: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = Arc<StateDefinition>>,
    {
        let mut tree = Self {
            nodes: vec![StateNode::root()],
            index: HashMap::new(),
        };
        let mut listed = HashSet::new();

        for definition in definitions {
            if !listed.insert(definition.name().to_owned()) {
                return Err(ConfigurationError::DuplicateState {
                    name: definition.name().to_owned(),
                });
            }
            tree.insert(&definition)?;
        }

        if listed.is_empty() {
            return Err(ConfigurationError::Empty);
        }

        Ok(tree)
    }

    fn insert(&mut self, definition: &Arc<StateDefinition>) -> Result<NodeId, ConfigurationError> {
        let mut parent = NodeId::ROOT;

        for ancestor in lineage(definition)? {
            if let Some(&existing) = self.index.get(ancestor.name()) {
                let same = self.nodes[existing.0]
                    .definition
                    .as_ref()
                    .is_some_and(|d| Arc::ptr_eq(d, &ancestor));
                if !same {
                    return Err(ConfigurationError::DuplicateState {
                        name: ancestor.name().to_owned(),
                    });
                }
                parent = existing;
                continue;
            }

            let id = NodeId(self.nodes.len());
            let ancestors = self.nodes[parent.0].path();
            self.nodes.push(StateNode {
                id,
                initial: ancestor.is_initial(),
                definition: Some(Arc::clone(&ancestor)),
                parent: Some(parent),
                children: Vec::new(),
                ancestors,
            });
            self.nodes[parent.0].children.push(id);
            self.index.insert(ancestor.name().to_owned(), id);
            parent = id;
        }

        Ok(parent)
    }

    pub fn root(&self) -> &StateNode {
        &self.nodes[NodeId::ROOT.0]
    }

    /// Look up a node by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this tree.
    pub fn node(&self, id: NodeId) -> &StateNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&StateNode> {
        self.nodes.get(id.0)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut StateNode {
        &mut self.nodes[id.0]
    }

    /// Find a state by name. The implicit root is never found.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn name(&self, id: NodeId) -> &str {
        self.nodes[id.0].name()
    }

    /// Names of the given nodes, in the given order.
    pub fn names(&self, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|&id| self.name(id).to_owned()).collect()
    }

    /// Number of states, not counting the implicit root.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every node including the implicit root, in insertion order.
    pub fn nodes(&self) -> &[StateNode] {
        &self.nodes
    }

    /// Every state node, excluding the implicit root.
    pub fn states(&self) -> impl Iterator<Item = &StateNode> {
        self.nodes.iter().skip(1)
    }

    /// Mark a node as the initial state among its siblings.
    pub(crate) fn mark_initial(&mut self, id: NodeId) {
        self.node_mut(id).initial = true;
    }
}

/// Root-first chain of definitions ending with `definition`.
fn lineage(
    definition: &Arc<StateDefinition>,
) -> Result<Vec<Arc<StateDefinition>>, ConfigurationError> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut current = Some(Arc::clone(definition));

    while let Some(state) = current {
        if state.name().is_empty() {
            return Err(ConfigurationError::InvalidName);
        }
        if !seen.insert(state.name().to_owned()) {
            let mut cycle: Vec<String> = chain
                .iter()
                .map(|d: &Arc<StateDefinition>| d.name().to_owned())
                .collect();
            cycle.push(state.name().to_owned());
            cycle.reverse();
            return Err(ConfigurationError::Cycle { chain: cycle });
        }
        current = state.parent().cloned();
        chain.push(state);
    }

    chain.reverse();
    Ok(chain)
}
