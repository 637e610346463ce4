//! Graph Nodes
//!
//! This module defines the records that live in the dependency graph arena.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;
use smallvec::SmallVec;

/// Unique identifier for a node in the dependency graph.
///
/// An id is an arena index plus the generation of the slot at the time the
/// node was created. Slots of disposed nodes are reused, but under a new
/// generation, so a stale id always resolves to "disposed" rather than to an
/// unrelated node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub(crate) fn new(index: usize, generation: u32) -> Self {
        Self {
            index: index as u32,
            generation,
        }
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self::new(index, 0)
    }

    /// Get the arena index.
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// How many times the slot was reused before this node took it.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.generation {
            0 => write!(f, "#{}", self.index),
            generation => write!(f, "#{}v{}", self.index, generation),
        }
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A source node (signal). These are the roots of the graph.
    /// They have no dependencies, only dependents.
    Source,

    /// A derived node (computed). These have dependencies and may have
    /// dependents. They cache their computed value.
    Derived,

    /// An effect node. These are leaves of the graph.
    /// They have dependencies but no dependents.
    Effect,

    /// An ownership scope. Scopes take part in no edges; they only own
    /// other nodes and cleanups.
    Scope,
}

/// Dirty state of a node.
///
/// Ordered so that a node is only ever promoted by invalidation
/// (`Clean < Check < Dirty`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DirtyState {
    /// The node's value is up-to-date.
    Clean,

    /// A transitive dependency changed. The node must refresh its computed
    /// dependencies before deciding whether it needs to re-run.
    Check,

    /// A direct dependency changed. The node must re-run.
    Dirty,
}

/// Something the runtime can re-run: a computed derivation or an effect body.
pub(crate) trait Evaluate {
    /// Run the computation. Returns whether the observable value changed.
    fn evaluate(&self) -> bool;
}

pub(crate) type Cleanup = Box<dyn FnOnce()>;

/// A record in the dependency graph arena.
pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) state: DirtyState,

    /// Nodes this node read during its latest evaluation, in read order.
    pub(crate) dependencies: SmallVec<[NodeId; 4]>,

    /// Nodes that read this node. Insertion ordered so notification order is
    /// deterministic.
    pub(crate) dependents: IndexSet<NodeId>,

    /// The scope or computation that created this node.
    pub(crate) owner: Option<NodeId>,

    /// Nodes created while this node was the active owner.
    pub(crate) owned: Vec<NodeId>,

    pub(crate) cleanups: Vec<Cleanup>,
    pub(crate) evaluator: Option<Rc<dyn Evaluate>>,

    /// Set while the node's evaluation frame is on the tracker stack.
    pub(crate) evaluating: bool,
}

impl Node {
    /// Create a new record of the given kind.
    pub(crate) fn new(
        kind: NodeKind,
        owner: Option<NodeId>,
        evaluator: Option<Rc<dyn Evaluate>>,
    ) -> Self {
        Self {
            kind,
            state: match kind {
                NodeKind::Source | NodeKind::Scope => DirtyState::Clean,
                // Start dirty to ensure the first computation
                NodeKind::Derived | NodeKind::Effect => DirtyState::Dirty,
            },
            dependencies: SmallVec::new(),
            dependents: IndexSet::new(),
            owner,
            owned: Vec::new(),
            cleanups: Vec::new(),
            evaluator,
            evaluating: false,
        }
    }

    /// Check if the node needs any processing.
    pub(crate) fn is_clean(&self) -> bool {
        self.state == DirtyState::Clean
    }

    /// Add a dependency (a node that this node reads from).
    pub(crate) fn add_dependency(&mut self, node_id: NodeId) {
        if !self.dependencies.contains(&node_id) {
            self.dependencies.push(node_id);
        }
    }

    /// Remove a dependency.
    pub(crate) fn remove_dependency(&mut self, node_id: NodeId) {
        self.dependencies.retain(|dep| *dep != node_id);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("dependencies", &self.dependencies)
            .field("dependents", &self.dependents)
            .field("owner", &self.owner)
            .field("owned", &self.owned)
            .field("evaluating", &self.evaluating)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_node_starts_clean() {
        let node = Node::new(NodeKind::Source, None, None);
        assert_eq!(node.kind, NodeKind::Source);
        assert!(node.is_clean());
    }

    #[test]
    fn derived_node_starts_dirty() {
        let node = Node::new(NodeKind::Derived, None, None);
        assert_eq!(node.state, DirtyState::Dirty);
    }

    #[test]
    fn dependency_management() {
        let mut node = Node::new(NodeKind::Derived, None, None);
        let dep1 = NodeId::from_index(1);
        let dep2 = NodeId::from_index(2);

        node.add_dependency(dep1);
        node.add_dependency(dep2);
        node.add_dependency(dep1);

        assert_eq!(node.dependencies.as_slice(), &[dep1, dep2]);

        node.remove_dependency(dep1);
        assert_eq!(node.dependencies.as_slice(), &[dep2]);
    }

    #[test]
    fn reused_ids_display_their_generation() {
        assert_eq!(NodeId::from_index(4).to_string(), "#4");
        assert_eq!(NodeId::new(4, 2).to_string(), "#4v2");
        assert_ne!(NodeId::new(4, 2), NodeId::from_index(4));
    }

    #[test]
    fn dirty_states_are_ordered() {
        assert!(DirtyState::Clean < DirtyState::Check);
        assert!(DirtyState::Check < DirtyState::Dirty);
    }
}
