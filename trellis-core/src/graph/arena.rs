//! Node Arena
//!
//! The arena owns every node record of one runtime and all edges between
//! them. Edges are stored twice (dependencies on the reader, dependents on
//! the source) so invalidation can walk forward and re-evaluation can sever
//! backward in O(edges).
//!
//! # Invalidation
//!
//! Writing a source marks its direct dependents `Dirty` and everything
//! further downstream `Check`, depth-first. Nothing is recomputed here:
//! derived nodes refresh lazily when read, effects land in the
//! [`BatchQueue`] and refresh when it flushes.

use std::mem;
use std::rc::Rc;

use tracing::trace;

use super::node::{Cleanup, DirtyState, Evaluate, Node, NodeId, NodeKind};
use super::queue::BatchQueue;

/// Everything a node held at the time it was disposed.
///
/// Returned to the runtime so owned children and cleanups can run without a
/// borrow of the arena.
pub(crate) struct Detached {
    pub(crate) owned: Vec<NodeId>,
    pub(crate) cleanups: Vec<Cleanup>,
    pub(crate) evaluator: Option<Rc<dyn Evaluate>>,
}

/// One slot of the arena. A disposed node's slot is emptied and its index
/// handed to the next insert under a new generation.
#[derive(Debug, Default)]
struct Entry {
    generation: u32,
    node: Option<Node>,
}

/// Arena of reactive node records, indexed by [`NodeId`].
#[derive(Debug, Default)]
pub(crate) struct Graph {
    entries: Vec<Entry>,
    free: Vec<usize>,
}

impl Graph {
    /// Add a node to the arena, registering it with its owner.
    pub(crate) fn insert(&mut self, node: Node) -> NodeId {
        let owner = node.owner;
        let id = match self.free.pop() {
            Some(index) => {
                let entry = &mut self.entries[index];
                entry.generation = entry.generation.wrapping_add(1);
                entry.node = Some(node);
                NodeId::new(index, entry.generation)
            }
            None => {
                self.entries.push(Entry {
                    generation: 0,
                    node: Some(node),
                });
                NodeId::new(self.entries.len() - 1, 0)
            }
        };

        if let Some(owner) = owner.and_then(|owner| self.live_mut(owner)) {
            owner.owned.push(id);
        }

        id
    }

    /// Get a node that has not been disposed.
    pub(crate) fn live(&self, id: NodeId) -> Option<&Node> {
        self.entries
            .get(id.index())
            .filter(|entry| entry.generation == id.generation())
            .and_then(|entry| entry.node.as_ref())
    }

    pub(crate) fn live_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.entries
            .get_mut(id.index())
            .filter(|entry| entry.generation == id.generation())
            .and_then(|entry| entry.node.as_mut())
    }

    pub(crate) fn is_disposed(&self, id: NodeId) -> bool {
        self.live(id).is_none()
    }

    pub(crate) fn state(&self, id: NodeId) -> Option<DirtyState> {
        self.live(id).map(|node| node.state)
    }

    pub(crate) fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.live(id).map(|node| node.kind)
    }

    pub(crate) fn set_state(&mut self, id: NodeId, state: DirtyState) {
        if let Some(node) = self.live_mut(id) {
            node.state = state;
        }
    }

    /// Record that `reader` read `source` during its current evaluation.
    pub(crate) fn link(&mut self, source: NodeId, reader: NodeId) {
        if source == reader || self.is_disposed(source) {
            return;
        }
        let Some(reader_node) = self.live_mut(reader) else {
            return;
        };
        reader_node.add_dependency(source);

        if let Some(source_node) = self.live_mut(source) {
            source_node.dependents.insert(reader);
        }
    }

    /// Drop every edge from `reader` to the nodes it read last time.
    ///
    /// Must run before a fresh evaluation so nodes that are no longer read
    /// stop notifying the reader.
    pub(crate) fn sever_dependencies(&mut self, reader: NodeId) {
        let Some(node) = self.live_mut(reader) else {
            return;
        };
        let dependencies = mem::take(&mut node.dependencies);
        for source in dependencies {
            if let Some(source_node) = self.live_mut(source) {
                source_node.dependents.shift_remove(&reader);
            }
        }
    }

    /// Invalidate everything downstream of a written source.
    pub(crate) fn mark_dependents(&mut self, source: NodeId, queue: &mut BatchQueue) {
        let Some(node) = self.live(source) else {
            return;
        };
        let dependents: Vec<NodeId> = node.dependents.iter().copied().collect();
        for dependent in dependents {
            self.mark(dependent, DirtyState::Dirty, queue);
        }
    }

    /// Promote a node to `state`, depth-first through its dependents.
    fn mark(&mut self, id: NodeId, state: DirtyState, queue: &mut BatchQueue) {
        let Some(node) = self.live_mut(id) else {
            return;
        };
        if node.state >= state {
            return;
        }

        let was_clean = node.is_clean();
        node.state = state;
        if !was_clean {
            // Dependents were already checked the first time around.
            return;
        }

        if node.kind == NodeKind::Effect && queue.push(id) {
            trace!(node = %id, "effect queued");
        }

        let dependents: Vec<NodeId> = node.dependents.iter().copied().collect();
        for dependent in dependents {
            self.mark(dependent, DirtyState::Check, queue);
        }
    }

    /// A derived node produced a new value: dependents waiting on a check
    /// must now re-run.
    pub(crate) fn promote_dependents(&mut self, id: NodeId) {
        let Some(node) = self.live(id) else {
            return;
        };
        let dependents: Vec<NodeId> = node.dependents.iter().copied().collect();
        for dependent in dependents {
            if let Some(node) = self.live_mut(dependent) {
                if node.state == DirtyState::Check {
                    node.state = DirtyState::Dirty;
                }
            }
        }
    }

    /// Take the owned nodes and cleanups of a node about to re-run.
    pub(crate) fn take_owned(&mut self, id: NodeId) -> (Vec<NodeId>, Vec<Cleanup>) {
        match self.live_mut(id) {
            Some(node) => (mem::take(&mut node.owned), mem::take(&mut node.cleanups)),
            None => (Vec::new(), Vec::new()),
        }
    }

    /// Register a cleanup with a live owner. Gives the cleanup back if the
    /// owner is gone.
    pub(crate) fn add_cleanup(&mut self, owner: NodeId, cleanup: Cleanup) -> Result<(), Cleanup> {
        match self.live_mut(owner) {
            Some(node) => {
                node.cleanups.push(cleanup);
                Ok(())
            }
            None => Err(cleanup),
        }
    }

    /// Remove a node from the graph and free its slot.
    ///
    /// Removes all edges involving this node and detaches it from its owner.
    /// Returns `None` if the node was already disposed.
    pub(crate) fn detach(&mut self, id: NodeId) -> Option<Detached> {
        let node = self.live_mut(id)?;
        let owner = node.owner.take();
        let owned = mem::take(&mut node.owned);
        let cleanups = mem::take(&mut node.cleanups);
        let evaluator = node.evaluator.take();
        let dependents = mem::take(&mut node.dependents);

        self.sever_dependencies(id);
        for dependent in dependents {
            if let Some(dependent_node) = self.live_mut(dependent) {
                dependent_node.remove_dependency(id);
            }
        }

        if let Some(owner_node) = owner.and_then(|owner| self.live_mut(owner)) {
            owner_node.owned.retain(|child| *child != id);
        }

        if let Some(entry) = self.entries.get_mut(id.index()) {
            entry.node = None;
            self.free.push(id.index());
        }

        Some(Detached {
            owned,
            cleanups,
            evaluator,
        })
    }

    /// Number of nodes that have not been disposed.
    pub(crate) fn live_count(&self) -> usize {
        self.entries.len() - self.free.len()
    }

    /// Number of slots ever allocated, live or free.
    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.entries.len()
    }
}
