//! Batching Queue
//!
//! Collects effects invalidated during a synchronous block so they run once
//! per flush. The queue is an insertion-ordered set: the first enqueue fixes
//! an effect's position, later enqueues of the same effect are dropped.
//!
//! Flushing drains the queue in rounds. Effects invalidated while a round
//! runs are collected into the next round rather than being run
//! re-entrantly.

use indexmap::IndexSet;

use super::node::NodeId;

/// Pending effects, deduplicated by identity.
#[derive(Debug, Default)]
pub(crate) struct BatchQueue {
    pending: IndexSet<NodeId>,
}

impl BatchQueue {
    /// Enqueue an effect. Returns `false` if it was already pending.
    pub(crate) fn push(&mut self, id: NodeId) -> bool {
        self.pending.insert(id)
    }

    /// Take every pending effect, in insertion order, leaving the queue
    /// empty for the next round.
    pub(crate) fn take_round(&mut self) -> IndexSet<NodeId> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedups_by_identity() {
        let mut queue = BatchQueue::default();
        let a = NodeId::from_index(3);
        let b = NodeId::from_index(1);

        assert!(queue.push(a));
        assert!(queue.push(b));
        assert!(!queue.push(a));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn rounds_keep_insertion_order() {
        let mut queue = BatchQueue::default();
        let ids: Vec<NodeId> = [5, 2, 9].into_iter().map(NodeId::from_index).collect();
        for id in &ids {
            queue.push(*id);
        }

        let round: Vec<NodeId> = queue.take_round().into_iter().collect();
        assert_eq!(round, ids);
        assert!(queue.is_empty());
    }
}
