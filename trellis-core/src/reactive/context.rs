//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! Each runtime owns a stack of frames. When entering a reactive context
//! (e.g., running a computed or effect), we push a frame naming the observer
//! and the owner of anything created inside it. When the computation
//! completes, the guard pops it.
//!
//! The stack belongs to the runtime rather than to the thread, so several
//! independent runtimes (one per test, say) never see each other's frames.
//!
//! This design supports nested reactive contexts (e.g., a computed that
//! reads from another computed).

use std::cell::RefCell;

use crate::graph::NodeId;

/// An entry in the reactive context stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Frame {
    /// The computation that registers a dependency on every read.
    /// `None` inside `untrack`.
    pub(crate) observer: Option<NodeId>,
    /// Where newly created nodes and cleanups are attached.
    pub(crate) owner: Option<NodeId>,
}

impl Frame {
    /// Frame for evaluating a computed or effect: it observes and owns.
    pub(crate) fn evaluation(id: NodeId) -> Self {
        Self {
            observer: Some(id),
            owner: Some(id),
        }
    }
}

/// Per-runtime stack of evaluation frames.
#[derive(Debug, Default)]
pub(crate) struct Tracker {
    frames: RefCell<Vec<Frame>>,
}

impl Tracker {
    /// Enter a new frame. It is popped when the returned guard drops, even
    /// if the computation panics.
    pub(crate) fn enter(&self, frame: Frame) -> ReactiveContext<'_> {
        self.frames.borrow_mut().push(frame);
        ReactiveContext {
            tracker: self,
            frame,
        }
    }

    /// Get the current observer, if any.
    pub(crate) fn observer(&self) -> Option<NodeId> {
        self.frames.borrow().last().and_then(|frame| frame.observer)
    }

    /// Get the current owner, if any.
    pub(crate) fn owner(&self) -> Option<NodeId> {
        self.frames.borrow().last().and_then(|frame| frame.owner)
    }

    /// Check if there is an active tracking frame.
    pub(crate) fn is_tracking(&self) -> bool {
        self.observer().is_some()
    }

    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        self.frames.borrow().len()
    }
}

/// Guard that pops the context when dropped.
pub(crate) struct ReactiveContext<'a> {
    tracker: &'a Tracker,
    frame: Frame,
}

impl Drop for ReactiveContext<'_> {
    fn drop(&mut self) {
        let popped = self.tracker.frames.borrow_mut().pop();

        // Verify we're popping the right context.
        debug_assert_eq!(
            popped,
            Some(self.frame),
            "ReactiveContext mismatch: expected {:?}, got {:?}",
            self.frame,
            popped
        );
    }
}
