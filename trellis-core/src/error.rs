//! Error types for the reactive runtime and the patch executor.

use thiserror::Error;

use crate::graph::NodeId;
use crate::render::{NodePath, NodeRef};

/// Errors raised by the reactive runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A computed or effect read itself, directly or transitively, before
    /// its evaluation finished. Fatal.
    #[error("cyclic dependency: node {node} re-entered its own evaluation")]
    CyclicDependency { node: NodeId },

    /// A primitive was used after its owning scope was disposed (or after
    /// the runtime was dropped). Recoverable.
    #[error("node {node} was used after it was disposed")]
    DisposedAccess { node: NodeId },

    /// Effects kept invalidating each other past the configured round limit.
    #[error("flush did not settle after {rounds} rounds")]
    RunawayFlush { rounds: usize },
}

impl ReactiveError {
    /// Whether the error must propagate to the caller instead of being
    /// reported as a diagnostic.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::DisposedAccess { .. })
    }
}

/// Raise a fatal reactive error out of an API that cannot return `Result`.
///
/// The payload is the error itself, so the nearest enclosing evaluation
/// frame turns it back into a `Result` for the outermost `try_*` caller.
pub(crate) fn raise(err: ReactiveError) -> ! {
    std::panic::panic_any(err)
}

/// Errors raised when a patch list does not fit the live tree it is applied to.
///
/// Patches produced by `diff(old, new)` always apply cleanly to the tree
/// that was built from `old`; these only occur for mismatched inputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("no live node for {reference}")]
    UnresolvedNode { reference: NodeRef },

    #[error("anchor {anchor} is not a child of {parent}")]
    AnchorNotInParent { anchor: NodeRef, parent: NodeRef },

    #[error("{reference} is not an element")]
    NotAnElement { reference: NodeRef },

    #[error("{reference} is not a text node")]
    NotAText { reference: NodeRef },

    #[error("fragment at {path} cannot be inserted as a single node")]
    UnexpectedFragment { path: NodePath },
}
