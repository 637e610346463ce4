//! Ownership Scopes
//!
//! A scope owns every signal, computed, effect and cleanup created inside
//! [`Scope::run`]. Disposing the scope disposes all of them, children
//! before the scope's own cleanups.
//!
//! Effects and computeds are owners too: whatever they create during a run
//! is disposed before their next run.

use std::fmt;
use std::rc::Weak;

use tracing::warn;

use super::runtime::{Inner, Runtime};
use crate::graph::{NodeId, NodeKind};

/// A disposal boundary for reactive primitives.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::Runtime;
///
/// let rt = Runtime::new();
/// let scope = rt.create_scope();
///
/// let signal = scope.run(|| rt.signal(1));
/// assert!(!signal.is_disposed());
///
/// scope.dispose();
/// assert!(signal.is_disposed());
/// ```
#[derive(Clone)]
pub struct Scope {
    id: NodeId,
    runtime: Weak<Inner>,
}

impl Scope {
    pub(crate) fn new(runtime: &Runtime) -> Self {
        Self {
            id: runtime.create_node(NodeKind::Scope, None),
            runtime: runtime.downgrade(),
        }
    }

    /// Get the scope's node ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Run `f` with this scope as the owner of everything it creates.
    ///
    /// Dependency tracking is unaffected: reads inside `f` still register
    /// with the surrounding observer, if any. On a disposed scope `f` still
    /// runs, but what it creates is owned by nobody.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        match Runtime::upgrade(&self.runtime) {
            Some(runtime) if !runtime.is_disposed(self.id) => runtime.with_owner(self.id, f),
            _ => {
                warn!(scope = %self.id, "run on a disposed scope");
                f()
            }
        }
    }

    /// Dispose the scope and everything it owns, recursively.
    pub fn dispose(&self) {
        if let Some(runtime) = Runtime::upgrade(&self.runtime) {
            runtime.dispose_node(self.id);
        }
    }

    pub fn is_disposed(&self) -> bool {
        Runtime::upgrade(&self.runtime).map_or(true, |runtime| runtime.is_disposed(self.id))
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
