//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect is queued. It re-runs when
//!    the queue flushes: right after the write, or after the outermost
//!    batch completes. However many times it was queued, it runs once per
//!    flush and sees only the final values.
//!
//! 3. Before re-running, the effect clears its old dependencies, disposes
//!    whatever it created during its previous run and runs its cleanups.
//!
//! # Differences from Computed
//!
//! - Computeds return a value; effects do not.
//! - Computeds are lazy (compute on access); effects are eager (run when deps change).
//! - Computeds cache results; effects just run their side effect.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::runtime::{Inner, Runtime};
use crate::error::ReactiveError;
use crate::graph::{Evaluate, NodeId, NodeKind};

struct EffectFn {
    run: RefCell<Box<dyn FnMut()>>,
    runs: Rc<Cell<usize>>,
}

impl Evaluate for EffectFn {
    fn evaluate(&self) -> bool {
        (self.run.borrow_mut())();
        self.runs.set(self.runs.get() + 1);
        true
    }
}

/// Handle to a side-effecting computation that runs when dependencies change.
///
/// Dropping the handle does not stop the effect; it lives until
/// [`dispose`](Effect::dispose) is called or its owner is disposed.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use trellis_core::reactive::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.signal(0);
/// let seen = Rc::new(Cell::new(-1));
///
/// let (reader, sink) = (count.clone(), Rc::clone(&seen));
/// let effect = rt.effect(move || sink.set(reader.get()));
///
/// count.set(5);
/// assert_eq!(seen.get(), 5);
///
/// effect.dispose();
/// count.set(6);
/// assert_eq!(seen.get(), 5);
/// ```
#[derive(Clone)]
pub struct Effect {
    id: NodeId,
    runtime: Weak<Inner>,
    runs: Rc<Cell<usize>>,
}

impl Effect {
    /// Create the effect and run it once, inside a batch so writes made by
    /// the first run cannot re-enter it.
    ///
    /// If the first run (or the flush it triggers) fails, the effect is
    /// disposed and the error returned.
    pub(crate) fn new<F>(runtime: &Runtime, run: F) -> Result<Self, ReactiveError>
    where
        F: FnMut() + 'static,
    {
        let runs = Rc::new(Cell::new(0));
        let evaluator: Rc<dyn Evaluate> = Rc::new(EffectFn {
            run: RefCell::new(Box::new(run)),
            runs: Rc::clone(&runs),
        });
        let id = runtime.create_node(NodeKind::Effect, Some(evaluator));
        let effect = Self {
            id,
            runtime: runtime.downgrade(),
            runs,
        };

        if let Err(err) = runtime.try_batch(|| runtime.refresh(id)).and_then(|run| run) {
            runtime.dispose_node(id);
            return Err(err);
        }

        Ok(effect)
    }

    /// Get the effect's node ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Dispose of the effect.
    ///
    /// Severs its dependency edges, disposes what it owns and runs its
    /// cleanups. After disposal, the effect will not run again, even if it
    /// is still sitting in the queue.
    pub fn dispose(&self) {
        if let Some(runtime) = Runtime::upgrade(&self.runtime) {
            runtime.dispose_node(self.id);
        }
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        Runtime::upgrade(&self.runtime).map_or(true, |runtime| runtime.is_disposed(self.id))
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.runs.get()
    }

    /// Get the number of dependencies.
    pub fn dependency_count(&self) -> usize {
        Runtime::upgrade(&self.runtime).map_or(0, |runtime| runtime.dependency_count(self.id))
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
