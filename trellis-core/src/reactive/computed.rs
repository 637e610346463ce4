//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Computeds Work
//!
//! 1. On first access, the computed runs its derivation and caches the result.
//!
//! 2. When accessed again, if no dependencies have changed, returns cached value.
//!
//! 3. When a signal it read changes, the computed is marked `Dirty`. When a
//!    computed it read might change, it is marked `Check`.
//!
//! 4. On next access, a `Check` computed refreshes those computeds first. It
//!    only recomputes if one of them actually produced a new value.
//!
//! # Why This Matters
//!
//! This "lazy" approach avoids unnecessary recomputation:
//!
//! - A signal changes
//! - 10 computeds depend on it
//! - Only the computeds actually accessed will recompute
//! - Computeds that are never read stay dirty (no wasted work)
//!
//! # Cycles
//!
//! A derivation that reads its own computed, directly or through other
//! computeds, is a `CyclicDependency`. [`Computed::try_get`] returns it to
//! the outermost reader; [`Computed::get`] panics with it.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};

use tracing::warn;

use super::runtime::{Inner, Runtime};
use crate::error::{raise, ReactiveError};
use crate::graph::{DirtyState, Evaluate, NodeId, NodeKind};

/// The derivation and its cache, shared between the handle and the graph.
struct Memo<T> {
    compute: Box<dyn Fn() -> T>,

    /// The cached value (None if never computed).
    value: RefCell<Option<T>>,

    runs: Cell<usize>,
}

impl<T> Evaluate for Memo<T>
where
    T: PartialEq,
{
    fn evaluate(&self) -> bool {
        let next = (self.compute)();
        self.runs.set(self.runs.get() + 1);
        let mut value = self.value.borrow_mut();
        let changed = value.as_ref() != Some(&next);
        *value = Some(next);
        changed
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value. Must be Clone + PartialEq.
///
/// The PartialEq bound is needed to detect when the computed value actually
/// changed (some computeds return the same value even if inputs changed), in
/// which case downstream readers are left alone.
pub struct Computed<T> {
    id: NodeId,
    memo: Rc<Memo<T>>,
    runtime: Weak<Inner>,
}

impl<T> Computed<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a new computed with the given derivation.
    ///
    /// The derivation is not run immediately. It runs on first access.
    pub(crate) fn new<F>(runtime: &Runtime, compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let memo = Rc::new(Memo {
            compute: Box::new(compute),
            value: RefCell::new(None),
            runs: Cell::new(0),
        });
        let evaluator: Rc<dyn Evaluate> = Rc::clone(&memo) as Rc<dyn Evaluate>;
        Self {
            id: runtime.create_node(NodeKind::Derived, Some(evaluator)),
            memo,
            runtime: runtime.downgrade(),
        }
    }

    /// Get the computed's node ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// This is the main entry point for reading a computed's value.
    ///
    /// # Panics
    ///
    /// Panics with [`ReactiveError::CyclicDependency`] if the derivation
    /// reads this computed while it is being evaluated.
    pub fn get(&self) -> T {
        match self.try_get() {
            Ok(value) => value,
            Err(err) if !err.is_fatal() => {
                warn!(%err, "read of a disposed computed");
                self.detached_value()
            }
            Err(err) => raise(err),
        }
    }

    /// Get the current value, reporting cycles and disposal.
    pub fn try_get(&self) -> Result<T, ReactiveError> {
        let runtime = Runtime::upgrade(&self.runtime)
            .filter(|runtime| !runtime.is_disposed(self.id))
            .ok_or(ReactiveError::DisposedAccess { node: self.id })?;

        runtime.refresh(self.id)?;
        runtime.track(self.id);

        match self.memo.value.borrow().as_ref() {
            Some(value) => Ok(value.clone()),
            None => Err(ReactiveError::DisposedAccess { node: self.id }),
        }
    }

    /// Get the current value without registering a dependency.
    pub fn get_untracked(&self) -> T {
        match Runtime::upgrade(&self.runtime) {
            Some(runtime) => runtime.untrack(|| self.get()),
            None => self.detached_value(),
        }
    }

    /// Check if the next read will have to refresh.
    pub fn is_stale(&self) -> bool {
        Runtime::upgrade(&self.runtime)
            .and_then(|runtime| runtime.state(self.id))
            .map_or(true, |state| state != DirtyState::Clean)
    }

    /// Check if the computed has a cached value.
    pub fn has_value(&self) -> bool {
        self.memo.value.borrow().is_some()
    }

    /// Get the number of dependencies captured by the latest evaluation.
    pub fn dependency_count(&self) -> usize {
        Runtime::upgrade(&self.runtime).map_or(0, |runtime| runtime.dependency_count(self.id))
    }

    /// Number of times the derivation has run.
    pub fn run_count(&self) -> usize {
        self.memo.runs.get()
    }

    /// Value for a computed that is no longer in the graph: the last cached
    /// value, or a one-off evaluation nobody tracks.
    fn detached_value(&self) -> T {
        if let Some(value) = self.memo.value.borrow().as_ref() {
            return value.clone();
        }
        match Runtime::upgrade(&self.runtime) {
            Some(runtime) => runtime.untrack(|| (self.memo.compute)()),
            None => (self.memo.compute)(),
        }
    }
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            memo: Rc::clone(&self.memo),
            runtime: Weak::clone(&self.runtime),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.id)
            .field("cached", &*self.memo.value.borrow())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn counted<T: 'static>(value: impl Fn() -> T + 'static) -> (Rc<Cell<u32>>, impl Fn() -> T) {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        (calls, move || {
            counter.set(counter.get() + 1);
            value()
        })
    }

    #[test]
    fn computed_runs_on_first_access() {
        let rt = Runtime::new();
        let (calls, compute) = counted(|| 42);
        let computed = rt.computed(compute);

        // Not computed yet
        assert!(!computed.has_value());
        assert_eq!(calls.get(), 0);

        // First access triggers computation
        assert_eq!(computed.get(), 42);
        assert_eq!(calls.get(), 1);
        assert!(computed.has_value());
    }

    #[test]
    fn computed_caches_value_when_clean() {
        let rt = Runtime::new();
        let (calls, compute) = counted(|| 42);
        let computed = rt.computed(compute);

        assert_eq!(computed.get(), 42);
        assert_eq!(computed.get(), 42);
        assert_eq!(computed.get(), 42);
        assert_eq!(calls.get(), 1);
        assert!(!computed.is_stale());
    }

    #[test]
    fn write_marks_stale_without_recomputing() {
        let rt = Runtime::new();
        let source = rt.signal(2);
        let reader = source.clone();
        let (calls, compute) = counted(move || reader.get() * 10);
        let computed = rt.computed(compute);

        assert_eq!(computed.get(), 20);
        source.set(3);

        assert!(computed.is_stale());
        assert_eq!(calls.get(), 1);

        assert_eq!(computed.get(), 30);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn stale_edges_are_dropped_on_reevaluation() {
        let rt = Runtime::new();
        let use_left = rt.signal(true);
        let left = rt.signal(1);
        let right = rt.signal(100);

        let (flag, l, r) = (use_left.clone(), left.clone(), right.clone());
        let (calls, compute) = counted(move || if flag.get() { l.get() } else { r.get() });
        let computed = rt.computed(compute);

        assert_eq!(computed.get(), 1);
        use_left.set(false);
        assert_eq!(computed.get(), 100);
        assert_eq!(left.subscriber_count(), 0);

        // No longer read, so no longer invalidates.
        left.set(2);
        assert!(!computed.is_stale());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn direct_self_read_is_a_cycle() {
        let rt = Runtime::new();
        let slot: Rc<RefCell<Option<Computed<i32>>>> = Rc::new(RefCell::new(None));

        let inner = Rc::clone(&slot);
        let computed = rt.computed(move || {
            let me = inner.borrow().clone();
            me.map_or(0, |me| me.get() + 1)
        });
        *slot.borrow_mut() = Some(computed.clone());

        assert_eq!(
            computed.try_get(),
            Err(ReactiveError::CyclicDependency {
                node: computed.id()
            })
        );
    }

    #[test]
    fn detached_value_survives_runtime() {
        let computed = {
            let rt = Runtime::new();
            let computed = rt.computed(|| 5);
            assert_eq!(computed.get(), 5);
            computed
        };

        assert_eq!(computed.get(), 5);
        assert!(computed.is_stale());
    }
}
