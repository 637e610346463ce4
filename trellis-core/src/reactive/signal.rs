//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (computed/effect), the
//!    signal registers that context as a subscriber.
//!
//! 2. When a signal's value changes, all subscribers are invalidated.
//!
//! 3. Invalidated effects re-run once the current batch (if any) completes.
//!
//! # Equality
//!
//! Writing a value equal to the current one is a no-op: no invalidation,
//! no flush. This is why signal values need `PartialEq`.
//!
//! # Disposal
//!
//! A signal whose owning scope was disposed keeps its last value, but reads
//! no longer register dependencies and writes are dropped. Both are reported
//! as `DisposedAccess` diagnostics rather than failures.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};

use tracing::warn;

use super::runtime::{Inner, Runtime};
use crate::error::{raise, ReactiveError};
use crate::graph::{NodeId, NodeKind};

/// A reactive signal holding a value of type T.
///
/// # Type Parameters
///
/// - `T`: The type of value stored in the signal. Must be Clone + PartialEq.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.signal(0);
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T> {
    /// Identifier of this signal's node in the runtime graph.
    id: NodeId,

    /// The current value. Writes replace it whole.
    value: Rc<RefCell<T>>,

    runtime: Weak<Inner>,
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    pub(crate) fn new(runtime: &Runtime, value: T) -> Self {
        Self {
            id: runtime.create_node(NodeKind::Source, None),
            value: Rc::new(RefCell::new(value)),
            runtime: runtime.downgrade(),
        }
    }

    /// Get the signal's node ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Borrow the current value, registering a dependency like [`get`](Self::get).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        match self.live_runtime() {
            Ok(runtime) => runtime.track(self.id),
            Err(err) => warn!(%err, "read of a disposed signal"),
        }
        f(&self.value.borrow())
    }

    /// Get the current value, failing if the signal was disposed.
    pub fn try_get(&self) -> Result<T, ReactiveError> {
        let runtime = self.live_runtime()?;
        runtime.track(self.id);
        Ok(self.value.borrow().clone())
    }

    /// Get the current value without tracking dependencies.
    ///
    /// Use this when you need to read the value without establishing
    /// a reactive dependency.
    pub fn get_untracked(&self) -> T {
        self.value.borrow().clone()
    }

    /// Set a new value and notify subscribers.
    ///
    /// Writes to a disposed signal are dropped with a warning.
    ///
    /// # Panics
    ///
    /// Panics if the flush triggered by this write hits a fatal
    /// [`ReactiveError`]. Use [`Signal::try_set`] to handle it.
    pub fn set(&self, value: T) {
        match self.try_set(value) {
            Ok(()) => {}
            Err(err) if !err.is_fatal() => warn!(%err, "write to a disposed signal"),
            Err(err) => raise(err),
        }
    }

    /// Set a new value, reporting disposal and flush errors.
    pub fn try_set(&self, value: T) -> Result<(), ReactiveError> {
        let runtime = self.live_runtime()?;
        if *self.value.borrow() == value {
            return Ok(());
        }
        *self.value.borrow_mut() = value;
        runtime.notify(self.id)
    }

    /// Update the value using a function.
    ///
    /// This is useful for updates that depend on the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.value.borrow());
        self.set(next);
    }

    /// Dispose the signal on its own, ahead of its owner.
    pub fn dispose(&self) {
        if let Some(runtime) = Runtime::upgrade(&self.runtime) {
            runtime.dispose_node(self.id);
        }
    }

    /// Check if the signal (or its runtime) is gone.
    pub fn is_disposed(&self) -> bool {
        self.live_runtime().is_err()
    }

    /// Get the number of computations currently subscribed.
    pub fn subscriber_count(&self) -> usize {
        Runtime::upgrade(&self.runtime).map_or(0, |runtime| runtime.dependent_count(self.id))
    }

    fn live_runtime(&self) -> Result<Runtime, ReactiveError> {
        Runtime::upgrade(&self.runtime)
            .filter(|runtime| !runtime.is_disposed(self.id))
            .ok_or(ReactiveError::DisposedAccess { node: self.id })
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Rc::clone(&self.value),
            runtime: Weak::clone(&self.runtime),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("value", &*self.value.borrow())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn signal_get_and_set() {
        let rt = Runtime::new();
        let signal = rt.signal(0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let rt = Runtime::new();
        let signal = rt.signal(10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn signal_with_borrows() {
        let rt = Runtime::new();
        let signal = rt.signal(vec![1, 2, 3]);
        assert_eq!(signal.with(|items| items.len()), 3);
    }

    #[test]
    fn equal_writes_do_not_notify() {
        let rt = Runtime::new();
        let signal = rt.signal(1);
        let runs = Rc::new(Cell::new(0));

        let counter = Rc::clone(&runs);
        let reader = signal.clone();
        let _effect = rt.effect(move || {
            reader.get();
            counter.set(counter.get() + 1);
        });

        signal.set(1);
        assert_eq!(runs.get(), 1);

        signal.set(2);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn signal_clone_shares_state() {
        let rt = Runtime::new();
        let signal1 = rt.signal(0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);

        signal2.set(100);
        assert_eq!(signal1.get(), 100);
        assert_eq!(signal1.id(), signal2.id());
    }

    #[test]
    fn signal_ids_are_unique() {
        let rt = Runtime::new();
        let s1 = rt.signal(0);
        let s2 = rt.signal(0);
        let s3 = rt.signal(0);

        assert_ne!(s1.id(), s2.id());
        assert_ne!(s2.id(), s3.id());
        assert_ne!(s1.id(), s3.id());
    }

    #[test]
    fn disposed_signal_keeps_last_value() {
        let rt = Runtime::new();
        let signal = rt.signal("ready");
        signal.dispose();

        assert!(signal.is_disposed());
        assert_eq!(signal.get(), "ready");
        signal.set("ignored");
        assert_eq!(signal.get_untracked(), "ready");
        assert_eq!(
            signal.try_set("ignored"),
            Err(ReactiveError::DisposedAccess { node: signal.id() })
        );
        assert_eq!(
            signal.try_get(),
            Err(ReactiveError::DisposedAccess { node: signal.id() })
        );
    }

    #[test]
    fn dropped_runtime_disposes_handles() {
        let signal = {
            let rt = Runtime::new();
            rt.signal(7)
        };

        assert!(signal.is_disposed());
        assert_eq!(signal.get(), 7);
        assert_eq!(signal.subscriber_count(), 0);
    }
}
