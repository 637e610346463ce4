//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, computeds,
//! and effects. It manages the dependency graph and schedules updates when
//! signals change.
//!
//! # How It Works
//!
//! 1. When a signal is created, it registers a node in the runtime's arena.
//!
//! 2. When a computed or effect reads a signal, the runtime records the
//!    dependency against the innermost tracking frame.
//!
//! 3. When a signal's value changes, the runtime:
//!    a. Marks direct dependents dirty and transitive ones for checking
//!    b. Queues every invalidated effect
//!    c. Flushes the queue, unless a batch or a flush is already running
//!    d. Computeds are lazy - they recompute on next access
//!
//! # Explicit Context
//!
//! There is no global runtime. Every primitive is created from a [`Runtime`]
//! value and keeps a weak reference back to it, so independent runtimes
//! never share tracking state and dropping a runtime turns every handle it
//! issued into a disposed handle.

use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::{debug, trace};

use super::computed::Computed;
use super::context::{Frame, Tracker};
use super::effect::Effect;
use super::scope::Scope;
use super::signal::Signal;
use crate::config::RuntimeOptions;
use crate::error::{raise, ReactiveError};
use crate::graph::{BatchQueue, DirtyState, Evaluate, Graph, Node, NodeId, NodeKind};

/// Shared state behind a [`Runtime`] handle.
#[derive(Debug, Default)]
pub(crate) struct Inner {
    graph: RefCell<Graph>,
    queue: RefCell<BatchQueue>,
    tracker: Tracker,
    batch_depth: Cell<usize>,
    flushing: Cell<bool>,
    options: RuntimeOptions,
}

/// A reactive runtime: one dependency graph, one tracker stack and one
/// batching queue.
///
/// Cloning is cheap and yields another handle to the same runtime.
#[derive(Debug, Clone, Default)]
pub struct Runtime {
    inner: Rc<Inner>,
}

impl Runtime {
    /// Create a runtime with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runtime with the given options.
    pub fn with_options(options: RuntimeOptions) -> Self {
        Self {
            inner: Rc::new(Inner {
                options,
                ..Inner::default()
            }),
        }
    }

    /// The options this runtime was created with.
    pub fn options(&self) -> &RuntimeOptions {
        &self.inner.options
    }

    pub(crate) fn downgrade(&self) -> Weak<Inner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(inner: &Weak<Inner>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }

    // ------------------------------------------------------------------------
    // Primitives
    // ------------------------------------------------------------------------

    /// Create a signal holding `value`.
    pub fn signal<T>(&self, value: T) -> Signal<T>
    where
        T: Clone + PartialEq + 'static,
    {
        Signal::new(self, value)
    }

    /// Create a computed value. The derivation runs on first read.
    pub fn computed<T, F>(&self, compute: F) -> Computed<T>
    where
        T: Clone + PartialEq + 'static,
        F: Fn() -> T + 'static,
    {
        Computed::new(self, compute)
    }

    /// Create an effect. It runs once immediately to establish its
    /// dependencies, then again whenever one of them changes.
    ///
    /// # Panics
    ///
    /// Panics if the first run hits a fatal [`ReactiveError`]. Use
    /// [`Runtime::try_effect`] to handle it.
    pub fn effect<F>(&self, run: F) -> Effect
    where
        F: FnMut() + 'static,
    {
        match self.try_effect(run) {
            Ok(effect) => effect,
            Err(err) => raise(err),
        }
    }

    /// Create an effect, reporting fatal errors from its first run.
    pub fn try_effect<F>(&self, run: F) -> Result<Effect, ReactiveError>
    where
        F: FnMut() + 'static,
    {
        Effect::new(self, run)
    }

    /// Create an ownership scope under the current owner.
    pub fn create_scope(&self) -> Scope {
        Scope::new(self)
    }

    /// Register `cleanup` with the current owner. It runs when the owner is
    /// disposed, or before the owning computation re-runs.
    ///
    /// Outside of any owner there is nothing to attach to and the cleanup
    /// is dropped without running.
    pub fn on_cleanup<F>(&self, cleanup: F)
    where
        F: FnOnce() + 'static,
    {
        let Some(owner) = self.inner.tracker.owner() else {
            debug!("on_cleanup called outside of an owner");
            return;
        };
        let rejected = self
            .inner
            .graph
            .borrow_mut()
            .add_cleanup(owner, Box::new(cleanup));
        if rejected.is_err() {
            debug!(owner = %owner, "on_cleanup called for a disposed owner");
        }
    }

    // ------------------------------------------------------------------------
    // Batching
    // ------------------------------------------------------------------------

    /// Run `f` with notifications deferred, then flush once.
    ///
    /// Nested batches compose: only the outermost one flushes.
    ///
    /// # Panics
    ///
    /// Panics if the flush hits a fatal [`ReactiveError`]. Use
    /// [`Runtime::try_batch`] to handle it.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        match self.try_batch(f) {
            Ok(value) => value,
            Err(err) => raise(err),
        }
    }

    /// Run `f` with notifications deferred, then flush once, reporting
    /// fatal errors from the flush.
    pub fn try_batch<R>(&self, f: impl FnOnce() -> R) -> Result<R, ReactiveError> {
        let value = {
            let _batch = BatchGuard::enter(&self.inner);
            f()
        };
        self.maybe_flush()?;
        Ok(value)
    }

    /// Run `f` without registering any dependency on the current observer.
    pub fn untrack<R>(&self, f: impl FnOnce() -> R) -> R {
        let owner = self.inner.tracker.owner();
        let _ctx = self.inner.tracker.enter(Frame {
            observer: None,
            owner,
        });
        f()
    }

    /// Check if a computation is currently recording dependencies.
    pub fn is_tracking(&self) -> bool {
        self.inner.tracker.is_tracking()
    }

    /// Check if writes are currently deferred.
    pub fn is_batching(&self) -> bool {
        self.inner.batch_depth.get() > 0 || self.inner.flushing.get()
    }

    /// Number of live (not yet disposed) nodes in the graph.
    pub fn live_nodes(&self) -> usize {
        self.inner.graph.borrow().live_count()
    }

    /// Run every queued effect until the queue settles.
    ///
    /// Effects run in the order they were first queued. Effects queued while
    /// a round is running go into the next round. Calling `flush` from
    /// inside a flush is a no-op.
    ///
    /// If the flush fails, the effects that did not get to run stay queued
    /// and stale, ahead of anything queued later, and the next flush picks
    /// them up.
    pub fn flush(&self) -> Result<(), ReactiveError> {
        if self.inner.flushing.get() {
            return Ok(());
        }
        let _flushing = FlushGuard::enter(&self.inner);
        let limit = self.inner.options.max_flush_rounds;
        let mut rounds = 0;

        loop {
            let ids: Vec<NodeId> = self.inner.queue.borrow_mut().take_round().into_iter().collect();
            if ids.is_empty() {
                break;
            }
            let mut round = Round::new(&self.inner, ids);
            rounds += 1;
            if rounds > limit {
                return Err(ReactiveError::RunawayFlush { rounds: limit });
            }
            debug!(round = rounds, effects = round.len(), "flushing effects");

            while let Some(id) = round.next() {
                if self.is_disposed(id) {
                    trace!(node = %id, "skipping disposed effect");
                    continue;
                }
                self.refresh(id)?;
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------------
    // Internals used by the primitives
    // ------------------------------------------------------------------------

    /// Allocate a node owned by the current owner.
    pub(crate) fn create_node(
        &self,
        kind: NodeKind,
        evaluator: Option<Rc<dyn Evaluate>>,
    ) -> NodeId {
        let owner = self.inner.tracker.owner();
        let id = self
            .inner
            .graph
            .borrow_mut()
            .insert(Node::new(kind, owner, evaluator));
        trace!(node = %id, ?kind, "node created");
        id
    }

    pub(crate) fn is_disposed(&self, id: NodeId) -> bool {
        self.inner.graph.borrow().is_disposed(id)
    }

    pub(crate) fn state(&self, id: NodeId) -> Option<DirtyState> {
        self.inner.graph.borrow().state(id)
    }

    pub(crate) fn dependent_count(&self, id: NodeId) -> usize {
        self.inner
            .graph
            .borrow()
            .live(id)
            .map_or(0, |node| node.dependents.len())
    }

    pub(crate) fn dependency_count(&self, id: NodeId) -> usize {
        self.inner
            .graph
            .borrow()
            .live(id)
            .map_or(0, |node| node.dependencies.len())
    }

    /// Record a read of `source` by the current observer, if any.
    pub(crate) fn track(&self, source: NodeId) {
        if let Some(reader) = self.inner.tracker.observer() {
            self.inner.graph.borrow_mut().link(source, reader);
        }
    }

    /// Run `f` with `owner` as the owner of anything it creates.
    pub(crate) fn with_owner<R>(&self, owner: NodeId, f: impl FnOnce() -> R) -> R {
        let observer = self.inner.tracker.observer();
        let _ctx = self.inner.tracker.enter(Frame {
            observer,
            owner: Some(owner),
        });
        f()
    }

    /// A source changed: invalidate downstream and flush unless deferred.
    pub(crate) fn notify(&self, source: NodeId) -> Result<(), ReactiveError> {
        {
            let mut graph = self.inner.graph.borrow_mut();
            let mut queue = self.inner.queue.borrow_mut();
            graph.mark_dependents(source, &mut queue);
            trace!(node = %source, queued = queue.len(), "source changed");
        }
        self.maybe_flush()
    }

    fn maybe_flush(&self) -> Result<(), ReactiveError> {
        if self.is_batching() || self.inner.queue.borrow().is_empty() {
            return Ok(());
        }
        self.flush()
    }

    /// Bring a computed or effect up to date.
    ///
    /// `Dirty` nodes re-evaluate. `Check` nodes first refresh their derived
    /// dependencies in read order and only re-evaluate if one of them
    /// produced a new value.
    pub(crate) fn refresh(&self, id: NodeId) -> Result<(), ReactiveError> {
        let (state, kind) = {
            let graph = self.inner.graph.borrow();
            let Some(node) = graph.live(id) else {
                return Ok(());
            };
            if node.evaluating {
                return Err(ReactiveError::CyclicDependency { node: id });
            }
            (node.state, node.kind)
        };

        match state {
            DirtyState::Clean => return Ok(()),
            DirtyState::Check => {
                let dependencies: SmallVec<[NodeId; 4]> = self
                    .inner
                    .graph
                    .borrow()
                    .live(id)
                    .map(|node| node.dependencies.clone())
                    .unwrap_or_default();

                for dependency in dependencies {
                    let derived = self.inner.graph.borrow().kind(dependency) == Some(NodeKind::Derived);
                    if derived {
                        self.refresh(dependency)?;
                    }
                    if self.state(id) == Some(DirtyState::Dirty) {
                        break;
                    }
                }
            }
            DirtyState::Dirty => {}
        }

        if self.state(id) == Some(DirtyState::Dirty) {
            let changed = self.evaluate(id)?;
            if changed && kind == NodeKind::Derived {
                self.inner.graph.borrow_mut().promote_dependents(id);
            }
        } else {
            self.inner.graph.borrow_mut().set_state(id, DirtyState::Clean);
        }

        Ok(())
    }

    /// Re-run a node inside a fresh tracking frame.
    ///
    /// Old edges are severed and owned children disposed before the run.
    /// The node is marked clean up front so writes made during the run can
    /// invalidate it again.
    fn evaluate(&self, id: NodeId) -> Result<bool, ReactiveError> {
        let evaluator = {
            let mut graph = self.inner.graph.borrow_mut();
            let Some(node) = graph.live_mut(id) else {
                return Ok(false);
            };
            if node.evaluating {
                return Err(ReactiveError::CyclicDependency { node: id });
            }
            let Some(evaluator) = node.evaluator.clone() else {
                return Ok(false);
            };
            node.evaluating = true;
            node.state = DirtyState::Clean;
            graph.sever_dependencies(id);
            evaluator
        };
        let _marker = EvaluatingMarker {
            inner: &self.inner,
            id,
        };

        self.dispose_owned(id);

        trace!(node = %id, "evaluating");
        let outcome = {
            let _ctx = self.inner.tracker.enter(Frame::evaluation(id));
            panic::catch_unwind(AssertUnwindSafe(|| evaluator.evaluate()))
        };

        match outcome {
            Ok(changed) => Ok(changed),
            Err(payload) => {
                // A derived node that failed has no valid value; the next read retries.
                {
                    let mut graph = self.inner.graph.borrow_mut();
                    if graph.kind(id) == Some(NodeKind::Derived) {
                        graph.set_state(id, DirtyState::Dirty);
                    }
                }
                match payload.downcast::<ReactiveError>() {
                    Ok(err) => Err(*err),
                    Err(other) => panic::resume_unwind(other),
                }
            }
        }
    }

    /// Dispose a node, everything it owns, and run its cleanups.
    pub(crate) fn dispose_node(&self, id: NodeId) {
        let Some(detached) = self.inner.graph.borrow_mut().detach(id) else {
            return;
        };
        trace!(node = %id, owned = detached.owned.len(), "disposing");

        for child in detached.owned {
            self.dispose_node(child);
        }
        for cleanup in detached.cleanups {
            cleanup();
        }
        drop(detached.evaluator);
    }

    /// Dispose the children and run the cleanups of a node about to re-run.
    fn dispose_owned(&self, id: NodeId) {
        let (owned, cleanups) = self.inner.graph.borrow_mut().take_owned(id);
        for child in owned {
            self.dispose_node(child);
        }
        for cleanup in cleanups {
            cleanup();
        }
    }
}

// ----------------------------------------------------------------------------
// Guards
// ----------------------------------------------------------------------------

struct BatchGuard<'a> {
    inner: &'a Inner,
}

impl<'a> BatchGuard<'a> {
    fn enter(inner: &'a Inner) -> Self {
        inner.batch_depth.set(inner.batch_depth.get() + 1);
        Self { inner }
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.inner
            .batch_depth
            .set(self.inner.batch_depth.get().saturating_sub(1));
    }
}

struct FlushGuard<'a> {
    inner: &'a Inner,
}

impl<'a> FlushGuard<'a> {
    fn enter(inner: &'a Inner) -> Self {
        inner.flushing.set(true);
        Self { inner }
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.inner.flushing.set(false);
    }
}

/// The effects of one flush round.
///
/// Dropping a round before it ran to the end, through an error return or an
/// unwinding panic, puts the effects it did not reach back at the front of
/// the queue. Their dirty state is left alone: a stale computed between them
/// and a source does not mark its dependents again, so they must stay queued
/// to be refreshed.
struct Round<'a> {
    inner: &'a Inner,
    ids: Vec<NodeId>,
    cursor: usize,
}

impl<'a> Round<'a> {
    fn new(inner: &'a Inner, ids: Vec<NodeId>) -> Self {
        Self {
            inner,
            ids,
            cursor: 0,
        }
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn next(&mut self) -> Option<NodeId> {
        let id = self.ids.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(id)
    }
}

impl Drop for Round<'_> {
    fn drop(&mut self) {
        let rest = self.ids.get(self.cursor..).unwrap_or_default();
        if rest.is_empty() {
            return;
        }
        let Ok(mut queue) = self.inner.queue.try_borrow_mut() else {
            return;
        };
        let later = queue.take_round();
        for &id in rest.iter().chain(later.iter()) {
            queue.push(id);
        }
        debug!(requeued = rest.len(), "flush interrupted");
    }
}

/// Clears a node's `evaluating` flag when its evaluation ends, however it ends.
struct EvaluatingMarker<'a> {
    inner: &'a Inner,
    id: NodeId,
}

impl Drop for EvaluatingMarker<'_> {
    fn drop(&mut self) {
        if let Some(node) = self.inner.graph.borrow_mut().live_mut(self.id) {
            node.evaluating = false;
        }
    }
}
