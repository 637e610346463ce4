//! Trellis Core
//!
//! This crate provides the core runtime for the Trellis reactive UI framework.
//! It implements:
//!
//! - Reactive primitives (signals, computeds, effects, scopes)
//! - Batched, glitch-free propagation of changes
//! - A virtual node model and keyed reconciliation
//! - A patch executor that applies the result to any host tree
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `graph`: Dependency graph arena and batching queue
//! - `render`: Virtual nodes, diffing and patch application
//! - `config`: Runtime options
//! - `error`: Error types
//!
//! Everything is single-threaded. Runtime state lives behind `Rc`/`RefCell`
//! and every primitive is created from an explicit [`Runtime`](reactive::Runtime).
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use trellis_core::reactive::Runtime;
//!
//! let rt = Runtime::new();
//!
//! // Create a signal
//! let count = rt.signal(0);
//!
//! // Create a derived value
//! let doubled = {
//!     let count = count.clone();
//!     rt.computed(move || count.get() * 2)
//! };
//!
//! // Create an effect
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let _effect = {
//!     let (count, doubled, log) = (count.clone(), doubled.clone(), Rc::clone(&log));
//!     rt.effect(move || log.borrow_mut().push((count.get(), doubled.get())))
//! };
//!
//! // Update the signal; the effect runs again
//! count.set(5);
//! assert_eq!(*log.borrow(), vec![(0, 0), (5, 10)]);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;
pub mod render;

pub use config::RuntimeOptions;
pub use error::{PatchError, ReactiveError};
pub use reactive::{Computed, Effect, Runtime, Scope, Signal};
pub use render::{diff, diff_children, patch, Host, LiveTree, PatchOp, RenderRoot, VNode};
