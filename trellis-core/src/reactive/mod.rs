//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, computeds,
//! effects and the scopes that own them. These primitives form the
//! foundation of Trellis's fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a computed or effect), the signal
//! automatically registers that context as a dependent. When the signal's
//! value changes, all dependents are invalidated.
//!
//! ## Computeds
//!
//! A Computed is a derived value that caches its result. It re-evaluates
//! only when one of its dependencies changes, and only when read.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Effects are used to synchronize reactive state with
//! external systems, such as updating a rendered tree or logging.
//!
//! ## Scopes
//!
//! A Scope owns the primitives created inside it and disposes them as a
//! unit. Effects and computeds are implicit scopes for their own runs.
//!
//! # Implementation Notes
//!
//! Every primitive lives in the arena of an explicit [`Runtime`]. When a
//! signal is read, the runtime checks its tracking stack for an active
//! observer and, if there is one, records the dependency.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod computed;
mod context;
mod effect;
mod runtime;
mod scope;
mod signal;

pub use computed::Computed;
pub use effect::Effect;
pub use runtime::Runtime;
pub use scope::Scope;
pub use signal::Signal;
