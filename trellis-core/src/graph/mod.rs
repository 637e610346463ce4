//! Dependency Graph
//!
//! This module implements the computational dependency graph that tracks
//! relationships between reactive values and computations.
//!
//! # Overview
//!
//! The dependency graph is a directed graph where:
//!
//! - Nodes represent reactive values (signals) or computations (computeds,
//!   effects), plus ownership scopes
//! - Edges represent dependencies: if A depends on B, there is an edge from B to A
//!
//! When a signal changes, we traverse the graph to find all affected nodes
//! and mark them as dirty. Derived nodes are recomputed lazily, effects are
//! queued for the next flush.
//!
//! # Design Decisions
//!
//! 1. Nodes live in an arena and are addressed by integer id. Edges are id
//!    sets, never references, so cycle detection is a flag check on the
//!    record rather than pointer chasing.
//!
//! 2. The graph is indexed by node ID for O(1) lookups.
//!
//! 3. We maintain both forward (dependencies) and reverse (dependents) edges
//!    to enable efficient traversal in both directions.

mod arena;
mod node;
mod queue;

pub(crate) use arena::Graph;
pub(crate) use node::{Cleanup, Evaluate, Node};
pub use node::{DirtyState, NodeId, NodeKind};
pub(crate) use queue::BatchQueue;
