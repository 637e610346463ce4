//! Rendering
//!
//! The VNode model, the keyed diff engine and the patch executor.
//!
//! # Pipeline
//!
//! 1. A render function builds a [`VNode`] tree.
//! 2. [`diff`] compares it with the previous tree and produces a list of
//!    [`PatchOp`]s naming nodes by path.
//! 3. [`LiveTree::apply`] resolves those paths against its mirror of the
//!    mounted tree and performs the mutations through a [`Host`].
//!
//! [`RenderRoot`] runs the three steps inside an effect, so the live tree is
//! patched whenever state the render function read changes.

mod diff;
mod executor;
mod lis;
mod memory;
mod mount;
mod patch;
mod vnode;

pub use diff::{diff, diff_children};
pub use executor::{patch, Host, LiveTree};
pub use memory::{HookEvent, HostStats, MemNodeId, MemoryHost};
pub use mount::RenderRoot;
pub use patch::{count_kinds, Anchor, NodePath, NodeRef, PatchKind, PatchOp};
pub use vnode::{flatten, normalize, Key, VElement, VFragment, VNode, VText};
