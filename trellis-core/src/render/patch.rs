//! Patch Operations
//!
//! A patch list is the output of the diff engine and the input of the
//! executor. It names nodes by where they sit, not by host handle, so the
//! same list can be applied to any host that mounted the old tree (or be
//! serialized and shipped to a remote renderer).
//!
//! # Naming nodes
//!
//! - `NodeRef::Old(path)`: a node of the previous tree, by its path in that
//!   tree. Old paths are resolved once, before any operation runs, so they
//!   stay valid however earlier operations shuffle the tree.
//! - `NodeRef::New(path)`: a node created by an earlier `Create` or
//!   `Replace` of the same list, by its path in the new tree. Descendants of
//!   a created subtree are registered too.
//! - `NodeRef::Root`: the container the tree is mounted in.
//!
//! Paths index the flattened child lists (fragments removed), starting at
//! the container: `/0` is the first top-level node.
//!
//! # Ordering
//!
//! Lists produced by the diff engine put every `Remove` of a sibling list
//! first, then its placements back to front (each insertion anchors on a
//! sibling that is already final), then the in-place updates.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::vnode::VNode;

/// Index path from the container to a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath(SmallVec<[u32; 8]>);

impl NodePath {
    /// The empty path, naming the container itself.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_indices<I>(indices: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        Self(indices.into_iter().map(|index| index as u32).collect())
    }

    /// Path of this node's `index`-th child.
    pub fn child(&self, index: usize) -> Self {
        let mut path = self.clone();
        path.0.push(index as u32);
        path
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, parent) = self.0.split_last()?;
        Some(Self(parent.iter().copied().collect()))
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().map(|&index| index as usize)
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for index in &self.0 {
            write!(f, "/{index}")?;
        }
        Ok(())
    }
}

/// A node named by a patch operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRef {
    Root,
    Old(NodePath),
    New(NodePath),
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Root => f.write_str("root"),
            NodeRef::Old(path) => write!(f, "old {path}"),
            NodeRef::New(path) => write!(f, "new {path}"),
        }
    }
}

/// Where an insertion lands among the parent's children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    /// Immediately before this sibling.
    Before(NodeRef),
    /// After the last child.
    End,
}

/// One mutation of the live tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PatchOp {
    /// Build `node` (and its subtree) and insert it under `parent`. The new
    /// node is registered as `New(path)`.
    Create {
        parent: NodeRef,
        before: Anchor,
        path: NodePath,
        node: VNode,
    },

    /// Detach `target` and its subtree.
    Remove { target: NodeRef },

    /// Reposition an existing node, keeping its identity.
    Move {
        target: NodeRef,
        parent: NodeRef,
        before: Anchor,
    },

    /// Set and remove attributes of an element.
    UpdateAttributes {
        target: NodeRef,
        set: IndexMap<String, String>,
        remove: Vec<String>,
    },

    UpdateText { target: NodeRef, text: String },

    /// Remove `target`, then build `node` in its place. Used when a matched
    /// pair changed tag or variant.
    Replace {
        target: NodeRef,
        parent: NodeRef,
        before: Anchor,
        path: NodePath,
        node: VNode,
    },
}

/// The variant of a [`PatchOp`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchKind {
    Create,
    Remove,
    Move,
    UpdateAttributes,
    UpdateText,
    Replace,
}

impl PatchOp {
    pub fn kind(&self) -> PatchKind {
        match self {
            PatchOp::Create { .. } => PatchKind::Create,
            PatchOp::Remove { .. } => PatchKind::Remove,
            PatchOp::Move { .. } => PatchKind::Move,
            PatchOp::UpdateAttributes { .. } => PatchKind::UpdateAttributes,
            PatchOp::UpdateText { .. } => PatchKind::UpdateText,
            PatchOp::Replace { .. } => PatchKind::Replace,
        }
    }

    /// Every node reference the operation mentions, anchors included.
    pub fn references(&self) -> SmallVec<[&NodeRef; 3]> {
        let mut refs = SmallVec::new();
        match self {
            PatchOp::Create { parent, before, .. } => {
                refs.push(parent);
                if let Anchor::Before(anchor) = before {
                    refs.push(anchor);
                }
            }
            PatchOp::Remove { target }
            | PatchOp::UpdateAttributes { target, .. }
            | PatchOp::UpdateText { target, .. } => refs.push(target),
            PatchOp::Move {
                target,
                parent,
                before,
            }
            | PatchOp::Replace {
                target,
                parent,
                before,
                ..
            } => {
                refs.push(target);
                refs.push(parent);
                if let Anchor::Before(anchor) = before {
                    refs.push(anchor);
                }
            }
        }
        refs
    }
}

/// Count the operations of each kind in a patch list.
pub fn count_kinds(ops: &[PatchOp]) -> IndexMap<PatchKind, usize> {
    let mut counts = IndexMap::new();
    for op in ops {
        *counts.entry(op.kind()).or_insert(0) += 1;
    }
    counts
}
