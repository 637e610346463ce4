//! Patch Executor
//!
//! Applies [`PatchOp`] lists to a live tree owned by a [`Host`].
//!
//! # The mirror
//!
//! [`LiveTree`] keeps a mirror of the mounted tree: one slot per live node,
//! holding the host handle, the node's key and tag, and its position. Patch
//! operations name nodes by path; the mirror is what turns those paths back
//! into host handles.
//!
//! `Old` paths are resolved against the mirror as it was before the list
//! runs, so the operations can be executed strictly in order. Nodes created
//! by the list are registered under their `New` paths as they are built.
//!
//! # Hooks
//!
//! `Host::unmounted` fires for every node of a subtree, parents first,
//! before the subtree leaves the tree. `Host::mounted` fires after a created
//! subtree is inserted, children first. Moves and in-place updates fire no
//! hooks: the node keeps its identity.

use std::collections::HashMap;
use std::fmt;
use std::slice;

use tracing::debug;

use super::diff::diff_children;
use super::patch::{Anchor, NodePath, NodeRef, PatchOp};
use super::vnode::{flatten, Key, VNode};
use crate::error::PatchError;

/// The tree a [`LiveTree`] mutates: a DOM, a widget toolkit, or the
/// in-memory reference host.
pub trait Host {
    /// Handle to one node of the host tree.
    type Node: Clone + PartialEq + fmt::Debug;

    fn create_element(&mut self, tag: &str) -> Self::Node;

    fn create_text(&mut self, text: &str) -> Self::Node;

    /// Current children of `parent`, in order.
    fn children(&self, parent: &Self::Node) -> Vec<Self::Node>;

    /// Insert `node` under `parent` before `anchor`, or last when `anchor`
    /// is `None`. A node that is already attached somewhere is moved.
    fn insert_before(&mut self, parent: &Self::Node, node: &Self::Node, anchor: Option<&Self::Node>);

    fn remove(&mut self, parent: &Self::Node, node: &Self::Node);

    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str);

    fn remove_attribute(&mut self, node: &Self::Node, name: &str);

    fn set_text(&mut self, node: &Self::Node, text: &str);

    /// Called once a node is part of the mounted tree.
    fn mounted(&mut self, _node: &Self::Node) {}

    /// Called right before a node leaves the mounted tree.
    fn unmounted(&mut self, _node: &Self::Node) {}
}

type SlotId = usize;

#[derive(Debug)]
struct Slot<N> {
    node: N,
    key: Option<Key>,
    /// `None` for text nodes.
    tag: Option<String>,
    /// `None` for top-level nodes, whose parent is the container.
    parent: Option<SlotId>,
    children: Vec<SlotId>,
}

/// Where an insertion lands, resolved to slots and host handles.
struct Placement<N> {
    parent: Option<SlotId>,
    parent_node: N,
    anchor: Option<(SlotId, N)>,
}

/// Path lookups for one `apply` call.
#[derive(Default)]
struct Resolution {
    old: HashMap<NodePath, SlotId>,
    created: HashMap<NodePath, SlotId>,
    /// Slots freed during this call. They are not reused before it ends, so
    /// a stale path can never resolve to a newly built node.
    retired: Vec<SlotId>,
}

/// A mounted tree: the host, the container node and the mirror.
pub struct LiveTree<H: Host> {
    host: H,
    container: H::Node,
    slots: Vec<Option<Slot<H::Node>>>,
    free: Vec<SlotId>,
    roots: Vec<SlotId>,
}

impl<H: Host> LiveTree<H> {
    /// Wrap an empty container of `host`.
    pub fn new(host: H, container: H::Node) -> Self {
        Self {
            host,
            container,
            slots: Vec::new(),
            free: Vec::new(),
            roots: Vec::new(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn container(&self) -> &H::Node {
        &self.container
    }

    /// Number of live nodes below the container.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Build `root` into the container.
    pub fn mount(&mut self, root: &VNode) -> Result<(), PatchError> {
        let ops = diff_children(&[], slice::from_ref(root));
        self.apply(&ops)
    }

    /// Remove every top-level node, firing unmount hooks.
    pub fn clear(&mut self) {
        let mut resolution = Resolution::default();
        for id in self.roots.clone() {
            if let Some(node) = self.slot(id).map(|slot| slot.node.clone()) {
                self.detach(id, &node, &mut resolution);
            }
        }
        self.free.append(&mut resolution.retired);
    }

    /// Apply a patch list produced by diffing the tree this mirror holds.
    ///
    /// Fails without touching the host if an `Old` path does not resolve.
    /// Other failures stop at the offending operation; earlier operations
    /// stay applied.
    pub fn apply(&mut self, ops: &[PatchOp]) -> Result<(), PatchError> {
        let mut resolution = Resolution::default();
        for reference in ops.iter().flat_map(PatchOp::references) {
            let NodeRef::Old(path) = reference else {
                continue;
            };
            if resolution.old.contains_key(path) {
                continue;
            }
            let slot = self
                .find(path)
                .ok_or_else(|| PatchError::UnresolvedNode {
                    reference: reference.clone(),
                })?;
            resolution.old.insert(path.clone(), slot);
        }

        let outcome = ops
            .iter()
            .try_for_each(|op| self.apply_op(op, &mut resolution));
        self.free.append(&mut resolution.retired);
        outcome?;

        if !ops.is_empty() {
            debug!(ops = ops.len(), live = self.len(), "patches applied");
        }
        Ok(())
    }

    fn apply_op(&mut self, op: &PatchOp, resolution: &mut Resolution) -> Result<(), PatchError> {
        match op {
            PatchOp::Create {
                parent,
                before,
                path,
                node,
            } => {
                let placement = self.placement(parent, before, resolution)?;
                let (id, handle) = self.build(node, path, resolution)?;
                self.insert(id, &handle, placement);
                self.notify_mounted(id);
            }
            PatchOp::Remove { target } => {
                let (id, handle) = self.lookup(target, resolution)?;
                self.detach(id, &handle, resolution);
            }
            PatchOp::Move {
                target,
                parent,
                before,
            } => {
                let (id, handle) = self.lookup(target, resolution)?;
                let placement = self.placement(parent, before, resolution)?;
                self.insert(id, &handle, placement);
            }
            PatchOp::UpdateAttributes {
                target,
                set,
                remove,
            } => {
                let (id, handle) = self.lookup(target, resolution)?;
                if self.slot(id).map_or(true, |slot| slot.tag.is_none()) {
                    return Err(PatchError::NotAnElement {
                        reference: target.clone(),
                    });
                }
                for (name, value) in set {
                    self.host.set_attribute(&handle, name, value);
                }
                for name in remove {
                    self.host.remove_attribute(&handle, name);
                }
            }
            PatchOp::UpdateText { target, text } => {
                let (id, handle) = self.lookup(target, resolution)?;
                if self.slot(id).map_or(true, |slot| slot.tag.is_some()) {
                    return Err(PatchError::NotAText {
                        reference: target.clone(),
                    });
                }
                self.host.set_text(&handle, text);
            }
            PatchOp::Replace {
                target,
                parent,
                before,
                path,
                node,
            } => {
                let (old_id, old_handle) = self.lookup(target, resolution)?;
                let placement = self.placement(parent, before, resolution)?;
                let (id, handle) = self.build(node, path, resolution)?;
                self.detach(old_id, &old_handle, resolution);
                self.insert(id, &handle, placement);
                self.notify_mounted(id);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Host handle of the node at `path`, in flattened child positions.
    pub fn node_at(&self, path: &NodePath) -> Option<&H::Node> {
        let id = self.find(path)?;
        self.slot(id).map(|slot| &slot.node)
    }

    /// Host handle of the child of `parent` (the container for the root
    /// path) carrying `key`.
    pub fn child_by_key(&self, parent: &NodePath, key: &Key) -> Option<&H::Node> {
        let siblings = if parent.is_root() {
            &self.roots
        } else {
            &self.slot(self.find(parent)?)?.children
        };
        siblings
            .iter()
            .rev()
            .filter_map(|&id| self.slot(id))
            .find(|slot| slot.key.as_ref() == Some(key))
            .map(|slot| &slot.node)
    }

    /// Host handles of the top-level nodes.
    pub fn root_nodes(&self) -> Vec<&H::Node> {
        self.roots
            .iter()
            .filter_map(|&id| self.slot(id))
            .map(|slot| &slot.node)
            .collect()
    }

    /// Check that the host tree has exactly the shape the mirror records.
    pub fn verify(&self) -> bool {
        self.verify_children(&self.container, &self.roots)
    }

    fn verify_children(&self, parent: &H::Node, children: &[SlotId]) -> bool {
        let actual = self.host.children(parent);
        if actual.len() != children.len() {
            return false;
        }
        actual.iter().zip(children).all(|(node, &id)| match self.slot(id) {
            Some(slot) => slot.node == *node && self.verify_children(node, &slot.children),
            None => false,
        })
    }

    // ------------------------------------------------------------------------
    // Mirror bookkeeping
    // ------------------------------------------------------------------------

    fn slot(&self, id: SlotId) -> Option<&Slot<H::Node>> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, id: SlotId) -> Option<&mut Slot<H::Node>> {
        self.slots.get_mut(id).and_then(Option::as_mut)
    }

    fn find(&self, path: &NodePath) -> Option<SlotId> {
        let mut siblings = &self.roots;
        let mut found = None;
        for index in path.indices() {
            let id = *siblings.get(index)?;
            siblings = &self.slot(id)?.children;
            found = Some(id);
        }
        found
    }

    fn lookup(
        &self,
        reference: &NodeRef,
        resolution: &Resolution,
    ) -> Result<(SlotId, H::Node), PatchError> {
        let id = match reference {
            NodeRef::Root => None,
            NodeRef::Old(path) => resolution.old.get(path).copied(),
            NodeRef::New(path) => resolution.created.get(path).copied(),
        };
        id.and_then(|id| self.slot(id).map(|slot| (id, slot.node.clone())))
            .ok_or_else(|| PatchError::UnresolvedNode {
                reference: reference.clone(),
            })
    }

    fn placement(
        &self,
        parent: &NodeRef,
        before: &Anchor,
        resolution: &Resolution,
    ) -> Result<Placement<H::Node>, PatchError> {
        let (parent_id, parent_node) = match parent {
            NodeRef::Root => (None, self.container.clone()),
            reference => {
                let (id, node) = self.lookup(reference, resolution)?;
                if self.slot(id).map_or(true, |slot| slot.tag.is_none()) {
                    return Err(PatchError::NotAnElement {
                        reference: reference.clone(),
                    });
                }
                (Some(id), node)
            }
        };

        let anchor = match before {
            Anchor::End => None,
            Anchor::Before(reference) => {
                let (id, node) = self.lookup(reference, resolution)?;
                if self.slot(id).map(|slot| slot.parent) != Some(parent_id) {
                    return Err(PatchError::AnchorNotInParent {
                        anchor: reference.clone(),
                        parent: parent.clone(),
                    });
                }
                Some((id, node))
            }
        };

        Ok(Placement {
            parent: parent_id,
            parent_node,
            anchor,
        })
    }

    fn alloc(&mut self, slot: Slot<H::Node>) -> SlotId {
        match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(slot);
                id
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        }
    }

    /// Create the host nodes of a subtree and its mirror slots. The subtree
    /// root is left detached.
    fn build(
        &mut self,
        vnode: &VNode,
        path: &NodePath,
        resolution: &mut Resolution,
    ) -> Result<(SlotId, H::Node), PatchError> {
        let (id, node) = match vnode {
            VNode::Fragment(_) => {
                return Err(PatchError::UnexpectedFragment { path: path.clone() });
            }
            VNode::Text(text) => {
                let node = self.host.create_text(&text.text);
                let id = self.alloc(Slot {
                    node: node.clone(),
                    key: None,
                    tag: None,
                    parent: None,
                    children: Vec::new(),
                });
                (id, node)
            }
            VNode::Element(element) => {
                let node = self.host.create_element(&element.tag);
                for (name, value) in &element.attrs {
                    self.host.set_attribute(&node, name, value);
                }
                let id = self.alloc(Slot {
                    node: node.clone(),
                    key: element.key.clone(),
                    tag: Some(element.tag.clone()),
                    parent: None,
                    children: Vec::new(),
                });
                for (index, child) in flatten(&element.children).into_iter().enumerate() {
                    let (child_id, child_node) = self.build(child, &path.child(index), resolution)?;
                    self.host.insert_before(&node, &child_node, None);
                    self.link(child_id, Some(id), None);
                }
                (id, node)
            }
        };
        resolution.created.insert(path.clone(), id);
        Ok((id, node))
    }

    /// Insert (or move) a node on the host and in the mirror.
    fn insert(&mut self, id: SlotId, node: &H::Node, placement: Placement<H::Node>) {
        let anchor_node = placement.anchor.as_ref().map(|(_, node)| node);
        self.host
            .insert_before(&placement.parent_node, node, anchor_node);
        self.unlink(id);
        self.link(id, placement.parent, placement.anchor.map(|(anchor, _)| anchor));
    }

    /// Remove a node from the host and free its subtree's slots.
    fn detach(&mut self, id: SlotId, node: &H::Node, resolution: &mut Resolution) {
        let subtree = self.pre_order(id);
        for &member in &subtree {
            if let Some(slot) = self.slots.get(member).and_then(Option::as_ref) {
                let handle = slot.node.clone();
                self.host.unmounted(&handle);
            }
        }

        let parent_node = match self.slot(id).and_then(|slot| slot.parent) {
            Some(parent) => self.slot(parent).map(|slot| slot.node.clone()),
            None => Some(self.container.clone()),
        };
        if let Some(parent_node) = parent_node {
            self.host.remove(&parent_node, node);
        }
        self.unlink(id);

        for member in subtree {
            if let Some(slot) = self.slots.get_mut(member) {
                *slot = None;
                resolution.retired.push(member);
            }
        }
    }

    fn notify_mounted(&mut self, id: SlotId) {
        let mut subtree = Vec::new();
        self.post_order(id, &mut subtree);
        for member in subtree {
            if let Some(handle) = self.slot(member).map(|slot| slot.node.clone()) {
                self.host.mounted(&handle);
            }
        }
    }

    fn pre_order(&self, id: SlotId) -> Vec<SlotId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(slot) = self.slot(next) {
                order.push(next);
                stack.extend(slot.children.iter().rev());
            }
        }
        order
    }

    fn post_order(&self, id: SlotId, order: &mut Vec<SlotId>) {
        if let Some(slot) = self.slot(id) {
            for &child in &slot.children {
                self.post_order(child, order);
            }
            order.push(id);
        }
    }

    fn siblings_mut(&mut self, parent: Option<SlotId>) -> Option<&mut Vec<SlotId>> {
        match parent {
            None => Some(&mut self.roots),
            Some(parent) => self.slot_mut(parent).map(|slot| &mut slot.children),
        }
    }

    /// Drop a node from its mirror parent's child list.
    fn unlink(&mut self, id: SlotId) {
        let Some(parent) = self.slot(id).map(|slot| slot.parent) else {
            return;
        };
        if let Some(siblings) = self.siblings_mut(parent) {
            siblings.retain(|&child| child != id);
        }
    }

    /// Record a node as a child of `parent`, before `anchor` or last.
    fn link(&mut self, id: SlotId, parent: Option<SlotId>, anchor: Option<SlotId>) {
        if let Some(slot) = self.slot_mut(id) {
            slot.parent = parent;
        }
        if let Some(siblings) = self.siblings_mut(parent) {
            let at = anchor
                .and_then(|anchor| siblings.iter().position(|&child| child == anchor))
                .unwrap_or(siblings.len());
            siblings.insert(at, id);
        }
    }
}

impl<H: Host> fmt::Debug for LiveTree<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveTree")
            .field("container", &self.container)
            .field("nodes", &self.len())
            .field("roots", &self.roots.len())
            .finish()
    }
}

/// Apply `ops` to `tree`. Same as [`LiveTree::apply`].
pub fn patch<H: Host>(tree: &mut LiveTree<H>, ops: &[PatchOp]) -> Result<(), PatchError> {
    tree.apply(ops)
}
