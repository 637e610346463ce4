//! In-memory host.
//!
//! A minimal element/text tree implementing [`Host`]. It records lifecycle
//! hooks and counts mutations, which makes it the reference host for tests
//! and benchmarks.

use std::fmt;

use indexmap::IndexMap;

use super::executor::Host;
use super::vnode::{VElement, VNode};

/// Handle to a node of a [`MemoryHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemNodeId(usize);

impl fmt::Display for MemNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// A lifecycle hook, as observed by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    Mounted(MemNodeId),
    Unmounted(MemNodeId),
}

/// Mutation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStats {
    pub created: usize,
    pub inserted: usize,
    pub removed: usize,
    pub attribute_writes: usize,
    pub text_writes: usize,
}

#[derive(Debug)]
enum Content {
    Element {
        tag: String,
        attrs: IndexMap<String, String>,
    },
    Text(String),
}

#[derive(Debug)]
struct MemNode {
    content: Content,
    parent: Option<MemNodeId>,
    children: Vec<MemNodeId>,
}

#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: Vec<MemNode>,
    hooks: Vec<HookEvent>,
    stats: HostStats,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached element to mount trees into. Not counted in the
    /// stats.
    pub fn create_container(&mut self) -> MemNodeId {
        self.alloc(Content::Element {
            tag: "#container".into(),
            attrs: IndexMap::new(),
        })
    }

    /// Rebuild the children of `parent` as keyless VNodes.
    ///
    /// Comparing this with [`VNode::normalized`] checks that a patched tree
    /// matches what was rendered.
    pub fn snapshot(&self, parent: MemNodeId) -> Vec<VNode> {
        self.children_of(parent)
            .iter()
            .filter_map(|&child| self.vnode(child))
            .collect()
    }

    fn vnode(&self, id: MemNodeId) -> Option<VNode> {
        let node = self.nodes.get(id.0)?;
        Some(match &node.content {
            Content::Element { tag, attrs } => VNode::Element(VElement {
                tag: tag.clone(),
                key: None,
                attrs: attrs.clone(),
                children: self.snapshot(id),
            }),
            Content::Text(text) => VNode::text(text.clone()),
        })
    }

    pub fn tag(&self, node: MemNodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.content {
            Content::Element { tag, .. } => Some(tag),
            Content::Text(_) => None,
        }
    }

    pub fn text(&self, node: MemNodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.content {
            Content::Text(text) => Some(text),
            Content::Element { .. } => None,
        }
    }

    pub fn attribute(&self, node: MemNodeId, name: &str) -> Option<&str> {
        match &self.nodes.get(node.0)?.content {
            Content::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            Content::Text(_) => None,
        }
    }

    pub fn parent(&self, node: MemNodeId) -> Option<MemNodeId> {
        self.nodes.get(node.0)?.parent
    }

    pub fn children_of(&self, parent: MemNodeId) -> &[MemNodeId] {
        self.nodes
            .get(parent.0)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    /// Hooks fired so far, oldest first.
    pub fn hooks(&self) -> &[HookEvent] {
        &self.hooks
    }

    pub fn take_hooks(&mut self) -> Vec<HookEvent> {
        std::mem::take(&mut self.hooks)
    }

    pub fn stats(&self) -> HostStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = HostStats::default();
    }

    fn alloc(&mut self, content: Content) -> MemNodeId {
        let id = MemNodeId(self.nodes.len());
        self.nodes.push(MemNode {
            content,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn detach(&mut self, node: MemNodeId) {
        let Some(parent) = self.nodes.get_mut(node.0).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(parent) = self.nodes.get_mut(parent.0) {
            parent.children.retain(|&child| child != node);
        }
    }
}

impl Host for MemoryHost {
    type Node = MemNodeId;

    fn create_element(&mut self, tag: &str) -> MemNodeId {
        self.stats.created += 1;
        self.alloc(Content::Element {
            tag: tag.to_owned(),
            attrs: IndexMap::new(),
        })
    }

    fn create_text(&mut self, text: &str) -> MemNodeId {
        self.stats.created += 1;
        self.alloc(Content::Text(text.to_owned()))
    }

    fn children(&self, parent: &MemNodeId) -> Vec<MemNodeId> {
        self.children_of(*parent).to_vec()
    }

    fn insert_before(&mut self, parent: &MemNodeId, node: &MemNodeId, anchor: Option<&MemNodeId>) {
        self.detach(*node);
        let Some(parent_node) = self.nodes.get_mut(parent.0) else {
            return;
        };
        let at = anchor
            .and_then(|anchor| parent_node.children.iter().position(|child| child == anchor))
            .unwrap_or(parent_node.children.len());
        parent_node.children.insert(at, *node);
        if let Some(node) = self.nodes.get_mut(node.0) {
            node.parent = Some(*parent);
        }
        self.stats.inserted += 1;
    }

    fn remove(&mut self, parent: &MemNodeId, node: &MemNodeId) {
        if self.parent(*node) == Some(*parent) {
            self.detach(*node);
            self.stats.removed += 1;
        }
    }

    fn set_attribute(&mut self, node: &MemNodeId, name: &str, value: &str) {
        if let Some(MemNode {
            content: Content::Element { attrs, .. },
            ..
        }) = self.nodes.get_mut(node.0)
        {
            attrs.insert(name.to_owned(), value.to_owned());
            self.stats.attribute_writes += 1;
        }
    }

    fn remove_attribute(&mut self, node: &MemNodeId, name: &str) {
        if let Some(MemNode {
            content: Content::Element { attrs, .. },
            ..
        }) = self.nodes.get_mut(node.0)
        {
            attrs.shift_remove(name);
            self.stats.attribute_writes += 1;
        }
    }

    fn set_text(&mut self, node: &MemNodeId, text: &str) {
        if let Some(MemNode {
            content: Content::Text(current),
            ..
        }) = self.nodes.get_mut(node.0)
        {
            *current = text.to_owned();
            self.stats.text_writes += 1;
        }
    }

    fn mounted(&mut self, node: &MemNodeId) {
        self.hooks.push(HookEvent::Mounted(*node));
    }

    fn unmounted(&mut self, node: &MemNodeId) {
        self.hooks.push(HookEvent::Unmounted(*node));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_before_moves_attached_nodes() {
        let mut host = MemoryHost::new();
        let root = host.create_container();
        let a = host.create_text("a");
        let b = host.create_text("b");

        host.insert_before(&root, &a, None);
        host.insert_before(&root, &b, None);
        host.insert_before(&root, &b, Some(&a));

        assert_eq!(host.children_of(root), &[b, a]);
        assert_eq!(host.stats().inserted, 3);
    }

    #[test]
    fn snapshot_rebuilds_the_tree() {
        let mut host = MemoryHost::new();
        let root = host.create_container();
        let p = host.create_element("p");
        let text = host.create_text("hello");
        host.set_attribute(&p, "class", "lead");
        host.insert_before(&p, &text, None);
        host.insert_before(&root, &p, None);

        let expected: VNode = VNode::element("p").attr("class", "lead").child("hello").into();
        assert_eq!(host.snapshot(root), vec![expected]);
        assert_eq!(host.parent(text), Some(p));
    }

    #[test]
    fn remove_ignores_wrong_parent() {
        let mut host = MemoryHost::new();
        let root = host.create_container();
        let other = host.create_container();
        let node = host.create_text("x");
        host.insert_before(&root, &node, None);

        host.remove(&other, &node);
        assert_eq!(host.children_of(root), &[node]);

        host.remove(&root, &node);
        assert!(host.children_of(root).is_empty());
        assert_eq!(host.parent(node), None);
    }

    #[test]
    fn text_writes_skip_elements() {
        let mut host = MemoryHost::new();
        let div = host.create_element("div");
        host.set_text(&div, "nope");

        assert_eq!(host.text(div), None);
        assert_eq!(host.tag(div), Some("div"));
        assert_eq!(host.stats().text_writes, 0);
    }
}
