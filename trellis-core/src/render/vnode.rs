//! Virtual Nodes
//!
//! A `VNode` is a plain, immutable description of one node of the rendered
//! tree. Render functions build a fresh VNode tree on every run; the diff
//! engine compares it with the previous one and the executor applies the
//! difference to the live tree.
//!
//! # Fragments
//!
//! A fragment groups siblings without introducing a node of its own. Before
//! any comparison a sibling list is flattened, so `[a, fragment[b, c], d]`
//! and `[a, b, c, d]` describe the same live tree.
//!
//! # Identity
//!
//! Two siblings in the old and new lists are the same node when they carry
//! the same key, or when neither has a key and they sit at the same
//! position. A matched pair whose tag (or variant) differs is replaced
//! rather than updated.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Identity of a node among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(value) => write!(f, "{value}"),
            Key::Str(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(value.into())
    }
}

impl From<u32> for Key {
    fn from(value: u32) -> Self {
        Key::Int(value.into())
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(value.to_owned())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(value)
    }
}

/// A virtual node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VNode {
    Element(VElement),
    Text(VText),
    Fragment(VFragment),
}

/// An element: tag, attributes in insertion order, children, optional key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VElement {
    pub tag: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Key>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attrs: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<VNode>,
}

/// A text node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VText {
    pub text: String,
}

/// Siblings without a node of their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VFragment {
    pub children: Vec<VNode>,
}

impl VNode {
    /// Start building an element.
    ///
    /// ```rust
    /// use trellis_core::render::VNode;
    ///
    /// let item: VNode = VNode::element("li")
    ///     .key(3)
    ///     .attr("class", "done")
    ///     .child(VNode::text("ship it"))
    ///     .into();
    ///
    /// assert_eq!(item.tag(), Some("li"));
    /// ```
    pub fn element(tag: impl Into<String>) -> VElement {
        VElement {
            tag: tag.into(),
            key: None,
            attrs: IndexMap::new(),
            children: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        VNode::Text(VText { text: text.into() })
    }

    pub fn fragment<I>(children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<VNode>,
    {
        VNode::Fragment(VFragment {
            children: children.into_iter().map(Into::into).collect(),
        })
    }

    /// The key of an element. Text and fragments are never keyed.
    pub fn key(&self) -> Option<&Key> {
        match self {
            VNode::Element(element) => element.key.as_ref(),
            _ => None,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            VNode::Element(element) => Some(&element.tag),
            _ => None,
        }
    }

    /// Whether a matched pair can be patched in place: both text, or both
    /// elements with the same tag.
    pub fn same_kind(&self, other: &VNode) -> bool {
        match (self, other) {
            (VNode::Text(_), VNode::Text(_)) => true,
            (VNode::Element(a), VNode::Element(b)) => a.tag == b.tag,
            _ => false,
        }
    }

    /// The live tree this node describes: fragments flattened and keys
    /// dropped. A fragment normalizes to any number of nodes.
    pub fn normalized(&self) -> Vec<VNode> {
        normalize(std::slice::from_ref(self))
    }
}

impl VElement {
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn child(mut self, child: impl Into<VNode>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<VNode>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }
}

impl From<VElement> for VNode {
    fn from(element: VElement) -> Self {
        VNode::Element(element)
    }
}

impl From<&str> for VNode {
    fn from(text: &str) -> Self {
        VNode::text(text)
    }
}

impl From<String> for VNode {
    fn from(text: String) -> Self {
        VNode::text(text)
    }
}

/// Flatten fragments out of a sibling list, recursively.
pub fn flatten(children: &[VNode]) -> Vec<&VNode> {
    let mut flat = Vec::with_capacity(children.len());
    flatten_into(children, &mut flat);
    flat
}

fn flatten_into<'a>(children: &'a [VNode], flat: &mut Vec<&'a VNode>) {
    for child in children {
        match child {
            VNode::Fragment(fragment) => flatten_into(&fragment.children, flat),
            other => flat.push(other),
        }
    }
}

/// Normalize a sibling list. See [`VNode::normalized`].
pub fn normalize(children: &[VNode]) -> Vec<VNode> {
    flatten(children)
        .into_iter()
        .map(|node| match node {
            VNode::Element(element) => VNode::Element(VElement {
                tag: element.tag.clone(),
                key: None,
                attrs: element.attrs.clone(),
                children: normalize(&element.children),
            }),
            other => other.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_compose() {
        let node: VNode = VNode::element("ul")
            .attr("id", "list")
            .children((0..3).map(|i| VNode::element("li").key(i)))
            .into();

        let VNode::Element(list) = &node else {
            panic!("expected an element");
        };
        assert_eq!(list.attrs.get("id").map(String::as_str), Some("list"));
        assert_eq!(list.children.len(), 3);
        assert_eq!(list.children[2].key(), Some(&Key::Int(2)));
    }

    #[test]
    fn nested_fragments_flatten_in_order() {
        let children = vec![
            VNode::text("a"),
            VNode::fragment([
                VNode::text("b"),
                VNode::fragment([VNode::text("c")]),
            ]),
            VNode::fragment(Vec::<VNode>::new()),
            VNode::text("d"),
        ];

        let flat: Vec<_> = flatten(&children)
            .into_iter()
            .map(|node| match node {
                VNode::Text(text) => text.text.as_str(),
                _ => "?",
            })
            .collect();
        assert_eq!(flat, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn normalized_drops_keys_and_fragments() {
        let node: VNode = VNode::element("div")
            .key("root")
            .child(VNode::fragment([VNode::element("span").key(1)]))
            .into();

        let expected: VNode = VNode::element("div").child(VNode::element("span")).into();
        assert_eq!(node.normalized(), vec![expected]);
    }

    #[test]
    fn same_kind_compares_tags() {
        let div: VNode = VNode::element("div").into();
        let span: VNode = VNode::element("span").into();

        assert!(div.same_kind(&VNode::element("div").key(1).into()));
        assert!(!div.same_kind(&span));
        assert!(!div.same_kind(&VNode::text("div")));
        assert!(VNode::text("a").same_kind(&VNode::text("b")));
    }

    #[test]
    fn keys_display_by_kind() {
        assert_eq!(Key::from(7).to_string(), "7");
        assert_eq!(Key::from("row").to_string(), "\"row\"");
    }

    #[test]
    fn vnode_json_shape() {
        let node: VNode = VNode::element("p").key("intro").child("hi").into();
        let json = serde_json::to_value(&node).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "type": "element",
                "tag": "p",
                "key": "intro",
                "children": [{ "type": "text", "text": "hi" }],
            })
        );
        let back: VNode = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }
}
