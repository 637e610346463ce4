//! Diff Engine
//!
//! Keyed reconciliation of two VNode trees into a [`PatchOp`] list.
//!
//! # Algorithm
//!
//! Each sibling list (after fragment flattening) is reconciled on its own:
//!
//! 1. Build a key → old position map. With duplicate keys the last
//!    occurrence wins, in both lists; earlier duplicates are never reused.
//! 2. Match every new child: keyed children by key, unkeyed children with
//!    the unkeyed old child at the same position.
//! 3. Emit a `Remove` for every old child nobody matched.
//! 4. Take the old positions of the reused children in new order and keep
//!    their longest increasing subsequence in place. Walking the new list
//!    back to front, every other reused child gets one `Move`, every
//!    unmatched one a `Create`, and every matched pair of different kinds a
//!    `Replace`, each anchored before its (already placed) next sibling.
//! 5. Recurse into the reused pairs for attributes, text and children.
//!
//! The number of moves is minimal for the given matching: reversing N keyed
//! children costs N - 1 moves, rotating by one costs a single move.

use std::collections::HashMap;
use std::ptr;
use std::slice;

use indexmap::IndexMap;
use tracing::debug;

use super::lis::longest_increasing_subsequence;
use super::patch::{count_kinds, Anchor, NodePath, NodeRef, PatchOp};
use super::vnode::{flatten, Key, VElement, VNode};

/// Diff two trees mounted as the only child of a container.
///
/// Diffing a tree against itself yields no operations.
pub fn diff(old: &VNode, new: &VNode) -> Vec<PatchOp> {
    if ptr::eq(old, new) {
        return Vec::new();
    }
    diff_children(slice::from_ref(old), slice::from_ref(new))
}

/// Diff two top-level sibling lists of a container.
///
/// `diff_children(&[], nodes)` is the patch list that mounts `nodes` into
/// an empty container.
pub fn diff_children(old: &[VNode], new: &[VNode]) -> Vec<PatchOp> {
    let mut differ = Differ::default();
    differ.children(
        &NodeRef::Root,
        &NodePath::root(),
        &NodePath::root(),
        old,
        new,
    );

    if !differ.ops.is_empty() {
        debug!(ops = differ.ops.len(), kinds = ?count_kinds(&differ.ops), "diff complete");
    }
    differ.ops
}

#[derive(Default)]
struct Differ {
    ops: Vec<PatchOp>,
}

impl Differ {
    fn children(
        &mut self,
        parent: &NodeRef,
        old_base: &NodePath,
        new_base: &NodePath,
        old: &[VNode],
        new: &[VNode],
    ) {
        if ptr::eq(old, new) {
            return;
        }
        let old = flatten(old);
        let new = flatten(new);
        if old.is_empty() && new.is_empty() {
            return;
        }

        let matches = match_children(&old, &new);

        let mut claimed = vec![false; old.len()];
        for &index in matches.iter().flatten() {
            claimed[index] = true;
        }
        for index in (0..old.len()).filter(|&index| !claimed[index]) {
            self.ops.push(PatchOp::Remove {
                target: NodeRef::Old(old_base.child(index)),
            });
        }

        // Reused pairs of the same kind, as (new position, old position).
        let reused: Vec<(usize, usize)> = matches
            .iter()
            .enumerate()
            .filter_map(|(new_index, matched)| {
                let old_index = (*matched)?;
                old[old_index]
                    .same_kind(new[new_index])
                    .then_some((new_index, old_index))
            })
            .collect();
        let old_order: Vec<usize> = reused.iter().map(|&(_, old_index)| old_index).collect();
        let mut stable = vec![false; new.len()];
        for position in longest_increasing_subsequence(&old_order) {
            stable[reused[position].0] = true;
        }

        let mut anchor = Anchor::End;
        for new_index in (0..new.len()).rev() {
            let path = new_base.child(new_index);
            match matches[new_index] {
                None => {
                    self.ops.push(PatchOp::Create {
                        parent: parent.clone(),
                        before: anchor,
                        path: path.clone(),
                        node: new[new_index].clone(),
                    });
                    anchor = Anchor::Before(NodeRef::New(path));
                }
                Some(old_index) if !old[old_index].same_kind(new[new_index]) => {
                    self.ops.push(PatchOp::Replace {
                        target: NodeRef::Old(old_base.child(old_index)),
                        parent: parent.clone(),
                        before: anchor,
                        path: path.clone(),
                        node: new[new_index].clone(),
                    });
                    anchor = Anchor::Before(NodeRef::New(path));
                }
                Some(old_index) => {
                    let target = NodeRef::Old(old_base.child(old_index));
                    if !stable[new_index] {
                        self.ops.push(PatchOp::Move {
                            target: target.clone(),
                            parent: parent.clone(),
                            before: anchor,
                        });
                    }
                    anchor = Anchor::Before(target);
                }
            }
        }

        for (new_index, old_index) in reused {
            self.node(
                old[old_index],
                new[new_index],
                &old_base.child(old_index),
                &new_base.child(new_index),
            );
        }
    }

    /// Patch a reused pair in place.
    fn node(&mut self, old: &VNode, new: &VNode, old_path: &NodePath, new_path: &NodePath) {
        if ptr::eq(old, new) {
            return;
        }
        match (old, new) {
            (VNode::Text(before), VNode::Text(after)) => {
                if before.text != after.text {
                    self.ops.push(PatchOp::UpdateText {
                        target: NodeRef::Old(old_path.clone()),
                        text: after.text.clone(),
                    });
                }
            }
            (VNode::Element(before), VNode::Element(after)) => {
                self.attributes(before, after, old_path);
                self.children(
                    &NodeRef::Old(old_path.clone()),
                    old_path,
                    new_path,
                    &before.children,
                    &after.children,
                );
            }
            // Pairs of different kinds were replaced during placement.
            _ => {}
        }
    }

    fn attributes(&mut self, old: &VElement, new: &VElement, path: &NodePath) {
        let set: IndexMap<String, String> = new
            .attrs
            .iter()
            .filter(|(name, value)| old.attrs.get(*name) != Some(*value))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        let remove: Vec<String> = old
            .attrs
            .keys()
            .filter(|name| !new.attrs.contains_key(*name))
            .cloned()
            .collect();

        if !set.is_empty() || !remove.is_empty() {
            self.ops.push(PatchOp::UpdateAttributes {
                target: NodeRef::Old(path.clone()),
                set,
                remove,
            });
        }
    }
}

/// For every new child, the old position it reuses, if any.
fn match_children(old: &[&VNode], new: &[&VNode]) -> Vec<Option<usize>> {
    let mut old_keys: HashMap<&Key, usize> = HashMap::new();
    for (index, node) in old.iter().enumerate() {
        if let Some(key) = node.key() {
            old_keys.insert(key, index);
        }
    }
    let mut last_new: HashMap<&Key, usize> = HashMap::new();
    for (index, node) in new.iter().enumerate() {
        if let Some(key) = node.key() {
            last_new.insert(key, index);
        }
    }

    new.iter()
        .enumerate()
        .map(|(index, node)| match node.key() {
            Some(key) if last_new.get(key) == Some(&index) => old_keys.get(key).copied(),
            Some(_) => None,
            None => old
                .get(index)
                .filter(|candidate| candidate.key().is_none())
                .map(|_| index),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::PatchKind;

    fn item(key: i64) -> VNode {
        VNode::element("li").key(key).child(VNode::text(key.to_string())).into()
    }

    fn list(keys: &[i64]) -> VNode {
        VNode::element("ul").children(keys.iter().map(|&key| item(key))).into()
    }

    fn kinds(ops: &[PatchOp]) -> Vec<PatchKind> {
        ops.iter().map(PatchOp::kind).collect()
    }

    #[test]
    fn identical_trees_produce_nothing() {
        let tree = list(&[1, 2, 3]);
        assert!(diff(&tree, &tree).is_empty());
        assert!(diff(&tree, &tree.clone()).is_empty());
    }

    #[test]
    fn text_change_updates_in_place() {
        let ops = diff(&VNode::text("a"), &VNode::text("b"));
        assert_eq!(
            ops,
            vec![PatchOp::UpdateText {
                target: NodeRef::Old(NodePath::from_indices([0])),
                text: "b".into(),
            }]
        );
    }

    #[test]
    fn attribute_changes_are_grouped() {
        let old: VNode = VNode::element("a").attr("href", "/x").attr("id", "n").into();
        let new: VNode = VNode::element("a").attr("href", "/y").attr("rel", "me").into();

        let ops = diff(&old, &new);
        let [PatchOp::UpdateAttributes { set, remove, .. }] = ops.as_slice() else {
            panic!("expected one attribute update, got {ops:?}");
        };
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("href").map(String::as_str), Some("/y"));
        assert_eq!(remove, &vec!["id".to_string()]);
    }

    #[test]
    fn tag_change_is_a_replace() {
        let ops = diff(&VNode::element("div").into(), &VNode::element("span").into());
        assert_eq!(kinds(&ops), vec![PatchKind::Replace]);
    }

    #[test]
    fn removes_come_first() {
        let ops = diff(&list(&[1, 2, 3]), &list(&[3, 4]));
        let kinds = kinds(&ops);

        assert_eq!(&kinds[..2], &[PatchKind::Remove, PatchKind::Remove]);
        assert_eq!(kinds.iter().filter(|k| **k == PatchKind::Create).count(), 1);
        assert_eq!(kinds.iter().filter(|k| **k == PatchKind::Move).count(), 0);
    }

    #[test]
    fn rotation_is_one_move() {
        let ops = diff(&list(&[1, 2, 3, 4]), &list(&[4, 1, 2, 3]));
        assert_eq!(
            ops,
            vec![PatchOp::Move {
                target: NodeRef::Old(NodePath::from_indices([0, 3])),
                parent: NodeRef::Old(NodePath::from_indices([0])),
                before: Anchor::Before(NodeRef::Old(NodePath::from_indices([0, 0]))),
            }]
        );
    }

    #[test]
    fn unkeyed_children_match_by_position() {
        let old: VNode = VNode::element("p").child("a").child("b").into();
        let new: VNode = VNode::element("p").child("a").child("c").child("d").into();

        let ops = diff(&old, &new);
        assert_eq!(kinds(&ops), vec![PatchKind::Create, PatchKind::UpdateText]);
    }

    #[test]
    fn keyed_child_never_matches_unkeyed() {
        let old: VNode = VNode::element("ul").child(VNode::element("li")).into();
        let new: VNode = VNode::element("ul").child(VNode::element("li").key(1)).into();

        assert_eq!(kinds(&diff(&old, &new)), vec![PatchKind::Remove, PatchKind::Create]);
    }

    #[test]
    fn duplicate_new_keys_reuse_the_last() {
        let (old, new) = ([item(1)], [item(1), item(1)]);
        let old: Vec<&VNode> = old.iter().collect();
        let new: Vec<&VNode> = new.iter().collect();

        assert_eq!(match_children(&old, &new), vec![None, Some(0)]);
    }

    #[test]
    fn duplicate_old_keys_keep_the_last() {
        let ops = diff(&list(&[7, 7]), &list(&[7]));
        assert_eq!(
            ops,
            vec![PatchOp::Remove {
                target: NodeRef::Old(NodePath::from_indices([0, 0])),
            }]
        );
    }

    #[test]
    fn fragments_are_transparent() {
        let old: VNode = VNode::element("div")
            .child(VNode::fragment([item(1), item(2)]))
            .child(item(3))
            .into();
        let new = VNode::element("div").children([item(1), item(2), item(3)]).into();

        assert!(diff(&old, &new).is_empty());
    }
}
