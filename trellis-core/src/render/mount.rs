//! Render Loop
//!
//! Ties the two halves of the crate together. A [`RenderRoot`] owns a
//! [`LiveTree`] and an effect that renders a VNode tree, diffs it against
//! the previous one and applies the patches. Every signal the render
//! function reads becomes a dependency of that effect, so the tree follows
//! the state it was rendered from.

use std::cell::{Ref, RefCell};
use std::rc::Rc;
use std::slice;

use tracing::{debug, error, warn};

use super::diff::{diff, diff_children};
use super::executor::{Host, LiveTree};
use super::vnode::VNode;
use crate::error::ReactiveError;
use crate::reactive::{Effect, Runtime};

/// A reactive tree mounted into a host container.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::Runtime;
/// use trellis_core::render::{LiveTree, MemoryHost, RenderRoot, VNode};
///
/// let rt = Runtime::new();
/// let label = rt.signal(String::from("draft"));
///
/// let mut host = MemoryHost::new();
/// let container = host.create_container();
/// let tree = LiveTree::new(host, container);
///
/// let text = label.clone();
/// let root = RenderRoot::mount(&rt, tree, move || {
///     VNode::element("p").child(VNode::text(text.get())).into()
/// })
/// .unwrap();
///
/// label.set("published".into());
/// root.with_tree(|tree| {
///     let expected: VNode = VNode::element("p").child("published").into();
///     assert_eq!(tree.host().snapshot(*tree.container()), vec![expected]);
/// });
/// ```
pub struct RenderRoot<H: Host> {
    tree: Rc<RefCell<LiveTree<H>>>,
    current: Rc<RefCell<Option<VNode>>>,
    effect: Effect,
}

impl<H> RenderRoot<H>
where
    H: Host + 'static,
{
    /// Render once into `tree` (which should be empty), then re-render
    /// whenever a signal read by `render` changes.
    pub fn mount<F>(runtime: &Runtime, tree: LiveTree<H>, render: F) -> Result<Self, ReactiveError>
    where
        F: Fn() -> VNode + 'static,
    {
        let tree = Rc::new(RefCell::new(tree));
        let current: Rc<RefCell<Option<VNode>>> = Rc::new(RefCell::new(None));

        let effect = {
            let (tree, current) = (Rc::clone(&tree), Rc::clone(&current));
            runtime.try_effect(move || {
                let next = render();
                let ops = match current.borrow().as_ref() {
                    Some(previous) => diff(previous, &next),
                    None => diff_children(&[], slice::from_ref(&next)),
                };
                if !ops.is_empty() {
                    debug!(ops = ops.len(), "render pass");
                    let applied = tree.borrow_mut().apply(&ops);
                    if let Err(err) = applied {
                        // The mirror no longer matches the last render. Rebuild.
                        warn!(%err, "render patches did not apply, remounting");
                        let mut tree = tree.borrow_mut();
                        tree.clear();
                        if let Err(err) = tree.mount(&next) {
                            error!(%err, "remount failed");
                            tree.clear();
                            *current.borrow_mut() = None;
                            return;
                        }
                    }
                }
                *current.borrow_mut() = Some(next);
            })?
        };

        Ok(Self {
            tree,
            current,
            effect,
        })
    }

    /// Borrow the live tree.
    pub fn with_tree<R>(&self, f: impl FnOnce(&LiveTree<H>) -> R) -> R {
        f(&self.tree.borrow())
    }

    /// Mutably borrow the live tree.
    ///
    /// Changes made here are not known to the last render. If they make the
    /// next render's patches fail, the root clears the tree and mounts the new
    /// render from scratch.
    pub fn with_tree_mut<R>(&self, f: impl FnOnce(&mut LiveTree<H>) -> R) -> R {
        f(&mut self.tree.borrow_mut())
    }

    /// The VNode tree of the latest render.
    pub fn current(&self) -> Ref<'_, Option<VNode>> {
        self.current.borrow()
    }

    /// Number of render passes so far.
    pub fn renders(&self) -> usize {
        self.effect.run_count()
    }

    /// Stop re-rendering and remove the rendered nodes from the container.
    pub fn unmount(&self) {
        self.effect.dispose();
        self.tree.borrow_mut().clear();
        *self.current.borrow_mut() = None;
    }
}
