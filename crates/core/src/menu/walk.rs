//! Generic depth-first traversal over the permission tree.
//!
//! One walker is shared by the grant check, home-path resolution and route
//! flattening, so traversal order can never diverge between them.

use crate::menu::node::MenuNode;

/// Visitor control for [`walk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Descend into this node's children.
    Continue,
    /// Skip this node's children but keep walking siblings.
    SkipChildren,
    /// Abort the walk.
    Stop,
}

/// Depth-first, left-to-right walk over `nodes`.
///
/// Returns `true` if the visitor stopped the walk.
pub fn walk<'a>(nodes: &'a [MenuNode], visit: &mut dyn FnMut(&'a MenuNode) -> Step) -> bool {
    for node in nodes {
        match visit(node) {
            Step::Continue => {
                if walk(&node.children, visit) {
                    return true;
                }
            }
            Step::SkipChildren => {}
            Step::Stop => return true,
        }
    }
    false
}

/// First node, in depth-first left-to-right order, matching the predicate.
pub fn find_first<'a>(
    nodes: &'a [MenuNode],
    mut pred: impl FnMut(&MenuNode) -> bool,
) -> Option<&'a MenuNode> {
    let mut found = None;
    walk(nodes, &mut |node| {
        if pred(node) {
            found = Some(node);
            Step::Stop
        } else {
            Step::Continue
        }
    });
    found
}
