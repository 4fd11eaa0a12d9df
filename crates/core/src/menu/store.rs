//! Permission tree store and access policy.

use std::collections::HashSet;
use std::sync::Arc;

use cdss_types::{MenuCode, Role};

use crate::menu::labels::{resolve_label, LabelOverrides};
use crate::menu::node::MenuNode;
use crate::menu::walk::find_first;

/// The server-confirmed grant set for one principal.
///
/// The system-manager bypass lives here as an explicit short-circuit: the
/// tree itself is never mutated to fake universal grants.
#[derive(Debug, Clone, Default)]
pub struct GrantPolicy {
    grants: HashSet<MenuCode>,
    bypass: bool,
}

impl GrantPolicy {
    /// Policy for a role: system managers bypass individual leaf grants.
    pub fn for_role(role: Role, grants: impl IntoIterator<Item = MenuCode>) -> Self {
        Self {
            grants: grants.into_iter().collect(),
            bypass: role.is_system_manager(),
        }
    }

    /// The empty policy used while logged out.
    pub fn deny_all() -> Self {
        Self::default()
    }

    /// Whether a leaf node is granted.
    pub fn leaf_granted(&self, node: &MenuNode) -> bool {
        debug_assert!(node.is_leaf());
        self.bypass || self.grants.contains(&node.code)
    }

    /// Whether a node is accessible: direct grant for a leaf, OR over all
    /// descendant leaves for a group. Group visibility never implies an
    /// independent capability.
    pub fn node_granted(&self, node: &MenuNode) -> bool {
        if node.is_leaf() {
            return self.leaf_granted(node);
        }
        find_first(&node.children, |n| n.is_leaf() && self.leaf_granted(n)).is_some()
    }
}

/// First path, in depth-first left-to-right order, of a node that is a leaf,
/// not breadcrumb-only, navigable and granted.
///
/// `None` means the principal has nowhere to land: a hard stop for routing.
pub fn first_accessible_path<'a>(tree: &'a [MenuNode], policy: &GrantPolicy) -> Option<&'a str> {
    find_first(tree, |node| {
        node.is_leaf() && !node.breadcrumb_only && node.path.is_some() && policy.leaf_granted(node)
    })
    .and_then(|node| node.path.as_deref())
}

/// Holds the current permission tree and answers access queries.
///
/// The tree is swapped wholesale on every [`replace`](MenuStore::replace):
/// the stored `Arc` changes identity with each snapshot, so stale and fresh
/// grants can never interleave, and consumers holding the previous tree keep
/// a consistent view until they re-query.
#[derive(Debug)]
pub struct MenuStore {
    tree: Arc<Vec<MenuNode>>,
    policy: GrantPolicy,
    overrides: Arc<LabelOverrides>,
    revision: u64,
}

impl MenuStore {
    pub fn new(overrides: Arc<LabelOverrides>) -> Self {
        Self {
            tree: Arc::new(Vec::new()),
            policy: GrantPolicy::deny_all(),
            overrides,
            revision: 0,
        }
    }

    /// Atomically swaps the stored tree and grant policy.
    ///
    /// Bumps the revision, which invalidates memoized derivations such as
    /// the route table.
    pub fn replace(&mut self, tree: Vec<MenuNode>, policy: GrantPolicy) {
        self.tree = Arc::new(tree);
        self.policy = policy;
        self.revision += 1;
    }

    /// Empties the store (logout).
    pub fn clear(&mut self) {
        self.replace(Vec::new(), GrantPolicy::deny_all());
    }

    pub fn tree(&self) -> Arc<Vec<MenuNode>> {
        Arc::clone(&self.tree)
    }

    pub fn policy(&self) -> &GrantPolicy {
        &self.policy
    }

    /// Monotonically increasing; changes exactly when the tree does.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Whether the node with this code is accessible to the current
    /// principal. Unknown codes are simply not granted.
    pub fn is_granted(&self, code: &MenuCode) -> bool {
        find_first(&self.tree, |node| node.code == *code)
            .map(|node| self.policy.node_granted(node))
            .unwrap_or(false)
    }

    /// See [`first_accessible_path`].
    pub fn first_accessible_path(&self) -> Option<String> {
        first_accessible_path(&self.tree, &self.policy).map(str::to_owned)
    }

    /// Resolved display label for the node with this code.
    pub fn label_for(&self, code: &MenuCode, role: Role) -> Option<String> {
        let node = find_first(&self.tree, |node| node.code == *code)?;
        Some(resolve_label(node, role, &self.overrides))
    }
}
