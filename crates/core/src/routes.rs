//! Route derivation from the permission tree.
//!
//! These are pure functions over the tree so they can be tested
//! independently of store state; the session service memoizes the result
//! per store revision and recomputes whenever the tree is replaced.

use std::collections::HashSet;

use cdss_types::MenuCode;

use crate::menu::store::{first_accessible_path, GrantPolicy};
use crate::menu::walk::{walk, Step};
use crate::menu::MenuNode;

/// The set of menu codes the presentation layer can actually render.
///
/// The code-to-component mapping itself is owned by the presentation layer;
/// the core only needs membership so a misconfigured menu entry can be
/// skipped instead of breaking the whole navigation.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    codes: HashSet<MenuCode>,
}

impl ComponentRegistry {
    pub fn new(codes: impl IntoIterator<Item = MenuCode>) -> Self {
        Self {
            codes: codes.into_iter().collect(),
        }
    }

    pub fn contains(&self, code: &MenuCode) -> bool {
        self.codes.contains(code)
    }
}

/// One navigable entry derived from the tree.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RouteEntry {
    pub code: MenuCode,
    pub path: String,
    pub icon: Option<String>,
}

/// Flattens the tree into the navigable entries for the given policy.
///
/// A node is included iff it is a leaf, has a path, is not breadcrumb-only
/// and is granted. Group nodes are never routable; only their accessible
/// leaf descendants are. A leaf whose code has no registered component is
/// skipped with a diagnostic, never a failure.
pub fn accessible_routes(
    tree: &[MenuNode],
    policy: &GrantPolicy,
    registry: &ComponentRegistry,
) -> Vec<RouteEntry> {
    let mut entries = Vec::new();
    walk(tree, &mut |node| {
        if !node.is_leaf() {
            return Step::Continue;
        }
        let Some(path) = &node.path else {
            return Step::Continue;
        };
        if node.breadcrumb_only || !policy.leaf_granted(node) {
            return Step::Continue;
        }
        if !registry.contains(&node.code) {
            tracing::warn!(code = %node.code, "menu entry has no registered component; skipping");
            return Step::Continue;
        }
        entries.push(RouteEntry {
            code: node.code.clone(),
            path: path.clone(),
            icon: node.icon.clone(),
        });
        Step::Continue
    });
    entries
}

/// The default landing route for the policy: the same traversal as the
/// store's first-accessible-path query.
pub fn home_path(tree: &[MenuNode], policy: &GrantPolicy) -> Option<String> {
    first_accessible_path(tree, policy).map(str::to_owned)
}

/// Derived, memoized mapping from navigable path to owning menu code.
///
/// Never mutated directly: always rebuilt from the store so the table and
/// the tree cannot diverge.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RouteTable {
    revision: u64,
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub(crate) fn build(
        revision: u64,
        tree: &[MenuNode],
        policy: &GrantPolicy,
        registry: &ComponentRegistry,
    ) -> Self {
        Self {
            revision,
            entries: accessible_routes(tree, policy, registry),
        }
    }

    /// The store revision this table was derived from.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn lookup(&self, path: &str) -> Option<&RouteEntry> {
        self.entries.iter().find(|entry| entry.path == path)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::node::test_support::{group, leaf};
    use cdss_types::Role;

    fn code(s: &str) -> MenuCode {
        MenuCode::new(s).expect("valid code")
    }

    fn admin_tree() -> Vec<MenuNode> {
        vec![group(
            "ADMIN",
            vec![
                leaf("ADMIN_USER", Some("/admin/users"), false),
                leaf("ADMIN_AUDIT", Some("/admin/audit"), true),
            ],
        )]
    }

    fn registry_for(tree: &[MenuNode]) -> ComponentRegistry {
        let mut codes = Vec::new();
        walk(tree, &mut |node| {
            codes.push(node.code.clone());
            Step::Continue
        });
        ComponentRegistry::new(codes)
    }

    #[test]
    fn groups_are_never_routable_and_breadcrumbs_are_excluded() {
        // Both admin leaves granted; audit is breadcrumb-only.
        let tree = admin_tree();
        let policy = GrantPolicy::for_role(Role::Admin, [code("ADMIN_USER"), code("ADMIN_AUDIT")]);

        let routes = accessible_routes(&tree, &policy, &registry_for(&tree));
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].code.as_str(), "ADMIN_USER");
        assert_eq!(routes[0].path, "/admin/users");

        assert_eq!(home_path(&tree, &policy).as_deref(), Some("/admin/users"));
    }

    #[test]
    fn no_grants_means_no_routes_and_no_home() {
        let tree = vec![
            leaf("DASHBOARD", Some("/dashboard"), false),
            leaf("PATIENT_LIST", Some("/patients"), false),
            leaf("ORDER_LIST", Some("/orders"), false),
        ];
        let policy = GrantPolicy::for_role(Role::Doctor, []);

        let routes = accessible_routes(&tree, &policy, &registry_for(&tree));
        assert!(routes.is_empty());
        assert_eq!(home_path(&tree, &policy), None);
    }

    #[test]
    fn system_manager_bypass_includes_every_leaf_except_breadcrumbs() {
        let tree = admin_tree();
        let policy = GrantPolicy::for_role(Role::SystemManager, []);

        let routes = accessible_routes(&tree, &policy, &registry_for(&tree));
        let codes: Vec<_> = routes.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, ["ADMIN_USER"]);

        // With a non-breadcrumb sibling, both leaves appear.
        let tree = vec![group(
            "ADMIN",
            vec![
                leaf("ADMIN_USER", Some("/admin/users"), false),
                leaf("ADMIN_MONITOR", Some("/admin/monitor"), false),
            ],
        )];
        let routes = accessible_routes(&tree, &policy, &registry_for(&tree));
        assert_eq!(routes.len(), 2);
    }

    #[test]
    fn unregistered_codes_are_skipped_not_fatal() {
        let tree = vec![
            leaf("DASHBOARD", Some("/dashboard"), false),
            leaf("ORPHANED", Some("/orphaned"), false),
        ];
        let policy = GrantPolicy::for_role(Role::Doctor, [code("DASHBOARD"), code("ORPHANED")]);
        let registry = ComponentRegistry::new([code("DASHBOARD")]);

        let routes = accessible_routes(&tree, &policy, &registry);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].code.as_str(), "DASHBOARD");
    }

    #[test]
    fn route_table_lookup_finds_entries_by_path() {
        let tree = admin_tree();
        let policy = GrantPolicy::for_role(Role::Admin, [code("ADMIN_USER")]);
        let table = RouteTable::build(7, &tree, &policy, &registry_for(&tree));

        assert_eq!(table.revision(), 7);
        assert!(table.lookup("/admin/users").is_some());
        assert!(table.lookup("/admin/audit").is_none());
    }
}
