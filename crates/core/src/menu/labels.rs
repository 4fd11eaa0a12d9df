//! Display label resolution.
//!
//! Resolution order for a node's label: role-specific override table →
//! node's own per-role label map → node's default label → raw node code.
//! The raw-code fallback should not occur in well-formed configuration.

use std::collections::HashMap;

use cdss_types::{MenuCode, Role};

use crate::menu::node::MenuNode;

/// Application-supplied label overrides keyed by menu code and role.
#[derive(Debug, Clone, Default)]
pub struct LabelOverrides {
    by_code: HashMap<MenuCode, HashMap<Role, String>>,
}

impl LabelOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code: MenuCode, role: Role, label: impl Into<String>) {
        self.by_code
            .entry(code)
            .or_default()
            .insert(role, label.into());
    }

    pub fn get(&self, code: &MenuCode, role: Role) -> Option<&str> {
        self.by_code
            .get(code)
            .and_then(|by_role| by_role.get(&role))
            .map(String::as_str)
    }
}

/// Resolves the display label for `node` as seen by `role`.
pub fn resolve_label(node: &MenuNode, role: Role, overrides: &LabelOverrides) -> String {
    if let Some(label) = overrides.get(&node.code, role) {
        return label.to_owned();
    }
    if let Some(label) = node.label.for_role(role) {
        return label.to_owned();
    }
    if let Some(label) = node.label.default_label() {
        return label.to_owned();
    }
    node.code.as_str().to_owned()
}
