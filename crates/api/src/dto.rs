//! Wire payloads returned by the server auth endpoints.

use std::collections::BTreeMap;

use cdss_types::{MenuCode, Role};
use serde::{Deserialize, Serialize};

/// Identity and role of the authenticated principal, as described by the
/// "validate/describe current principal" endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalInfo {
    pub id: String,
    pub display_name: String,
    pub role: Role,
}

/// Role-keyed display labels for one menu node.
///
/// On the wire this is a map whose keys are either `DEFAULT` or a role
/// spelling. Keys that match neither are ignored with a diagnostic so that a
/// new backend role does not break menu decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet {
    default: Option<String>,
    by_role: BTreeMap<Role, String>,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fallback label used when no role-specific label exists.
    pub fn with_default(mut self, label: impl Into<String>) -> Self {
        self.default = Some(label.into());
        self
    }

    /// Sets the label shown to principals with the given role.
    pub fn with_role(mut self, role: Role, label: impl Into<String>) -> Self {
        self.by_role.insert(role, label.into());
        self
    }

    pub fn for_role(&self, role: Role) -> Option<&str> {
        self.by_role.get(&role).map(String::as_str)
    }

    pub fn default_label(&self) -> Option<&str> {
        self.default.as_deref()
    }
}

impl Serialize for LabelSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let len = self.by_role.len() + usize::from(self.default.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        if let Some(default) = &self.default {
            map.serialize_entry("DEFAULT", default)?;
        }
        for (role, label) in &self.by_role {
            map.serialize_entry(role.wire_name(), label)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for LabelSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
        let mut labels = LabelSet::new();
        for (key, value) in raw {
            if key == "DEFAULT" {
                labels.default = Some(value);
            } else if let Ok(role) = key.parse::<Role>() {
                labels.by_role.insert(role, value);
            } else {
                tracing::warn!(key = %key, "ignoring unknown menu label key");
            }
        }
        Ok(labels)
    }
}

/// One node of the permission tree as the server sends it.
///
/// A node with children is a group and carries no grant of its own; a node
/// without children is an independently grantable leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuNodeDto {
    pub id: String,
    #[serde(default)]
    pub label: LabelSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub breadcrumb_only: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MenuNodeDto>,
}

/// The full result of one permission fetch: the ordered root nodes plus the
/// server-confirmed grant set of leaf codes.
///
/// Snapshots are always applied by full replace, never patched, so stale and
/// fresh grants can never interleave.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuSnapshot {
    #[serde(default)]
    pub menus: Vec<MenuNodeDto>,
    #[serde(default)]
    pub granted: Vec<MenuCode>,
}
