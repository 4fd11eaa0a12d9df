//! Validated runtime form of the permission tree.

use std::collections::HashSet;

use cdss_api::{LabelSet, MenuNodeDto};
use cdss_types::MenuCode;

use crate::error::{CoreError, CoreResult};
use crate::menu::walk::{walk, Step};

/// One node of the permission tree.
///
/// A node with children is a group: it carries no access grant of its own
/// and its visibility derives from its descendant leaves. A node without
/// children is an independently grantable leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuNode {
    pub code: MenuCode,
    pub label: LabelSet,
    pub path: Option<String>,
    pub icon: Option<String>,
    /// Shown in the navigation trail but excluded from the side menu and
    /// from home-path resolution.
    pub breadcrumb_only: bool,
    pub children: Vec<MenuNode>,
}

impl MenuNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    fn from_dto(dto: MenuNodeDto) -> CoreResult<Self> {
        let code = MenuCode::new(&dto.id)
            .map_err(|error| CoreError::MalformedMenu(format!("node id {:?}: {error}", dto.id)))?;
        let children = dto
            .children
            .into_iter()
            .map(Self::from_dto)
            .collect::<CoreResult<Vec<_>>>()?;

        Ok(Self {
            code,
            label: dto.label,
            path: dto.path,
            icon: dto.icon,
            breadcrumb_only: dto.breadcrumb_only,
            children,
        })
    }
}

/// Builds the runtime tree from the wire payload.
///
/// Node ids are validated into [`MenuCode`]s and the tree must be strict:
/// a code appearing under two parents (or twice under one) is rejected as a
/// misconfiguration.
pub fn build_tree(dtos: Vec<MenuNodeDto>) -> CoreResult<Vec<MenuNode>> {
    let roots = dtos
        .into_iter()
        .map(MenuNode::from_dto)
        .collect::<CoreResult<Vec<_>>>()?;

    let mut seen = HashSet::new();
    let mut duplicate = None;
    walk(&roots, &mut |node| {
        if seen.insert(node.code.clone()) {
            Step::Continue
        } else {
            duplicate = Some(node.code.clone());
            Step::Stop
        }
    });

    if let Some(code) = duplicate {
        return Err(CoreError::MalformedMenu(format!(
            "duplicate menu code {code}"
        )));
    }
    Ok(roots)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Shorthand for building nodes in tests.
    pub fn leaf(code: &str, path: Option<&str>, breadcrumb_only: bool) -> MenuNode {
        MenuNode {
            code: MenuCode::new(code).expect("valid code"),
            label: LabelSet::new(),
            path: path.map(str::to_owned),
            icon: None,
            breadcrumb_only,
            children: Vec::new(),
        }
    }

    pub fn group(code: &str, children: Vec<MenuNode>) -> MenuNode {
        MenuNode {
            code: MenuCode::new(code).expect("valid code"),
            label: LabelSet::new(),
            path: None,
            icon: None,
            breadcrumb_only: false,
            children,
        }
    }
}
