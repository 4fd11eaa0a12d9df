//! Operator CLI for inspecting menu snapshots.
//!
//! Loads a permission snapshot (the JSON payload of the menu endpoint) and
//! answers the same questions the front-end asks at runtime: which routes a
//! role can reach, where it lands first, and how its side menu reads.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use cdss_api::MenuSnapshot;
use cdss_core::{
    accessible_routes, build_tree, home_path, resolve_label, ComponentRegistry, GrantPolicy,
    LabelOverrides, MenuNode,
};
use cdss_types::Role;

#[derive(Parser)]
#[command(name = "cdss")]
#[command(about = "CDSS menu and permission inspection CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the routes a role can navigate to
    Routes {
        /// Path to a menu snapshot JSON file
        snapshot: PathBuf,
        /// Role to evaluate (e.g. DOCTOR, NURSE, SYSTEMMANAGER)
        role: String,
    },
    /// Show the default landing route for a role
    Home {
        /// Path to a menu snapshot JSON file
        snapshot: PathBuf,
        /// Role to evaluate
        role: String,
    },
    /// Render the side menu as a role sees it
    Menu {
        /// Path to a menu snapshot JSON file
        snapshot: PathBuf,
        /// Role to evaluate
        role: String,
    },
}

fn load(snapshot: &Path, role: &str) -> Result<(Vec<MenuNode>, GrantPolicy, Role), String> {
    let role: Role = role
        .parse()
        .map_err(|e| format!("invalid role: {e}"))?;
    let contents =
        std::fs::read_to_string(snapshot).map_err(|e| format!("cannot read snapshot: {e}"))?;
    let snapshot: MenuSnapshot =
        serde_json::from_str(&contents).map_err(|e| format!("cannot parse snapshot: {e}"))?;
    let tree = build_tree(snapshot.menus).map_err(|e| format!("invalid menu tree: {e}"))?;
    let policy = GrantPolicy::for_role(role, snapshot.granted);
    Ok((tree, policy, role))
}

/// Registry accepting every code in the tree: the CLI has no component
/// layer, so nothing gets filtered out as unrenderable.
fn registry_for(tree: &[MenuNode]) -> ComponentRegistry {
    let mut codes = Vec::new();
    cdss_core::walk(tree, &mut |node| {
        codes.push(node.code.clone());
        cdss_core::Step::Continue
    });
    ComponentRegistry::new(codes)
}

fn print_menu(
    nodes: &[MenuNode],
    depth: usize,
    role: Role,
    policy: &GrantPolicy,
    overrides: &LabelOverrides,
) {
    for node in nodes {
        if !policy.node_granted(node) {
            continue;
        }
        if node.is_leaf() && node.breadcrumb_only {
            continue;
        }
        let indent = "  ".repeat(depth);
        let label = resolve_label(node, role, overrides);
        match &node.path {
            Some(path) => println!("{indent}{label}  [{path}]"),
            None => println!("{indent}{label}"),
        }
        print_menu(&node.children, depth + 1, role, policy, overrides);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Routes { snapshot, role }) => match load(&snapshot, &role) {
            Ok((tree, policy, role)) => {
                let routes = accessible_routes(&tree, &policy, &registry_for(&tree));
                if routes.is_empty() {
                    println!("No accessible routes for role {role}.");
                } else {
                    for route in routes {
                        println!("{}  {}", route.code, route.path);
                    }
                }
            }
            Err(e) => eprintln!("Error: {e}"),
        },
        Some(Commands::Home { snapshot, role }) => match load(&snapshot, &role) {
            Ok((tree, policy, role)) => match home_path(&tree, &policy) {
                Some(path) => println!("{path}"),
                None => println!("No accessible home path for role {role}."),
            },
            Err(e) => eprintln!("Error: {e}"),
        },
        Some(Commands::Menu { snapshot, role }) => match load(&snapshot, &role) {
            Ok((tree, policy, role)) => {
                print_menu(&tree, 0, role, &policy, &LabelOverrides::new())
            }
            Err(e) => eprintln!("Error: {e}"),
        },
        None => {
            println!("Use 'cdss --help' for commands");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SNAPSHOT: &str = r#"{
        "menus": [
            {
                "id": "ADMIN",
                "label": {"DEFAULT": "Administration"},
                "children": [
                    {"id": "ADMIN_USER", "label": {"DEFAULT": "User Management"}, "path": "/admin/users"},
                    {"id": "ADMIN_AUDIT_LOG", "label": {"ADMIN": "Access Audit Log"}, "path": "/admin/audit", "breadcrumbOnly": true}
                ]
            },
            {"id": "DASHBOARD", "label": {"DEFAULT": "Dashboard"}, "path": "/dashboard"}
        ],
        "granted": ["ADMIN_USER", "ADMIN_AUDIT_LOG"]
    }"#;

    fn snapshot_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(SNAPSHOT.as_bytes()).expect("write snapshot");
        file
    }

    #[test]
    fn load_builds_tree_and_policy() {
        let file = snapshot_file();
        let (tree, policy, _role) = load(file.path(), "ADMIN").expect("loads");

        assert_eq!(tree.len(), 2);
        let routes = accessible_routes(&tree, &policy, &registry_for(&tree));
        let codes: Vec<_> = routes.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, ["ADMIN_USER"]);
        assert_eq!(home_path(&tree, &policy).as_deref(), Some("/admin/users"));
    }

    #[test]
    fn load_rejects_unknown_roles() {
        let file = snapshot_file();
        let err = load(file.path(), "JANITOR").expect_err("rejected");
        assert!(err.contains("invalid role"));
    }

    #[test]
    fn system_manager_sees_everything() {
        let file = snapshot_file();
        let (tree, policy, _role) = load(file.path(), "SYSTEMMANAGER").expect("loads");

        let routes = accessible_routes(&tree, &policy, &registry_for(&tree));
        let codes: Vec<_> = routes.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, ["ADMIN_USER", "DASHBOARD"]);
    }
}
