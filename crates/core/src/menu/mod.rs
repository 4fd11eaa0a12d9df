//! The hierarchical menu/permission tree and its access queries.

pub mod labels;
pub mod node;
pub mod store;
pub mod walk;

pub use labels::{resolve_label, LabelOverrides};
pub use node::{build_tree, MenuNode};
pub use store::{first_accessible_path, GrantPolicy, MenuStore};
pub use walk::{find_first, walk, Step};
