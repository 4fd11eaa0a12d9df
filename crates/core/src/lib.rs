//! # CDSS Core
//!
//! Session, permission and routing core of the CDSS front-end.
//!
//! This crate contains the authorization model and its orchestration:
//! - Session clock with idle-timeout warning and expiry
//! - Permission tree store with access queries and label resolution
//! - Live authorization channel (typed state machine + async driver)
//! - Auth session service: login/logout/refresh orchestration
//! - Route resolution: accessible routes and the home path
//!
//! **No transport concerns**: HTTP and socket implementations plug in
//! through the `cdss-api` traits. **No rendering concerns**: the route
//! table maps paths to menu codes; components belong to the presentation
//! layer.

pub mod channel;
pub mod config;
pub mod credentials;
pub mod error;
pub mod menu;
pub mod routes;
pub mod session;

pub use channel::{ChannelMachine, ChannelState, ReconnectDecision};
pub use config::{seconds_from_env_value, CoreConfig};
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::{CoreError, CoreResult};
pub use menu::{
    build_tree, find_first, resolve_label, walk, GrantPolicy, LabelOverrides, MenuNode, MenuStore,
    Step,
};
pub use routes::{accessible_routes, home_path, ComponentRegistry, RouteEntry, RouteTable};
pub use session::{ClockEvent, Principal, SessionClock, SessionService};
