//! Live authorization channel: a persistent connection that notifies the
//! session service when server-side permissions change.

pub(crate) mod driver;
pub mod state;

pub use state::{ChannelMachine, ChannelState, ReconnectDecision};
