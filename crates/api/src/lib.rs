//! # CDSS API
//!
//! Boundary contracts between the CDSS session core and the hospital backend.
//!
//! This crate defines:
//! - the server auth endpoints the core consumes ([`AuthApi`]),
//! - the wire payloads those endpoints return ([`PrincipalInfo`],
//!   [`MenuSnapshot`], [`MenuNodeDto`]),
//! - the credential token types ([`TokenPair`]),
//! - the live authorization channel contract ([`ChannelMessage`],
//!   [`ChannelTransport`]).
//!
//! **No transport concerns**: actual HTTP/WebSocket implementations live
//! outside the core and plug in through the traits defined here.

pub mod auth;
pub mod channel;
pub mod dto;
pub mod error;
pub mod tokens;

pub use auth::AuthApi;
pub use channel::{ChannelMessage, ChannelPair, ChannelSink, ChannelStream, ChannelTransport};
pub use dto::{LabelSet, MenuNodeDto, MenuSnapshot, PrincipalInfo};
pub use error::{ApiError, ApiResult};
pub use tokens::{AccessToken, RefreshToken, TokenPair};
