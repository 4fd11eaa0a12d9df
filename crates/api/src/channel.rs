//! Wire contract of the live authorization channel.
//!
//! The channel is a persistent bidirectional connection carrying JSON-tagged
//! messages. Inbound, the core cares about `PERMISSION_CHANGED` (it reacts by
//! re-fetching the permission tree, never by trusting embedded data) and the
//! heartbeat acknowledgment. Outbound it sends a periodic heartbeat.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::tokens::AccessToken;

/// Messages carried over the channel, tagged by a `type` field.
///
/// `PERMISSION_CHANGED` notifications may carry extra payload fields; they
/// are accepted and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChannelMessage {
    /// Server-side permissions for the current principal changed.
    #[serde(rename = "PERMISSION_CHANGED")]
    PermissionChanged,
    /// Outbound heartbeat.
    #[serde(rename = "ping")]
    Ping,
    /// Heartbeat acknowledgment.
    #[serde(rename = "pong")]
    Pong,
}

impl ChannelMessage {
    /// Encodes the message as a JSON text frame.
    pub fn to_frame(&self) -> String {
        serde_json::to_string(self).expect("channel messages always serialize")
    }
}

/// The write and read halves of one established channel connection.
pub type ChannelPair = (Box<dyn ChannelSink>, Box<dyn ChannelStream>);

/// Factory for channel connections.
///
/// The access token is carried as part of the connection handshake; a
/// rejected token surfaces as a connect error.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    async fn connect(&self, access: &AccessToken) -> ApiResult<ChannelPair>;
}

/// Write half: sends raw text frames.
#[async_trait]
pub trait ChannelSink: Send {
    async fn send(&mut self, frame: &str) -> ApiResult<()>;
}

/// Read half: yields raw text frames, `Ok(None)` on clean close.
#[async_trait]
pub trait ChannelStream: Send {
    async fn next_frame(&mut self) -> ApiResult<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_changed_decodes_with_extra_payload_fields() {
        let msg: ChannelMessage = serde_json::from_str(
            r#"{"type": "PERMISSION_CHANGED", "role": "DOCTOR", "timestamp": "2026-01-01T00:00:00Z"}"#,
        )
        .expect("decodes");
        assert_eq!(msg, ChannelMessage::PermissionChanged);
    }

    #[test]
    fn heartbeat_messages_round_trip() {
        assert_eq!(
            serde_json::to_string(&ChannelMessage::Ping).expect("serializes"),
            r#"{"type":"ping"}"#
        );
        let pong: ChannelMessage =
            serde_json::from_str(r#"{"type":"pong"}"#).expect("deserializes");
        assert_eq!(pong, ChannelMessage::Pong);
    }

    #[test]
    fn unknown_message_type_is_a_decode_error() {
        let result = serde_json::from_str::<ChannelMessage>(r#"{"type":"OCS_CREATED"}"#);
        assert!(result.is_err());
    }
}
