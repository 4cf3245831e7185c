//! Channel names and the frames that travel on them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vworld_schema::{Label, SchemaError, SchemaResult};

vworld_schema::closed_label! {
    /// A realtime channel.
    pub enum Channel {
        /// Broadcast channel for WebRTC negotiation
        Signal => "agent_signal",
        /// Presence channel, last write wins per agent
        Presence => "agent_presence",
    }
}

impl Channel {
    /// True for fire-and-forget broadcast channels.
    #[must_use]
    pub const fn is_broadcast(self) -> bool {
        matches!(self, Self::Signal)
    }

    /// Looks up a channel by wire name.
    ///
    /// # Errors
    ///
    /// `SchemaViolation` on `frame.channel` for an unknown name.
    pub fn parse(name: &str) -> SchemaResult<Self> {
        Self::from_label(name).ok_or_else(|| {
            SchemaError::schema(
                "frame",
                "channel",
                format!("must be one of {}", Self::expected()),
            )
        })
    }
}

/// One raw message as delivered by the transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Channel name as sent; may be unknown
    pub channel: String,
    /// Undecoded message body
    pub payload: Value,
}

impl Frame {
    /// Frame on a known channel.
    #[must_use]
    pub fn new(channel: Channel, payload: Value) -> Self {
        Self {
            channel: channel.as_str().to_string(),
            payload,
        }
    }
}
