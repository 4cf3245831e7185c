//! WebRTC negotiation envelopes carried on `agent_signal`.
//!
//! The payload is opaque SDP or ICE data; only the envelope is validated.

use serde::Serialize;
use serde_json::Value;
use vworld_schema::{Fields, SchemaResult};

use crate::channel::{Channel, Frame};

const RECORD: &str = "signal";

vworld_schema::closed_label! {
    /// Negotiation step.
    pub enum SignalType {
        /// SDP offer
        Offer => "agent-agent-offer-packet",
        /// SDP answer
        Answer => "agent-agent-answer-packet",
        /// Trickled ICE candidate
        IceCandidate => "agent-agent-ice-candidate-packet",
    }
}

/// One signal between two agents.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalMessage {
    /// Negotiation step
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    /// Sending agent
    pub sender_agent_id: String,
    /// Receiving agent
    pub target_agent_id: String,
    /// Opaque SDP/ICE body
    pub payload: Value,
}

impl SignalMessage {
    /// Builds a signal.
    #[must_use]
    pub fn new(
        signal_type: SignalType,
        sender_agent_id: impl Into<String>,
        target_agent_id: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            signal_type,
            sender_agent_id: sender_agent_id.into(),
            target_agent_id: target_agent_id.into(),
            payload,
        }
    }

    /// Validates a raw envelope. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// `SchemaViolation` naming the first bad envelope field.
    pub fn decode(raw: &Value) -> SchemaResult<Self> {
        let f = Fields::root(RECORD, raw)?;
        let message = Self {
            signal_type: f.req_label("type")?,
            sender_agent_id: f.req_non_blank("senderAgentId")?,
            target_agent_id: f.req_non_blank("targetAgentId")?,
            payload: f.opt_value("payload").unwrap_or(Value::Null),
        };
        if message.sender_agent_id == message.target_agent_id {
            return Err(f.violation("targetAgentId", "must differ from senderAgentId"));
        }
        Ok(message)
    }

    /// Wire form.
    #[must_use]
    pub fn encode(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Frame ready for the broadcast channel.
    #[must_use]
    pub fn to_frame(&self) -> Frame {
        Frame::new(Channel::Signal, self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_offer() {
        let raw = json!({
            "type": "agent-agent-offer-packet",
            "senderAgentId": "a-1",
            "targetAgentId": "a-2",
            "payload": {"sdp": "v=0", "kind": "offer"},
            "hop": 1
        });
        let signal = SignalMessage::decode(&raw).unwrap();
        assert_eq!(signal.signal_type, SignalType::Offer);
        assert_eq!(signal.payload["sdp"], "v=0");

        let again = SignalMessage::decode(&signal.encode()).unwrap();
        assert_eq!(again, signal);
    }

    #[test]
    fn test_decode_rejects_bad_envelopes() {
        let err = SignalMessage::decode(&json!({
            "type": "agent-agent-hangup-packet", "senderAgentId": "a", "targetAgentId": "b"
        }))
        .unwrap_err();
        assert_eq!(err.field(), Some("type"));

        let err = SignalMessage::decode(&json!({
            "type": "agent-agent-answer-packet", "senderAgentId": "a"
        }))
        .unwrap_err();
        assert_eq!(err.field(), Some("targetAgentId"));

        let err = SignalMessage::decode(&json!({
            "type": "agent-agent-answer-packet", "senderAgentId": "a", "targetAgentId": "a"
        }))
        .unwrap_err();
        assert_eq!(err.field(), Some("targetAgentId"));

        let err = SignalMessage::decode(&json!("offer")).unwrap_err();
        assert!(err.is_schema_violation());
    }
}
