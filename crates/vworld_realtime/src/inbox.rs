//! # Realtime Inbox
//!
//! The transport pushes raw [`Frame`]s through a [`FrameSender`]; the
//! consumer calls [`RealtimeInbox::drain`] on its own schedule.
//!
//! ```text
//! transport ──► FrameSender ──► bounded channel ──► drain()
//!                                                     ├─ presence ──► PresenceBoard
//!                                                     ├─ signals  ──► caller
//!                                                     └─ rejected ──► caller (warn!)
//! ```
//!
//! Delivery is at-most-once: a full buffer drops the frame at the sender,
//! and an undecodable frame is dropped at the inbox with a reported
//! `SchemaViolation`.

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::warn;
use vworld_schema::SchemaError;

use crate::channel::{Channel, Frame};
use crate::config::PresenceConfig;
use crate::error::{RealtimeError, RealtimeResult};
use crate::presence::{AgentPresence, PresenceBoard, PresenceUpdate};
use crate::signal::SignalMessage;

/// Publishing end of an inbox. Cheap to clone, one per transport thread.
#[derive(Clone, Debug)]
pub struct FrameSender {
    sender: Sender<Frame>,
    capacity: usize,
}

impl FrameSender {
    /// Queues a frame without blocking.
    ///
    /// # Errors
    ///
    /// `Full` when the buffer is full, `Disconnected` once the inbox is gone.
    pub fn publish(&self, frame: Frame) -> RealtimeResult<()> {
        self.sender.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => RealtimeError::Full {
                capacity: self.capacity,
            },
            TrySendError::Disconnected(_) => RealtimeError::Disconnected,
        })
    }
}

/// Everything one [`RealtimeInbox::drain`] produced.
#[derive(Debug, Default)]
pub struct InboxBatch {
    /// Decoded signals, in arrival order
    pub signals: Vec<SignalMessage>,
    /// Presence outcomes per agent, in arrival order
    pub presence: Vec<(String, PresenceUpdate)>,
    /// Frames dropped as undecodable
    pub rejected: Vec<SchemaError>,
}

impl InboxBatch {
    /// True when nothing arrived.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty() && self.presence.is_empty() && self.rejected.is_empty()
    }
}

/// Consuming end: decodes frames and owns the presence board.
#[derive(Debug)]
pub struct RealtimeInbox {
    sender: Sender<Frame>,
    receiver: Receiver<Frame>,
    capacity: usize,
    board: PresenceBoard,
}

impl RealtimeInbox {
    /// Inbox buffering up to `config.inbox_capacity` frames.
    #[must_use]
    pub fn new(config: &PresenceConfig) -> Self {
        let (sender, receiver) = bounded(config.inbox_capacity);
        Self {
            sender,
            receiver,
            capacity: config.inbox_capacity,
            board: PresenceBoard::new(config),
        }
    }

    /// A publishing handle for the transport.
    #[must_use]
    pub fn sender(&self) -> FrameSender {
        FrameSender {
            sender: self.sender.clone(),
            capacity: self.capacity,
        }
    }

    /// Current presence state.
    #[must_use]
    pub fn board(&self) -> &PresenceBoard {
        &self.board
    }

    /// Mutable presence state, e.g. to remove a disconnected agent.
    pub fn board_mut(&mut self) -> &mut PresenceBoard {
        &mut self.board
    }

    /// Decodes every queued frame without blocking.
    pub fn drain(&mut self) -> InboxBatch {
        let mut batch = InboxBatch::default();
        while let Ok(frame) = self.receiver.try_recv() {
            match self.decode(&frame) {
                Ok(Decoded::Signal(signal)) => batch.signals.push(signal),
                Ok(Decoded::Presence(presence)) => {
                    let agent = presence.agent_id.clone();
                    let update = self.board.apply(presence);
                    batch.presence.push((agent, update));
                }
                Err(err) => {
                    warn!("dropping frame on {}: {}", frame.channel, err);
                    batch.rejected.push(err);
                }
            }
        }
        batch
    }

    /// Prunes agents that went quiet; see [`PresenceBoard::prune`].
    pub fn prune(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let gone = self.board.prune(now);
        if !gone.is_empty() {
            warn!("pruned {} stale agents", gone.len());
        }
        gone
    }

    fn decode(&self, frame: &Frame) -> Result<Decoded, SchemaError> {
        match Channel::parse(&frame.channel)? {
            Channel::Signal => SignalMessage::decode(&frame.payload).map(Decoded::Signal),
            Channel::Presence => AgentPresence::decode(&frame.payload).map(Decoded::Presence),
        }
    }
}

enum Decoded {
    Signal(SignalMessage),
    Presence(AgentPresence),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_inbox_drops_at_sender() {
        let inbox = RealtimeInbox::new(&PresenceConfig {
            inbox_capacity: 1,
            ..PresenceConfig::default()
        });
        let sender = inbox.sender();
        sender.publish(Frame::new(Channel::Signal, json!({}))).unwrap();
        let err = sender.publish(Frame::new(Channel::Signal, json!({}))).unwrap_err();
        assert_eq!(err, RealtimeError::Full { capacity: 1 });
    }

    #[test]
    fn test_disconnected_after_inbox_dropped() {
        let inbox = RealtimeInbox::new(&PresenceConfig::default());
        let sender = inbox.sender();
        drop(inbox);
        let err = sender.publish(Frame::new(Channel::Presence, json!({}))).unwrap_err();
        assert_eq!(err, RealtimeError::Disconnected);
    }

    #[test]
    fn test_unknown_channel_rejected() {
        let mut inbox = RealtimeInbox::new(&PresenceConfig::default());
        inbox
            .sender()
            .publish(Frame {
                channel: "agent_chat".into(),
                payload: json!({"text": "hi"}),
            })
            .unwrap();
        let batch = inbox.drain();
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].field(), Some("channel"));
        assert!(inbox.drain().is_empty());
    }
}
