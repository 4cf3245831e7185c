//! # VWORLD Realtime
//!
//! Contracts for the two realtime channels. Nothing here is persisted.
//!
//! - `agent_signal`: broadcast WebRTC negotiation ([`SignalMessage`])
//! - `agent_presence`: agent position updates ([`AgentPresence`]), resolved
//!   last-write-wins per agent on [`PresenceBoard`]
//!
//! ## Delivery Model
//!
//! At-most-once and unordered across agents. Frames that fail to decode are
//! dropped and reported as `SchemaViolation`s; they never stop the inbox.
//!
//! ## Example
//!
//! ```rust,ignore
//! use vworld_realtime::{PresenceConfig, RealtimeInbox};
//!
//! let mut inbox = RealtimeInbox::new(&PresenceConfig::load("config/realtime.toml")?);
//! let sender = inbox.sender(); // hand to the transport thread
//!
//! let batch = inbox.drain();
//! for signal in batch.signals {
//!     peer_connections.handle(signal);
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod channel;
pub mod config;
pub mod error;
pub mod inbox;
pub mod presence;
pub mod signal;

pub use channel::{Channel, Frame};
pub use config::PresenceConfig;
pub use error::{RealtimeError, RealtimeResult};
pub use inbox::{FrameSender, InboxBatch, RealtimeInbox};
pub use presence::{AgentPresence, PresenceBoard, PresenceUpdate};
pub use signal::{SignalMessage, SignalType};
