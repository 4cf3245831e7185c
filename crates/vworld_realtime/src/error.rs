//! Realtime delivery errors.

use thiserror::Error;

/// Errors publishing frames into an inbox.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RealtimeError {
    /// The inbox buffer is full; the frame was dropped.
    #[error("inbox full ({capacity} frames); frame dropped")]
    Full {
        /// Configured buffer size
        capacity: usize,
    },

    /// The inbox was dropped.
    #[error("inbox disconnected")]
    Disconnected,
}

/// Result type for realtime delivery.
pub type RealtimeResult<T> = Result<T, RealtimeError>;
