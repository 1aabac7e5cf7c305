use std::time::Duration;

use brickwire_frame::FrameError;
use brickwire_transport::TransportError;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Encoding or framing error, including invalid parameters and misuse
    /// of a finalized command.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A pending reply is already registered under this sequence.
    #[error("sequence {0} is already awaiting a reply")]
    DuplicateSequence(u16),

    /// A reply for a pending command carried an unknown reply type.
    #[error("reply {sequence} has unknown reply type 0x{reply_type:02x}")]
    UnknownReplyType { sequence: u16, reply_type: u8 },

    /// The session closed before a reply arrived.
    #[error("connection closed")]
    ConnectionClosed,

    /// The write queue evicted the frame before it was transmitted.
    #[error("frame {sequence} dropped from a full write queue")]
    Dropped { sequence: u16 },

    /// A reply was requested for a command type that never gets one.
    #[error("command does not expect a reply")]
    NoReplyExpected,

    /// No reply arrived in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, SessionError>;
