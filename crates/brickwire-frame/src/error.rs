use brickwire_transport::TransportError;

/// Errors that can occur while building, framing or parsing messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A size or value is outside what the protocol can express.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The command was used in a way its lifecycle does not allow.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// A buffer ended before the value being decoded.
    #[error("truncated input (needed {needed} bytes, had {available})")]
    Truncated { needed: usize, available: usize },

    /// A reply frame carried a reply-type byte outside the known set.
    #[error("unknown reply type 0x{0:02x}")]
    UnknownReplyType(u8),

    /// A parameter tag byte outside the known set.
    #[error("unknown parameter tag 0x{0:02x}")]
    UnknownTag(u8),

    /// An inbound frame announced more bytes than the configured maximum.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The underlying stream failed.
    #[error("frame transport error: {0}")]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
