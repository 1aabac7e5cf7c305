use brickwire_frame::FrameError;
use brickwire_session::SessionError;

/// Errors surfaced by [`Brick`](crate::Brick) operations.
#[derive(Debug, thiserror::Error)]
pub enum BrickError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("encode/decode error: {0}")]
    Frame(#[from] FrameError),

    /// The brick answered with an error reply type.
    #[error("brick rejected command (sequence {sequence})")]
    Rejected { sequence: u16 },
}

pub type Result<T> = std::result::Result<T, BrickError>;
