use std::path::PathBuf;

/// Errors that can occur on the byte-stream boundary.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open a device node (e.g. `/dev/rfcomm0`).
    #[error("failed to open device {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to a bridge socket.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An I/O error occurred on the stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// The stream was used before `open` or after `close`.
    #[error("stream is not open")]
    NotOpen,

    /// The stream was opened twice.
    #[error("stream is already open")]
    AlreadyOpen,
}

pub type Result<T> = std::result::Result<T, TransportError>;
