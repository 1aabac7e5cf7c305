use std::time::Duration;

use brickwire_frame::{ReadMode, DEFAULT_MAX_FRAME_LEN};

/// Frames the write queue holds before dropping the oldest.
pub const DEFAULT_QUEUE_CAPACITY: usize = 2;

/// Quiet time after each complete write so the brick's receive buffer can drain.
pub const DEFAULT_PACING: Duration = Duration::from_millis(125);

/// Configuration for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Write queue capacity. Default: 2.
    pub queue_capacity: usize,
    /// Delay after each complete write. Default: 125 ms.
    pub pacing: Duration,
    /// How torn inbound frames are handled. Default: drop them.
    pub read_mode: ReadMode,
    /// Largest inbound frame body accepted.
    pub max_frame_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            pacing: DEFAULT_PACING,
            read_mode: ReadMode::DropTorn,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}
