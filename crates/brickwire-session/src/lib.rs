//! Session layer for EV3 bricks.
//!
//! One task owns the byte stream, the write queue and the table of pending
//! replies. Callers talk to it through a cloneable [`SessionHandle`]:
//! commands go in, correlated replies come back as [`PendingReply`] futures.
//!
//! Writes are serialized and paced; when the brick falls behind, the queue
//! drops its oldest frames rather than blocking callers.

pub mod config;
pub mod correlator;
pub mod error;
pub mod queue;
pub mod session;

pub use config::{SessionConfig, DEFAULT_PACING, DEFAULT_QUEUE_CAPACITY};
pub use correlator::{Dispatch, PendingReply, ResponseCorrelator};
pub use error::{Result, SessionError};
pub use queue::{QueuedFrame, WriteQueue};
pub use session::{Session, SessionHandle, SessionState, SessionStats};
