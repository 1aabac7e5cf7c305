//! Client-side command protocol engine for LEGO Mindstorms EV3 bricks.
//!
//! brickwire encodes EV3 direct and system commands, sends them over a
//! Bluetooth RFCOMM byte stream with pacing and drop-oldest backpressure, and
//! matches replies back to callers by sequence number.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte-stream contract plus RFCOMM device, bridge socket
//!   and in-memory streams
//! - [`frame`]: command encoding, reply parsing and frame reading
//! - [`session`]: sequence correlation, paced write queue and session task
//! - [`Brick`]: named brick operations and sensor polling on top of a session
//!
//! ```no_run
//! # async fn demo() -> brickwire::Result<()> {
//! use brickwire::frame::OutputPort;
//! use brickwire::{Brick, BrickConfig, SessionConfig};
//!
//! let stream = brickwire::transport::open_device("/dev/rfcomm0")
//!     .map_err(brickwire::session::SessionError::from)?;
//! let brick = Brick::open(stream, SessionConfig::default(), BrickConfig::default())?;
//! println!("firmware {}", brick.firmware_version().await?);
//! brick.turn_motor_at_power(OutputPort::B | OutputPort::C, 50).await?;
//! # Ok(())
//! # }
//! ```

pub mod brick;
pub mod error;
pub mod poll;
pub mod requests;

pub use brick::{Brick, BrickConfig, DEFAULT_REPLY_TIMEOUT};
pub use error::{BrickError, Result};
pub use poll::{BrickSnapshot, Buttons, PortState, SensorPoller};

pub use brickwire_session::SessionConfig;

/// Re-export transport types.
pub mod transport {
    pub use brickwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use brickwire_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use brickwire_session::*;
}
