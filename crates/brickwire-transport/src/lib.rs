//! Byte-stream boundary for talking to an EV3 brick.
//!
//! Provides the [`ByteStream`] contract the session layer drives, plus
//! concrete streams over:
//! - a bound RFCOMM device node (`/dev/rfcommN`)
//! - a Unix domain socket exposed by a Bluetooth bridge daemon
//! - an in-memory pair for tests and dry runs
//!
//! This is the lowest layer of brickwire. Pairing and channel discovery are
//! outside its scope.

pub mod device;
pub mod error;
pub mod io;
pub mod memory;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use device::open_device;
pub use error::{Result, TransportError};
pub use io::{DuplexIo, IoStream};
pub use memory::{memory_pair, MemoryPeer, MemoryStream};
pub use traits::{ByteStream, StreamEvent, StreamEvents};

#[cfg(unix)]
pub use uds::connect_unix;
