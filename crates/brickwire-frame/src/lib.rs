//! EV3 command encoding, reply parsing and length-prefixed framing.
//!
//! Every message on the wire, in either direction, starts with:
//! - a 2-byte little-endian length counting the bytes after it
//! - a 2-byte little-endian sequence number (0 is reserved)
//! - a 1-byte command or reply type
//!
//! Outbound direct commands follow with a packed global/local size field and
//! a stream of opcodes and tagged parameters. Inbound replies carry the
//! command's global region back, or an opcode and status for system replies.

pub mod bytecodec;
pub mod command;
pub mod device;
pub mod error;
pub mod opcodes;
pub mod ops;
pub mod param;
pub mod reader;
pub mod reply;

pub use command::{
    Command, CommandType, BASE_HEADER_LEN, DIRECT_HEADER_LEN, LENGTH_PREFIX_LEN, MAX_GLOBAL_SIZE,
    MAX_LOCAL_SIZE,
};
pub use device::{BrickButton, DeviceType, InputPort, LedPattern, OutputPort, Polarity};
pub use error::{FrameError, Result};
pub use opcodes::{opcode, system_opcode, Format, SystemStatus};
pub use param::Parameter;
pub use reader::{FrameReader, ReadMode, DEFAULT_MAX_FRAME_LEN};
pub use reply::{Reply, ReplyHeader, ReplyType, REPLY_HEADER_LEN, SYSTEM_REPLY_HEADER_LEN};
