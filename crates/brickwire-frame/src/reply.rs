use bytes::Bytes;

use crate::bytecodec;
use crate::error::{FrameError, Result};
use crate::opcodes::SystemStatus;

/// Sequence (2) + reply type (1).
pub const REPLY_HEADER_LEN: usize = 3;

/// System replies add opcode (1) + status (1) before their data.
pub const SYSTEM_REPLY_HEADER_LEN: usize = 5;

/// Reply type byte at offset 2 of every inbound frame body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReplyType {
    DirectReply = 0x02,
    SystemReply = 0x03,
    DirectReplyError = 0x04,
    SystemReplyError = 0x05,
}

impl ReplyType {
    pub fn is_system(self) -> bool {
        matches!(self, ReplyType::SystemReply | ReplyType::SystemReplyError)
    }

    pub fn is_error(self) -> bool {
        matches!(self, ReplyType::DirectReplyError | ReplyType::SystemReplyError)
    }
}

impl TryFrom<u8> for ReplyType {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x02 => Ok(ReplyType::DirectReply),
            0x03 => Ok(ReplyType::SystemReply),
            0x04 => Ok(ReplyType::DirectReplyError),
            0x05 => Ok(ReplyType::SystemReplyError),
            other => Err(FrameError::UnknownReplyType(other)),
        }
    }
}

/// The fixed prefix of an inbound frame body, parsed without validating type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    pub sequence: u16,
    pub reply_type: u8,
}

impl ReplyHeader {
    pub fn parse(body: &[u8]) -> Result<Self> {
        Ok(Self {
            sequence: bytecodec::read_u16(body, 0)?,
            reply_type: bytecodec::read_u8(body, 2)?,
        })
    }
}

/// A decoded reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub sequence: u16,
    pub reply_type: ReplyType,
    /// Data region: the global memory for direct replies, the bytes after
    /// the status for system replies.
    pub payload: Bytes,
    pub system_opcode: Option<u8>,
    pub system_status: Option<u8>,
}

impl Reply {
    /// Decode a frame body (length prefix already stripped).
    pub fn decode(body: Bytes) -> Result<Self> {
        let header = ReplyHeader::parse(&body)?;
        let reply_type = ReplyType::try_from(header.reply_type)?;

        if reply_type.is_system() {
            let opcode = bytecodec::read_u8(&body, 3)?;
            let status = bytecodec::read_u8(&body, 4)?;
            Ok(Self {
                sequence: header.sequence,
                reply_type,
                payload: body.slice(SYSTEM_REPLY_HEADER_LEN..),
                system_opcode: Some(opcode),
                system_status: Some(status),
            })
        } else {
            Ok(Self {
                sequence: header.sequence,
                reply_type,
                payload: body.slice(REPLY_HEADER_LEN..),
                system_opcode: None,
                system_status: None,
            })
        }
    }

    pub fn is_error(&self) -> bool {
        self.reply_type.is_error()
    }

    /// The system status decoded against the status table.
    pub fn status(&self) -> Option<Result<SystemStatus>> {
        self.system_status.map(SystemStatus::try_from)
    }
}
