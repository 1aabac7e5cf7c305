use bytes::{BufMut, Bytes, BytesMut};

use crate::bytecodec;
use crate::error::{FrameError, Result};
use crate::opcodes::opcode;
use crate::param::{Parameter, TAG_GLOBAL_INDEX};

/// Bytes taken by the length prefix at the start of every frame.
pub const LENGTH_PREFIX_LEN: usize = 2;

/// Length prefix + sequence + command type.
pub const BASE_HEADER_LEN: usize = 5;

/// Base header plus the packed global/local size field of direct commands.
pub const DIRECT_HEADER_LEN: usize = 7;

/// Largest global region a command may request.
pub const MAX_GLOBAL_SIZE: u16 = 1024;

/// Largest local region a command may request.
pub const MAX_LOCAL_SIZE: u8 = 64;

const SEQUENCE_OFFSET: usize = 2;

/// Command type byte at offset 4 of every outbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandType {
    DirectReply = 0x00,
    DirectNoReply = 0x80,
    SystemReply = 0x01,
    SystemNoReply = 0x81,
}

impl CommandType {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Direct commands carry the packed global/local size field.
    pub fn is_direct(self) -> bool {
        matches!(self, CommandType::DirectReply | CommandType::DirectNoReply)
    }

    /// Whether the brick answers this command with a correlated reply.
    pub fn expects_reply(self) -> bool {
        matches!(self, CommandType::DirectReply | CommandType::SystemReply)
    }
}

impl TryFrom<u8> for CommandType {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(CommandType::DirectReply),
            0x80 => Ok(CommandType::DirectNoReply),
            0x01 => Ok(CommandType::SystemReply),
            0x81 => Ok(CommandType::SystemNoReply),
            other => Err(FrameError::InvalidParameter(format!(
                "unknown command type 0x{other:02x}"
            ))),
        }
    }
}

/// One outbound message under construction.
///
/// The header is written up front with a zero length and a zero sequence;
/// the owning session assigns the sequence and [`finalize`](Self::finalize)
/// patches in the length. After finalizing, the command is frozen until
/// [`reset`](Self::reset).
///
/// ```text
/// ┌────────────┬────────────┬──────────┬──────────────────┬──────────────┐
/// │ Length     │ Sequence   │ Type     │ Sizes (direct)   │ Payload      │
/// │ (2B LE)    │ (2B LE)    │ (1B)     │ gggggggg llllllgg│ ops + params │
/// └────────────┴────────────┴──────────┴──────────────────┴──────────────┘
/// ```
#[derive(Debug, Clone)]
pub struct Command {
    command_type: CommandType,
    global_size: u16,
    local_size: u8,
    buf: BytesMut,
    frame: Option<Bytes>,
}

impl Command {
    /// Start a command with the given scratch region sizes.
    ///
    /// Sizes only reach the wire for direct commands; system commands must
    /// still pass sizes within range.
    pub fn new(command_type: CommandType, global_size: u16, local_size: u8) -> Result<Self> {
        if global_size > MAX_GLOBAL_SIZE {
            return Err(FrameError::InvalidParameter(format!(
                "global size {global_size} exceeds {MAX_GLOBAL_SIZE}"
            )));
        }
        if local_size > MAX_LOCAL_SIZE {
            return Err(FrameError::InvalidParameter(format!(
                "local size {local_size} exceeds {MAX_LOCAL_SIZE}"
            )));
        }

        let mut command = Self {
            command_type,
            global_size,
            local_size,
            buf: BytesMut::with_capacity(32),
            frame: None,
        };
        command.write_header();
        Ok(command)
    }

    /// A direct command that expects `global_size` bytes back.
    pub fn direct_reply(global_size: u16) -> Result<Self> {
        Self::new(CommandType::DirectReply, global_size, 0)
    }

    /// A fire-and-forget direct command.
    pub fn direct_no_reply() -> Self {
        Self::unchecked(CommandType::DirectNoReply)
    }

    pub fn system_reply() -> Self {
        Self::unchecked(CommandType::SystemReply)
    }

    pub fn system_no_reply() -> Self {
        Self::unchecked(CommandType::SystemNoReply)
    }

    fn unchecked(command_type: CommandType) -> Self {
        let mut command = Self {
            command_type,
            global_size: 0,
            local_size: 0,
            buf: BytesMut::with_capacity(32),
            frame: None,
        };
        command.write_header();
        command
    }

    fn write_header(&mut self) {
        self.buf.clear();
        bytecodec::put_u16(&mut self.buf, 0);
        bytecodec::put_u16(&mut self.buf, 0);
        bytecodec::put_u8(&mut self.buf, self.command_type.as_byte());
        if self.command_type.is_direct() {
            // Sizes at the limit (1024 global, 64 local) wrap to zero here.
            self.buf.put_u8((self.global_size & 0xFF) as u8);
            self.buf
                .put_u8((self.local_size << 2) | ((self.global_size >> 8) & 0x03) as u8);
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.frame.is_some() {
            return Err(FrameError::InvalidState("command already finalized"));
        }
        Ok(())
    }

    /// Append an opcode. Codes above `TST` are written high byte first.
    pub fn append_opcode(&mut self, code: u16) -> Result<()> {
        self.ensure_open()?;
        if code > opcode::TST {
            self.buf.put_u8((code >> 8) as u8);
        }
        self.buf.put_u8((code & 0xFF) as u8);
        Ok(())
    }

    /// Append one tagged argument.
    pub fn append_parameter(&mut self, value: impl Into<Parameter>) -> Result<()> {
        self.ensure_open()?;
        value.into().encode(&mut self.buf)
    }

    /// Append a reference to byte `offset` of the global region.
    ///
    /// The offset is not checked against the global size.
    pub fn append_global_index(&mut self, offset: u8) -> Result<()> {
        self.ensure_open()?;
        self.buf.put_u8(TAG_GLOBAL_INDEX);
        self.buf.put_u8(offset);
        Ok(())
    }

    /// Write the correlation sequence. Zero is reserved on the wire.
    pub fn assign_sequence(&mut self, sequence: u16) -> Result<()> {
        self.ensure_open()?;
        if sequence == 0 {
            return Err(FrameError::InvalidParameter(
                "sequence 0 is reserved".to_string(),
            ));
        }
        self.buf[SEQUENCE_OFFSET..SEQUENCE_OFFSET + 2].copy_from_slice(&sequence.to_le_bytes());
        Ok(())
    }

    /// Patch the length prefix and freeze the frame.
    ///
    /// Succeeds once per logical send; a second call fails with
    /// `InvalidState` until the command is [`reset`](Self::reset).
    pub fn finalize(&mut self) -> Result<Bytes> {
        self.ensure_open()?;
        let body_len = self.buf.len() - LENGTH_PREFIX_LEN;
        let body_len = u16::try_from(body_len).map_err(|_| {
            FrameError::InvalidParameter(format!("command body of {body_len} bytes is too long"))
        })?;
        self.buf[..LENGTH_PREFIX_LEN].copy_from_slice(&body_len.to_le_bytes());

        let frame = self.buf.clone().freeze();
        self.frame = Some(frame.clone());
        Ok(frame)
    }

    /// Drop the payload and rewrite the header for reuse.
    pub fn reset(&mut self) {
        self.frame = None;
        self.write_header();
    }

    /// The frozen frame, if finalized.
    pub fn frame(&self) -> Option<&Bytes> {
        self.frame.as_ref()
    }

    pub fn is_finalized(&self) -> bool {
        self.frame.is_some()
    }

    pub fn command_type(&self) -> CommandType {
        self.command_type
    }

    pub fn expects_reply(&self) -> bool {
        self.command_type.expects_reply()
    }

    pub fn global_size(&self) -> u16 {
        self.global_size
    }

    pub fn local_size(&self) -> u8 {
        self.local_size
    }

    /// Sequence written into the header; 0 until assigned.
    pub fn sequence(&self) -> u16 {
        u16::from_le_bytes([self.buf[SEQUENCE_OFFSET], self.buf[SEQUENCE_OFFSET + 1]])
    }

    /// Bytes appended after the header.
    pub fn payload(&self) -> &[u8] {
        let header = if self.command_type.is_direct() {
            DIRECT_HEADER_LEN
        } else {
            BASE_HEADER_LEN
        };
        &self.buf[header..]
    }

    /// Everything written so far, header included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}
