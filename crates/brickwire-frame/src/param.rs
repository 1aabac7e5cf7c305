use bytes::BufMut;

use crate::bytecodec;
use crate::error::{FrameError, Result};

/// Tag for a 1-byte value.
pub const TAG_BYTE: u8 = 0x81;
/// Tag for a 2-byte little-endian value.
pub const TAG_SHORT: u8 = 0x82;
/// Tag for a 4-byte little-endian value.
pub const TAG_INT: u8 = 0x83;
/// Tag for a NUL-terminated UTF-8 string.
pub const TAG_STRING: u8 = 0x84;
/// Marker for a 1-byte offset into the command's global region.
pub const TAG_GLOBAL_INDEX: u8 = 0xE1;

/// One typed argument following an opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parameter {
    Byte(u8),
    Short(i16),
    Int(u32),
    Str(String),
}

impl Parameter {
    /// The tag byte this value is encoded with.
    pub fn tag(&self) -> u8 {
        match self {
            Parameter::Byte(_) => TAG_BYTE,
            Parameter::Short(_) => TAG_SHORT,
            Parameter::Int(_) => TAG_INT,
            Parameter::Str(_) => TAG_STRING,
        }
    }

    /// Bytes this value occupies on the wire, tag included.
    pub fn encoded_len(&self) -> usize {
        1 + match self {
            Parameter::Byte(_) => 1,
            Parameter::Short(_) => 2,
            Parameter::Int(_) => 4,
            Parameter::Str(s) => s.len() + 1,
        }
    }

    /// Append tag and value to `dst`.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        // Validate before the tag goes out so a failure leaves `dst` untouched.
        if let Parameter::Str(s) = self {
            if s.as_bytes().contains(&0) {
                return Err(FrameError::InvalidParameter(format!(
                    "string {s:?} contains an embedded NUL"
                )));
            }
        }

        dst.put_u8(self.tag());
        match self {
            Parameter::Byte(v) => bytecodec::put_u8(dst, *v),
            Parameter::Short(v) => bytecodec::put_i16(dst, *v),
            Parameter::Int(v) => bytecodec::put_u32(dst, *v),
            Parameter::Str(s) => bytecodec::put_cstring(dst, s)?,
        }
        Ok(())
    }

    /// Decode one tagged value from the front of `src`.
    ///
    /// Returns the value and the number of bytes consumed.
    pub fn decode(src: &[u8]) -> Result<(Self, usize)> {
        let tag = bytecodec::read_u8(src, 0)?;
        match tag {
            TAG_BYTE => Ok((Parameter::Byte(bytecodec::read_u8(src, 1)?), 2)),
            TAG_SHORT => Ok((Parameter::Short(bytecodec::read_i16(src, 1)?), 3)),
            TAG_INT => Ok((Parameter::Int(bytecodec::read_u32(src, 1)?), 5)),
            TAG_STRING => {
                let (text, used) = bytecodec::read_cstring(src, 1)?;
                Ok((Parameter::Str(text), 1 + used))
            }
            other => Err(FrameError::UnknownTag(other)),
        }
    }
}

impl From<u8> for Parameter {
    fn from(value: u8) -> Self {
        Parameter::Byte(value)
    }
}

impl From<bool> for Parameter {
    fn from(value: bool) -> Self {
        Parameter::Byte(u8::from(value))
    }
}

impl From<i16> for Parameter {
    fn from(value: i16) -> Self {
        Parameter::Short(value)
    }
}

/// Unsigned 16-bit values share the short tag; the bit pattern is preserved.
impl From<u16> for Parameter {
    fn from(value: u16) -> Self {
        Parameter::Short(value as i16)
    }
}

impl From<u32> for Parameter {
    fn from(value: u32) -> Self {
        Parameter::Int(value)
    }
}

impl From<&str> for Parameter {
    fn from(value: &str) -> Self {
        Parameter::Str(value.to_string())
    }
}

impl From<String> for Parameter {
    fn from(value: String) -> Self {
        Parameter::Str(value)
    }
}
