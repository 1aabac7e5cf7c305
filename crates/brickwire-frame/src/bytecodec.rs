//! Fixed little-endian primitives used by both directions of the protocol.
//!
//! Writers append to a [`BufMut`]; readers take a slice and an offset and
//! fail with [`FrameError::Truncated`] instead of panicking.

use std::fmt::Write as _;

use bytes::BufMut;

use crate::error::{FrameError, Result};

pub fn put_u8(dst: &mut impl BufMut, value: u8) {
    dst.put_u8(value);
}

pub fn put_u16(dst: &mut impl BufMut, value: u16) {
    dst.put_u16_le(value);
}

pub fn put_u32(dst: &mut impl BufMut, value: u32) {
    dst.put_u32_le(value);
}

pub fn put_i16(dst: &mut impl BufMut, value: i16) {
    dst.put_i16_le(value);
}

/// Append UTF-8 bytes followed by a NUL terminator.
///
/// Strings that already contain NUL cannot be represented and are rejected.
pub fn put_cstring(dst: &mut impl BufMut, value: &str) -> Result<()> {
    if value.as_bytes().contains(&0) {
        return Err(FrameError::InvalidParameter(format!(
            "string {value:?} contains an embedded NUL"
        )));
    }
    dst.put_slice(value.as_bytes());
    dst.put_u8(0);
    Ok(())
}

fn window<const N: usize>(src: &[u8], offset: usize) -> Result<[u8; N]> {
    let end = offset.saturating_add(N);
    src.get(offset..end)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(FrameError::Truncated {
            needed: end,
            available: src.len(),
        })
}

pub fn read_u8(src: &[u8], offset: usize) -> Result<u8> {
    Ok(window::<1>(src, offset)?[0])
}

pub fn read_u16(src: &[u8], offset: usize) -> Result<u16> {
    Ok(u16::from_le_bytes(window(src, offset)?))
}

pub fn read_u32(src: &[u8], offset: usize) -> Result<u32> {
    Ok(u32::from_le_bytes(window(src, offset)?))
}

pub fn read_i16(src: &[u8], offset: usize) -> Result<i16> {
    Ok(i16::from_le_bytes(window(src, offset)?))
}

pub fn read_i32(src: &[u8], offset: usize) -> Result<i32> {
    Ok(i32::from_le_bytes(window(src, offset)?))
}

pub fn read_f32(src: &[u8], offset: usize) -> Result<f32> {
    Ok(f32::from_le_bytes(window(src, offset)?))
}

/// Read a NUL-terminated string starting at `offset`.
///
/// Returns the string and the number of bytes consumed, terminator included.
pub fn read_cstring(src: &[u8], offset: usize) -> Result<(String, usize)> {
    let tail = src.get(offset..).ok_or(FrameError::Truncated {
        needed: offset,
        available: src.len(),
    })?;
    let nul = tail
        .iter()
        .position(|b| *b == 0)
        .ok_or(FrameError::Truncated {
            needed: src.len() + 1,
            available: src.len(),
        })?;
    let text = std::str::from_utf8(&tail[..nul])
        .map_err(|e| FrameError::InvalidParameter(format!("string is not UTF-8: {e}")))?;
    Ok((text.to_string(), nul + 1))
}

/// Decode a fixed-size text field the brick pads with NULs.
///
/// Everything from the first NUL on is ignored; invalid UTF-8 is replaced.
pub fn text_until_nul(src: &[u8]) -> String {
    let end = src.iter().position(|b| *b == 0).unwrap_or(src.len());
    String::from_utf8_lossy(&src[..end]).into_owned()
}

/// Lowercase hex, two digits per byte, no separators.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}
