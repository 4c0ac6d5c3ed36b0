//! Codec utilities for protocol encoding and decoding.
//!
//! This module provides low-level encoding and decoding utilities used
//! throughout the protocol implementation.

use bytes::{Buf, BufMut, Bytes};

use crate::error::ProtocolError;

/// Interpret the first `n` bytes of `bytes` as a little-endian unsigned integer.
///
/// `n` must be in `1..=8`; larger values are clamped to 8 and to the length
/// of the slice. No sign extension is performed.
#[must_use]
pub fn unpack_le(bytes: &[u8], n: usize) -> u64 {
    bytes
        .iter()
        .take(n.min(8))
        .enumerate()
        .fold(0u64, |acc, (i, &b)| acc | (u64::from(b) << (i * 8)))
}

/// Fail with [`ProtocolError::Incomplete`] unless `n` bytes remain.
pub fn ensure_remaining(
    src: &impl Buf,
    n: usize,
    field: &'static str,
) -> Result<(), ProtocolError> {
    if src.remaining() < n {
        return Err(ProtocolError::Incomplete {
            field,
            expected: n,
            actual: src.remaining(),
        });
    }
    Ok(())
}

/// Read a null-terminated string; the terminator must appear before the end
/// of the buffer.
pub fn get_str_nul(src: &mut impl Buf, field: &'static str) -> Result<String, ProtocolError> {
    let mut bytes = Vec::new();
    loop {
        if !src.has_remaining() {
            return Err(ProtocolError::UnterminatedString { field });
        }
        match src.get_u8() {
            0 => break,
            b => bytes.push(b),
        }
    }
    String::from_utf8(bytes).map_err(|_| ProtocolError::InvalidField {
        field,
        reason: "not valid UTF-8",
    })
}

/// Read everything left in the buffer as (lossy) text.
pub fn get_str_eof(src: &mut impl Buf) -> String {
    let rest = src.copy_to_bytes(src.remaining());
    String::from_utf8_lossy(&rest).into_owned()
}

/// Read `n` raw bytes.
pub fn get_bytes(
    src: &mut impl Buf,
    n: usize,
    field: &'static str,
) -> Result<Bytes, ProtocolError> {
    ensure_remaining(src, n, field)?;
    Ok(src.copy_to_bytes(n))
}

/// Read a length-encoded integer.
pub fn get_lenenc_int(src: &mut impl Buf, field: &'static str) -> Result<u64, ProtocolError> {
    ensure_remaining(src, 1, field)?;
    let width = match src.get_u8() {
        b @ 0x00..=0xFA => return Ok(u64::from(b)),
        0xFC => 2,
        0xFD => 3,
        0xFE => 8,
        _ => {
            return Err(ProtocolError::InvalidField {
                field,
                reason: "invalid length-encoded integer prefix",
            });
        }
    };
    ensure_remaining(src, width, field)?;
    let mut bytes = [0u8; 8];
    src.copy_to_slice(&mut bytes[..width]);
    Ok(unpack_le(&bytes, width))
}

/// Write a length-encoded integer.
pub fn put_lenenc_int(dst: &mut impl BufMut, value: u64) {
    match value {
        0..=0xFA => dst.put_u8(value as u8),
        0xFB..=0xFFFF => {
            dst.put_u8(0xFC);
            dst.put_u16_le(value as u16);
        }
        0x1_0000..=0xFF_FFFF => {
            dst.put_u8(0xFD);
            dst.put_slice(&value.to_le_bytes()[..3]);
        }
        _ => {
            dst.put_u8(0xFE);
            dst.put_u64_le(value);
        }
    }
}

/// Write a null-terminated string.
///
/// Strings containing an interior NUL cannot be represented and are rejected.
pub fn put_str_nul(
    dst: &mut impl BufMut,
    s: &str,
    field: &'static str,
) -> Result<(), ProtocolError> {
    if s.as_bytes().contains(&0) {
        return Err(ProtocolError::InvalidField {
            field,
            reason: "contains a NUL byte",
        });
    }
    dst.put_slice(s.as_bytes());
    dst.put_u8(0);
    Ok(())
}
