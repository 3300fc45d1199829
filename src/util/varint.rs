//! Variable-byte integer encoding for postings and run records.
//!
//! Each byte carries 7 payload bits, least-significant group first,
//! with the high bit set on every byte except the last. A `u32` always
//! fits in at most five bytes.

use std::io::{self, Read};

use byteorder::ReadBytesExt;

use crate::error::{PilumError, Result};

/// Maximum encoded length of a `u32`.
pub const MAX_ENCODED_LEN: usize = 5;

/// Encode a value, appending to `buf`. Returns the number of bytes written.
pub fn encode_u32_into(value: u32, buf: &mut Vec<u8>) -> usize {
    let mut val = value;
    let mut written = 0;

    loop {
        let mut byte = (val & 0x7F) as u8;
        val >>= 7;

        if val != 0 {
            byte |= 0x80; // Set continuation bit
        }

        buf.push(byte);
        written += 1;

        if val == 0 {
            break;
        }
    }

    written
}

/// Encode a value into a fresh buffer.
pub fn encode_u32(value: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MAX_ENCODED_LEN);
    encode_u32_into(value, &mut buf);
    buf
}

/// Decode a value from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed. Truncated input
/// and sequences longer than [`MAX_ENCODED_LEN`] are format errors.
pub fn decode_u32(bytes: &[u8]) -> Result<(u32, usize)> {
    let mut result = 0u32;
    let mut shift = 0;

    for (i, &byte) in bytes.iter().enumerate() {
        if i == MAX_ENCODED_LEN {
            return Err(PilumError::format("varbyte sequence exceeds five bytes"));
        }

        result |= ((byte & 0x7F) as u32) << shift;

        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }

        shift += 7;
    }

    Err(PilumError::format("truncated varbyte sequence"))
}

/// Read one varbyte-encoded value from a stream.
pub fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    match read_u32_inner(reader, false)? {
        Some(value) => Ok(value),
        None => Err(PilumError::format("truncated varbyte sequence")),
    }
}

/// Read one value, returning `None` on a clean EOF before the first byte.
///
/// Run files end exactly at a record boundary, so EOF inside a sequence
/// is still an error.
pub fn read_u32_opt<R: Read>(reader: &mut R) -> Result<Option<u32>> {
    read_u32_inner(reader, true)
}

fn read_u32_inner<R: Read>(reader: &mut R, eof_ok: bool) -> Result<Option<u32>> {
    let mut result = 0u32;
    let mut shift = 0;
    let mut len = 0;

    loop {
        if len == MAX_ENCODED_LEN {
            return Err(PilumError::format("varbyte sequence exceeds five bytes"));
        }

        let byte = match reader.read_u8() {
            Ok(byte) => byte,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                if len == 0 && eof_ok {
                    return Ok(None);
                }
                return Err(PilumError::format("truncated varbyte sequence"));
            }
            Err(e) => return Err(e.into()),
        };
        len += 1;

        result |= ((byte & 0x7F) as u32) << shift;

        if byte & 0x80 == 0 {
            return Ok(Some(result));
        }

        shift += 7;
    }
}
