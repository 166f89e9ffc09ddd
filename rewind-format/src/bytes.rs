//! Helper functions for byte-aligned header reads

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{DecodeError, Stage};
use crate::MAX_STRING_BYTES;

fn truncated(cursor: &Cursor<&[u8]>, stage: Stage, wanted_bytes: u64) -> DecodeError {
    let remaining = cursor.get_ref().len() as u64 - cursor.position().min(cursor.get_ref().len() as u64);
    DecodeError::TruncatedData {
        stage,
        bit_offset: cursor.position() * 8,
        wanted_bits: wanted_bytes.saturating_sub(remaining) * 8,
    }
}

/// Read a single byte
pub(crate) fn read_u8(cursor: &mut Cursor<&[u8]>, stage: Stage) -> Result<u8, DecodeError> {
    cursor.read_u8().map_err(|_| truncated(cursor, stage, 1))
}

/// Read a 32-bit little-endian unsigned integer
pub(crate) fn read_u32(cursor: &mut Cursor<&[u8]>, stage: Stage) -> Result<u32, DecodeError> {
    cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| truncated(cursor, stage, 4))
}

/// Read a 32-bit little-endian signed integer
pub(crate) fn read_i32(cursor: &mut Cursor<&[u8]>, stage: Stage) -> Result<i32, DecodeError> {
    cursor
        .read_i32::<LittleEndian>()
        .map_err(|_| truncated(cursor, stage, 4))
}

/// Read a 64-bit little-endian unsigned integer
pub(crate) fn read_u64(cursor: &mut Cursor<&[u8]>, stage: Stage) -> Result<u64, DecodeError> {
    cursor
        .read_u64::<LittleEndian>()
        .map_err(|_| truncated(cursor, stage, 8))
}

/// Read a 32-bit little-endian float
pub(crate) fn read_f32(cursor: &mut Cursor<&[u8]>, stage: Stage) -> Result<f32, DecodeError> {
    cursor
        .read_f32::<LittleEndian>()
        .map_err(|_| truncated(cursor, stage, 4))
}

/// Read `n` raw bytes
pub(crate) fn read_bytes(
    cursor: &mut Cursor<&[u8]>,
    n: usize,
    stage: Stage,
) -> Result<Vec<u8>, DecodeError> {
    let mut buf = vec![0u8; n];
    cursor
        .read_exact(&mut buf)
        .map_err(|_| truncated(cursor, stage, n as u64))?;
    Ok(buf)
}

/// Read a length-prefixed UTF-8 string
pub(crate) fn read_string(cursor: &mut Cursor<&[u8]>, stage: Stage) -> Result<String, DecodeError> {
    let start = cursor.position() * 8;
    let len = read_u32(cursor, stage)?;
    if len as usize > MAX_STRING_BYTES {
        return Err(DecodeError::OversizedString {
            stage,
            bit_offset: start,
            len,
        });
    }
    let bytes = read_bytes(cursor, len as usize, stage)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
