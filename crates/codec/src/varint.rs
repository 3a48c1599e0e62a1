//! Variable-length integers (LEB128) and zig-zag mapping
//!
//! Handles, counts, catalog indices and sentinel counters are unsigned
//! varints. Type versions are signed (-1 marks an externally versioned
//! type) and are zig-zag mapped first so small negatives stay one byte.

use crate::error::WireError;

/// Maximum bytes for a 64-bit varint (ceil(64/7) = 10)
pub const MAX_VARINT_BYTES: usize = 10;

/// Append `value` as a varint
pub fn write_varint(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

/// Decode a varint from the front of `data`, returning (value, bytes_consumed)
pub fn read_varint(data: &[u8]) -> Result<(u64, usize), WireError> {
    let mut result: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        if i >= MAX_VARINT_BYTES {
            return Err(WireError::VarintOverflow);
        }
        let value = u64::from(byte & 0x7F);
        if shift == 63 && value > 1 {
            return Err(WireError::VarintOverflow);
        }
        result |= value << shift;
        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
        shift += 7;
    }
    Err(WireError::UnexpectedEnd {
        wanted: data.len() + 1,
        available: data.len(),
    })
}

/// Map a signed value onto the unsigned range (0, -1, 1, -2, ...)
#[inline]
pub const fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`]
#[inline]
pub const fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}
