//! Byte-level primitives
//!
//! ## Payload layouts
//!
//! ```text
//! i8/u8                 1 byte
//! i16/u16               2 bytes LE
//! i32/u32/f32           4 bytes LE
//! i64/u64/f64           8 bytes LE
//! bool                  1 byte (0 or 1)
//! char                  u32 LE Unicode scalar value
//! string                varint byte length + UTF-8
//! guid                  16 bytes
//! datetime              i64 LE seconds + u32 LE nanoseconds since the epoch
//! timespan              i64 LE seconds + i32 LE nanoseconds (same sign)
//! datetimeoffset        datetime of the UTC instant + i32 LE offset seconds
//! ```

use crate::error::WireError;
use crate::varint::{read_varint, write_varint};
use byteorder::{ByteOrder, LittleEndian};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use tessera_core::{Scalar, ScalarKind};
use uuid::Uuid;

/// Append-only little-endian writer
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing was written
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the writer
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    fn put<const N: usize>(&mut self, fill: impl FnOnce(&mut [u8])) {
        let start = self.buf.len();
        self.buf.resize(start + N, 0);
        fill(&mut self.buf[start..]);
    }

    /// Raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Single byte
    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    /// Signed byte
    pub fn write_i8(&mut self, v: i8) {
        self.buf.push(v as u8);
    }

    /// `i16` LE
    pub fn write_i16(&mut self, v: i16) {
        self.put::<2>(|b| LittleEndian::write_i16(b, v));
    }

    /// `u16` LE
    pub fn write_u16(&mut self, v: u16) {
        self.put::<2>(|b| LittleEndian::write_u16(b, v));
    }

    /// `i32` LE
    pub fn write_i32(&mut self, v: i32) {
        self.put::<4>(|b| LittleEndian::write_i32(b, v));
    }

    /// `u32` LE
    pub fn write_u32(&mut self, v: u32) {
        self.put::<4>(|b| LittleEndian::write_u32(b, v));
    }

    /// `i64` LE
    pub fn write_i64(&mut self, v: i64) {
        self.put::<8>(|b| LittleEndian::write_i64(b, v));
    }

    /// `u64` LE
    pub fn write_u64(&mut self, v: u64) {
        self.put::<8>(|b| LittleEndian::write_u64(b, v));
    }

    /// `f32` LE
    pub fn write_f32(&mut self, v: f32) {
        self.put::<4>(|b| LittleEndian::write_f32(b, v));
    }

    /// `f64` LE
    pub fn write_f64(&mut self, v: f64) {
        self.put::<8>(|b| LittleEndian::write_f64(b, v));
    }

    /// Unsigned varint
    pub fn write_varint(&mut self, v: u64) {
        write_varint(v, &mut self.buf);
    }

    /// Length-prefixed UTF-8
    pub fn write_string(&mut self, s: &str) {
        self.write_varint(s.len() as u64);
        self.buf.extend_from_slice(s.as_bytes());
    }

    fn write_instant(&mut self, secs: i64, nanos: u32) {
        self.write_i64(secs);
        self.write_u32(nanos);
    }

    /// Payload of `scalar` without a marker
    pub fn write_scalar(&mut self, scalar: &Scalar) {
        match scalar {
            Scalar::Bool(v) => self.write_u8(u8::from(*v)),
            Scalar::Char(c) => self.write_u32(u32::from(*c)),
            Scalar::I8(v) => self.write_i8(*v),
            Scalar::U8(v) => self.write_u8(*v),
            Scalar::I16(v) => self.write_i16(*v),
            Scalar::U16(v) => self.write_u16(*v),
            Scalar::I32(v) => self.write_i32(*v),
            Scalar::U32(v) => self.write_u32(*v),
            Scalar::I64(v) => self.write_i64(*v),
            Scalar::U64(v) => self.write_u64(*v),
            Scalar::F32(v) => self.write_f32(*v),
            Scalar::F64(v) => self.write_f64(*v),
            Scalar::String(s) => self.write_string(s),
            Scalar::Guid(g) => self.write_bytes(g.as_bytes()),
            Scalar::DateTime(dt) => self.write_instant(dt.timestamp(), dt.timestamp_subsec_nanos()),
            Scalar::TimeSpan(d) => {
                self.write_i64(d.num_seconds());
                self.write_i32(d.subsec_nanos());
            }
            Scalar::DateTimeOffset(dt) => {
                self.write_instant(dt.timestamp(), dt.timestamp_subsec_nanos());
                self.write_i32(dt.offset().local_minus_utc());
            }
        }
    }
}

/// Bounds-checked little-endian reader over a byte slice
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Reader positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader { data, pos: 0 }
    }

    /// Current byte offset
    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    /// Bytes left
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// True when every byte was consumed
    pub fn is_at_end(&self) -> bool {
        self.pos == self.data.len()
    }

    /// Next byte without consuming it
    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Borrow the next `n` bytes and advance past them
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < n {
            return Err(WireError::UnexpectedEnd {
                wanted: n,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Single byte
    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Signed byte
    pub fn read_i8(&mut self) -> Result<i8, WireError> {
        Ok(self.read_u8()? as i8)
    }

    /// `i16` LE
    pub fn read_i16(&mut self) -> Result<i16, WireError> {
        Ok(LittleEndian::read_i16(self.read_bytes(2)?))
    }

    /// `u16` LE
    pub fn read_u16(&mut self) -> Result<u16, WireError> {
        Ok(LittleEndian::read_u16(self.read_bytes(2)?))
    }

    /// `i32` LE
    pub fn read_i32(&mut self) -> Result<i32, WireError> {
        Ok(LittleEndian::read_i32(self.read_bytes(4)?))
    }

    /// `u32` LE
    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    /// `i64` LE
    pub fn read_i64(&mut self) -> Result<i64, WireError> {
        Ok(LittleEndian::read_i64(self.read_bytes(8)?))
    }

    /// `u64` LE
    pub fn read_u64(&mut self) -> Result<u64, WireError> {
        Ok(LittleEndian::read_u64(self.read_bytes(8)?))
    }

    /// `f32` LE
    pub fn read_f32(&mut self) -> Result<f32, WireError> {
        Ok(LittleEndian::read_f32(self.read_bytes(4)?))
    }

    /// `f64` LE
    pub fn read_f64(&mut self) -> Result<f64, WireError> {
        Ok(LittleEndian::read_f64(self.read_bytes(8)?))
    }

    /// Unsigned varint
    pub fn read_varint(&mut self) -> Result<u64, WireError> {
        let (value, used) = read_varint(&self.data[self.pos..])?;
        self.pos += used;
        Ok(value)
    }

    /// Varint that must fit in `u32`
    pub fn read_varint_u32(&mut self) -> Result<u32, WireError> {
        let value = self.read_varint()?;
        u32::try_from(value).map_err(|_| WireError::VarintRange(value))
    }

    /// `0` or `1`
    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(WireError::InvalidBool(other)),
        }
    }

    /// Unicode scalar value
    pub fn read_char(&mut self) -> Result<char, WireError> {
        let raw = self.read_u32()?;
        char::from_u32(raw).ok_or(WireError::InvalidChar(raw))
    }

    /// Length-prefixed UTF-8
    pub fn read_string(&mut self) -> Result<String, WireError> {
        let len = self.read_varint()?;
        let len = usize::try_from(len).map_err(|_| WireError::VarintRange(len))?;
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| WireError::InvalidUtf8)
    }

    /// 16-byte GUID
    pub fn read_guid(&mut self) -> Result<Uuid, WireError> {
        let bytes = self.read_bytes(16)?;
        let mut raw = [0u8; 16];
        raw.copy_from_slice(bytes);
        Ok(Uuid::from_bytes(raw))
    }

    /// UTC date-time
    pub fn read_datetime(&mut self) -> Result<DateTime<Utc>, WireError> {
        let secs = self.read_i64()?;
        let nanos = self.read_u32()?;
        DateTime::from_timestamp(secs, nanos).ok_or(WireError::InvalidTime("datetime"))
    }

    /// Signed duration
    pub fn read_timespan(&mut self) -> Result<Duration, WireError> {
        let secs = self.read_i64()?;
        let nanos = self.read_i32()?;
        if nanos.unsigned_abs() >= 1_000_000_000 || (secs != 0 && nanos != 0 && (secs < 0) != (nanos < 0)) {
            return Err(WireError::InvalidTime("timespan"));
        }
        Duration::try_seconds(secs)
            .and_then(|whole| whole.checked_add(&Duration::nanoseconds(i64::from(nanos))))
            .ok_or(WireError::InvalidTime("timespan"))
    }

    /// Date-time with a fixed offset
    pub fn read_datetime_offset(&mut self) -> Result<DateTime<FixedOffset>, WireError> {
        let utc = self.read_datetime()?;
        let offset = self.read_i32()?;
        let offset = FixedOffset::east_opt(offset).ok_or(WireError::InvalidTime("datetimeoffset"))?;
        Ok(utc.with_timezone(&offset))
    }

    /// Payload of a scalar of `kind` without a marker
    pub fn read_scalar(&mut self, kind: ScalarKind) -> Result<Scalar, WireError> {
        Ok(match kind {
            ScalarKind::Bool => Scalar::Bool(self.read_bool()?),
            ScalarKind::Char => Scalar::Char(self.read_char()?),
            ScalarKind::I8 => Scalar::I8(self.read_i8()?),
            ScalarKind::U8 => Scalar::U8(self.read_u8()?),
            ScalarKind::I16 => Scalar::I16(self.read_i16()?),
            ScalarKind::U16 => Scalar::U16(self.read_u16()?),
            ScalarKind::I32 => Scalar::I32(self.read_i32()?),
            ScalarKind::U32 => Scalar::U32(self.read_u32()?),
            ScalarKind::I64 => Scalar::I64(self.read_i64()?),
            ScalarKind::U64 => Scalar::U64(self.read_u64()?),
            ScalarKind::F32 => Scalar::F32(self.read_f32()?),
            ScalarKind::F64 => Scalar::F64(self.read_f64()?),
            ScalarKind::String => Scalar::String(self.read_string()?),
            ScalarKind::Guid => Scalar::Guid(self.read_guid()?),
            ScalarKind::DateTime => Scalar::DateTime(self.read_datetime()?),
            ScalarKind::TimeSpan => Scalar::TimeSpan(self.read_timespan()?),
            ScalarKind::DateTimeOffset => Scalar::DateTimeOffset(self.read_datetime_offset()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn round_trip(scalar: Scalar) -> Scalar {
        let mut w = ByteWriter::new();
        w.write_scalar(&scalar);
        let bytes = w.into_inner();
        let mut r = ByteReader::new(&bytes);
        let back = r.read_scalar(scalar.kind()).unwrap();
        assert!(r.is_at_end(), "payload of {:?} not fully consumed", scalar);
        back
    }

    #[test]
    fn test_fixed_width_layouts() {
        let mut w = ByteWriter::new();
        w.write_i32(-2);
        w.write_u16(0x0102);
        assert_eq!(w.into_inner(), vec![0xFE, 0xFF, 0xFF, 0xFF, 0x02, 0x01]);
    }

    #[test]
    fn test_scalar_payloads_round_trip() {
        let samples = vec![
            Scalar::Bool(true),
            Scalar::Char('ß'),
            Scalar::I8(-5),
            Scalar::U16(65535),
            Scalar::I64(i64::MIN),
            Scalar::U64(u64::MAX),
            Scalar::F32(1.5),
            Scalar::F64(-0.25),
            Scalar::String("héllo".into()),
            Scalar::Guid(Uuid::from_u128(0x1234_5678_9abc_def0_1234_5678_9abc_def0)),
            Scalar::DateTime(Utc.with_ymd_and_hms(2024, 2, 29, 12, 30, 0).unwrap()),
            Scalar::TimeSpan(Duration::milliseconds(-1500)),
            Scalar::DateTimeOffset(
                FixedOffset::east_opt(5 * 3600)
                    .unwrap()
                    .with_ymd_and_hms(2020, 1, 1, 8, 0, 0)
                    .unwrap(),
            ),
        ];
        for s in samples {
            assert_eq!(round_trip(s.clone()), s);
        }
    }

    #[test]
    fn test_offset_is_preserved() {
        let tz = FixedOffset::west_opt(3 * 3600).unwrap();
        let dt = tz.with_ymd_and_hms(2021, 6, 1, 9, 0, 0).unwrap();
        let Scalar::DateTimeOffset(back) = round_trip(Scalar::DateTimeOffset(dt)) else {
            panic!("wrong kind");
        };
        assert_eq!(back.offset().local_minus_utc(), -3 * 3600);
    }

    #[test]
    fn test_truncated_reads_fail() {
        let mut r = ByteReader::new(&[1, 2]);
        assert_eq!(
            r.read_i32(),
            Err(WireError::UnexpectedEnd {
                wanted: 4,
                available: 2
            })
        );
    }

    #[test]
    fn test_string_length_beyond_stream() {
        let mut w = ByteWriter::new();
        w.write_varint(50);
        w.write_bytes(b"abc");
        let bytes = w.into_inner();
        assert!(matches!(
            ByteReader::new(&bytes).read_string(),
            Err(WireError::UnexpectedEnd { .. })
        ));
    }

    #[test]
    fn test_invalid_payloads() {
        assert_eq!(ByteReader::new(&[2]).read_bool(), Err(WireError::InvalidBool(2)));
        let surrogate = 0xD800u32.to_le_bytes();
        assert_eq!(
            ByteReader::new(&surrogate).read_char(),
            Err(WireError::InvalidChar(0xD800))
        );
        let mut w = ByteWriter::new();
        w.write_string("ok");
        let mut bytes = w.into_inner();
        bytes[1] = 0xFF;
        assert_eq!(ByteReader::new(&bytes).read_string(), Err(WireError::InvalidUtf8));
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut r = ByteReader::new(&[7, 8]);
        assert_eq!(r.peek_u8(), Some(7));
        assert_eq!(r.read_u8(), Ok(7));
        assert_eq!(r.remaining(), 1);
    }
}
