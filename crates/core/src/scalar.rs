//! Scalar values
//!
//! The closed set of primitive families the store understands. Every
//! primitive in the graph is one of these variants; there is no catch-all
//! boxed value, so encoders and exporters match exhaustively.

use crate::identity::{builtin, TypeIdentity};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use uuid::Uuid;

/// A primitive value
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Boolean
    Bool(bool),
    /// Unicode scalar value
    Char(char),
    /// Signed 8-bit integer
    I8(i8),
    /// Unsigned 8-bit integer
    U8(u8),
    /// Signed 16-bit integer
    I16(i16),
    /// Unsigned 16-bit integer
    U16(u16),
    /// Signed 32-bit integer
    I32(i32),
    /// Unsigned 32-bit integer
    U32(u32),
    /// Signed 64-bit integer
    I64(i64),
    /// Unsigned 64-bit integer
    U64(u64),
    /// 32-bit float
    F32(f32),
    /// 64-bit float
    F64(f64),
    /// UTF-8 string
    String(String),
    /// GUID
    Guid(Uuid),
    /// UTC date-time
    DateTime(DateTime<Utc>),
    /// Signed duration
    TimeSpan(Duration),
    /// Date-time with a fixed offset
    DateTimeOffset(DateTime<FixedOffset>),
}

/// Discriminant of a [`Scalar`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// `bool`
    Bool,
    /// `char`
    Char,
    /// `i8`
    I8,
    /// `u8`
    U8,
    /// `i16`
    I16,
    /// `u16`
    U16,
    /// `i32`
    I32,
    /// `u32`
    U32,
    /// `i64`
    I64,
    /// `u64`
    U64,
    /// `f32`
    F32,
    /// `f64`
    F64,
    /// `string`
    String,
    /// `guid`
    Guid,
    /// `datetime`
    DateTime,
    /// `timespan`
    TimeSpan,
    /// `datetimeoffset`
    DateTimeOffset,
}

impl ScalarKind {
    /// Every scalar kind, in declaration order
    pub const ALL: [ScalarKind; 17] = [
        ScalarKind::Bool,
        ScalarKind::Char,
        ScalarKind::I8,
        ScalarKind::U8,
        ScalarKind::I16,
        ScalarKind::U16,
        ScalarKind::I32,
        ScalarKind::U32,
        ScalarKind::I64,
        ScalarKind::U64,
        ScalarKind::F32,
        ScalarKind::F64,
        ScalarKind::String,
        ScalarKind::Guid,
        ScalarKind::DateTime,
        ScalarKind::TimeSpan,
        ScalarKind::DateTimeOffset,
    ];

    /// Built-in identity name
    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::Bool => builtin::BOOL,
            ScalarKind::Char => builtin::CHAR,
            ScalarKind::I8 => builtin::I8,
            ScalarKind::U8 => builtin::U8,
            ScalarKind::I16 => builtin::I16,
            ScalarKind::U16 => builtin::U16,
            ScalarKind::I32 => builtin::I32,
            ScalarKind::U32 => builtin::U32,
            ScalarKind::I64 => builtin::I64,
            ScalarKind::U64 => builtin::U64,
            ScalarKind::F32 => builtin::F32,
            ScalarKind::F64 => builtin::F64,
            ScalarKind::String => builtin::STRING,
            ScalarKind::Guid => builtin::GUID,
            ScalarKind::DateTime => builtin::DATETIME,
            ScalarKind::TimeSpan => builtin::TIMESPAN,
            ScalarKind::DateTimeOffset => builtin::DATETIMEOFFSET,
        }
    }

    /// Built-in identity
    pub fn identity(self) -> TypeIdentity {
        TypeIdentity::new(self.name())
    }

    /// Look up a kind by its built-in name
    pub fn from_name(name: &str) -> Option<ScalarKind> {
        ScalarKind::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// True for the integer kinds an enum may use as its underlying type
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            ScalarKind::I8
                | ScalarKind::U8
                | ScalarKind::I16
                | ScalarKind::U16
                | ScalarKind::I32
                | ScalarKind::U32
                | ScalarKind::I64
                | ScalarKind::U64
        )
    }

    /// Convert an enum's `i64` value into a scalar of this integral kind.
    ///
    /// `u64` reinterprets the bits; narrower kinds require the value to fit.
    pub fn integral_from_i64(self, value: i64) -> Option<Scalar> {
        Some(match self {
            ScalarKind::I8 => Scalar::I8(i8::try_from(value).ok()?),
            ScalarKind::U8 => Scalar::U8(u8::try_from(value).ok()?),
            ScalarKind::I16 => Scalar::I16(i16::try_from(value).ok()?),
            ScalarKind::U16 => Scalar::U16(u16::try_from(value).ok()?),
            ScalarKind::I32 => Scalar::I32(i32::try_from(value).ok()?),
            ScalarKind::U32 => Scalar::U32(u32::try_from(value).ok()?),
            ScalarKind::I64 => Scalar::I64(value),
            ScalarKind::U64 => Scalar::U64(value as u64),
            _ => return None,
        })
    }
}

impl Scalar {
    /// Kind of this scalar
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::Bool(_) => ScalarKind::Bool,
            Scalar::Char(_) => ScalarKind::Char,
            Scalar::I8(_) => ScalarKind::I8,
            Scalar::U8(_) => ScalarKind::U8,
            Scalar::I16(_) => ScalarKind::I16,
            Scalar::U16(_) => ScalarKind::U16,
            Scalar::I32(_) => ScalarKind::I32,
            Scalar::U32(_) => ScalarKind::U32,
            Scalar::I64(_) => ScalarKind::I64,
            Scalar::U64(_) => ScalarKind::U64,
            Scalar::F32(_) => ScalarKind::F32,
            Scalar::F64(_) => ScalarKind::F64,
            Scalar::String(_) => ScalarKind::String,
            Scalar::Guid(_) => ScalarKind::Guid,
            Scalar::DateTime(_) => ScalarKind::DateTime,
            Scalar::TimeSpan(_) => ScalarKind::TimeSpan,
            Scalar::DateTimeOffset(_) => ScalarKind::DateTimeOffset,
        }
    }

    /// Integral value widened to `i64` (`u64` reinterprets the bits)
    pub fn integral_as_i64(&self) -> Option<i64> {
        Some(match *self {
            Scalar::I8(v) => i64::from(v),
            Scalar::U8(v) => i64::from(v),
            Scalar::I16(v) => i64::from(v),
            Scalar::U16(v) => i64::from(v),
            Scalar::I32(v) => i64::from(v),
            Scalar::U32(v) => i64::from(v),
            Scalar::I64(v) => v,
            Scalar::U64(v) => v as i64,
            _ => return None,
        })
    }

    /// Borrow a string payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::I32(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::I64(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::F64(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::String(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::String(v)
    }
}
