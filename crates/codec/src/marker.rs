//! Value markers and mode bytes
//!
//! Every value on the wire starts with a single marker byte. Markers are
//! `0..=15`; mode bytes (`180..=182`) live far outside that range so the
//! decoder can tell them apart with one peek.

use tessera_core::ScalarKind;

/// Tag byte at the start of every value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Marker {
    /// Absent reference
    Null = 0,
    /// UTF-8 string
    String = 1,
    /// `i32`
    Int32 = 2,
    /// `f64`
    Double = 3,
    /// `char`
    Char = 4,
    /// `bool`
    Boolean = 5,
    /// `u32`
    UInt32 = 6,
    /// `f32`
    Float = 7,
    /// UTC date-time
    DateTime = 8,
    /// GUID
    Guid = 9,
    /// Duration
    TimeSpan = 10,
    /// Date-time with offset
    DateTimeOffset = 11,
    /// Back-reference to an already tracked object
    Reference = 12,
    /// Bare `object` instance
    EmptyObject = 13,
    /// Reference-typed instance with a type entry
    Object = 14,
    /// Value-typed instance with a type entry
    Struct = 15,
}

impl Marker {
    /// Decode a marker byte
    pub fn from_byte(byte: u8) -> Option<Marker> {
        Some(match byte {
            0 => Marker::Null,
            1 => Marker::String,
            2 => Marker::Int32,
            3 => Marker::Double,
            4 => Marker::Char,
            5 => Marker::Boolean,
            6 => Marker::UInt32,
            7 => Marker::Float,
            8 => Marker::DateTime,
            9 => Marker::Guid,
            10 => Marker::TimeSpan,
            11 => Marker::DateTimeOffset,
            12 => Marker::Reference,
            13 => Marker::EmptyObject,
            14 => Marker::Object,
            15 => Marker::Struct,
            _ => return None,
        })
    }

    /// Wire byte
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Marker used for inline scalars of `kind`; `None` for kinds written
    /// as value types under [`Marker::Struct`]
    pub fn for_scalar(kind: ScalarKind) -> Option<Marker> {
        Some(match kind {
            ScalarKind::String => Marker::String,
            ScalarKind::I32 => Marker::Int32,
            ScalarKind::F64 => Marker::Double,
            ScalarKind::Char => Marker::Char,
            ScalarKind::Bool => Marker::Boolean,
            ScalarKind::U32 => Marker::UInt32,
            ScalarKind::F32 => Marker::Float,
            ScalarKind::DateTime => Marker::DateTime,
            ScalarKind::Guid => Marker::Guid,
            ScalarKind::TimeSpan => Marker::TimeSpan,
            ScalarKind::DateTimeOffset => Marker::DateTimeOffset,
            ScalarKind::I8
            | ScalarKind::U8
            | ScalarKind::I16
            | ScalarKind::U16
            | ScalarKind::I64
            | ScalarKind::U64 => return None,
        })
    }

    /// Scalar kind carried inline by this marker
    pub fn scalar_kind(self) -> Option<ScalarKind> {
        Some(match self {
            Marker::String => ScalarKind::String,
            Marker::Int32 => ScalarKind::I32,
            Marker::Double => ScalarKind::F64,
            Marker::Char => ScalarKind::Char,
            Marker::Boolean => ScalarKind::Bool,
            Marker::UInt32 => ScalarKind::U32,
            Marker::Float => ScalarKind::F32,
            Marker::DateTime => ScalarKind::DateTime,
            Marker::Guid => ScalarKind::Guid,
            Marker::TimeSpan => ScalarKind::TimeSpan,
            Marker::DateTimeOffset => ScalarKind::DateTimeOffset,
            Marker::Null
            | Marker::Reference
            | Marker::EmptyObject
            | Marker::Object
            | Marker::Struct => return None,
        })
    }
}

/// Debug-mode switch that may precede any value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ModeByte {
    /// Leave debug mode unchanged
    NoChange = 180,
    /// Stop writing sentinels
    ExitDebug = 181,
    /// Start writing sentinels
    EnterDebug = 182,
}

impl ModeByte {
    /// Decode a mode byte
    pub fn from_byte(byte: u8) -> Option<ModeByte> {
        match byte {
            180 => Some(ModeByte::NoChange),
            181 => Some(ModeByte::ExitDebug),
            182 => Some(ModeByte::EnterDebug),
            _ => None,
        }
    }

    /// Wire byte
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Debug state after applying this byte to `current`
    pub fn apply(self, current: bool) -> bool {
        match self {
            ModeByte::NoChange => current,
            ModeByte::ExitDebug => false,
            ModeByte::EnterDebug => true,
        }
    }
}
