//! The driver contract
//!
//! A driver knows how to write and read the content of one type. The
//! decoder and encoder own everything around that content: markers, type
//! entries, reference tracking and debug sentinels. Drivers only see the
//! part of the stream that belongs to a single instance.
//!
//! ## Shapes
//!
//! | Shape | Written as | Tracked |
//! |-------|------------|---------|
//! | `Inline` | scalar marker + payload | no |
//! | `Dynamic` | whatever the runtime value is | n/a |
//! | `Value` | `Struct` marker + type entry + content | no |
//! | `Reference(_)` | `Object` marker + type entry + content | yes |
//!
//! A *sealed* driver (value shape, externally versioned) has no subtypes
//! and no schema evolution, so composites write its instances naked: no
//! marker, no type entry.

use crate::catalog::{LayerInfo, TypeInfo};
use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::{CodecError, CodecResult};
use std::fmt;
use std::sync::Arc;
use tessera_core::{Object, ObjectId, TypeIdentity, Value};

/// When a decoded reference object gets its handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Decode the contents, then track the finished object
    Direct,
    /// Track a pending identity first so the contents can refer back to it
    PreTrack,
}

/// How instances of a type are framed on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Scalar with its own marker
    Inline,
    /// The bare `object` type; instances carry their own runtime type
    Dynamic,
    /// Value type: copied, never tracked
    Value,
    /// Reference type: tracked in the reference table
    Reference(Registration),
}

/// How a type's version is recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Versioning {
    /// Written as version -1; no schema evolution on the wire
    External,
    /// Every layer of the ancestor chain, root first
    SelfDescribing(Arc<[LayerInfo]>),
}

/// Result of decoding one instance
#[derive(Debug)]
pub enum Decoded {
    /// A reference-typed object for the arena
    Object(Object),
    /// A value-typed instance
    Value(Value),
}

impl Decoded {
    /// Unwrap an object, or report the driver as broken
    pub fn into_object(self, identity: &TypeIdentity) -> CodecResult<Object> {
        match self {
            Decoded::Object(object) => Ok(object),
            Decoded::Value(_) => Err(CodecError::contract(
                identity,
                "reference driver returned a value",
            )),
        }
    }

    /// Unwrap a value, or report the driver as broken
    pub fn into_value(self, identity: &TypeIdentity) -> CodecResult<Value> {
        match self {
            Decoded::Value(value) => Ok(value),
            Decoded::Object(_) => Err(CodecError::contract(
                identity,
                "value driver returned an object",
            )),
        }
    }
}

/// The instance a driver is asked to encode
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    /// A value-typed instance
    Value(&'a Value),
    /// A reference-typed object and its id
    Object(ObjectId, &'a Object),
}

impl<'a> Subject<'a> {
    /// Short description for error messages
    pub fn describe(&self) -> String {
        match self {
            Subject::Value(Value::Null) => "null".to_string(),
            Subject::Value(Value::Scalar(s)) => format!("{} scalar", s.kind().name()),
            Subject::Value(Value::Enum(e)) => format!("enum {}", e.type_id),
            Subject::Value(Value::Struct(s)) => format!("struct {}", s.type_id),
            Subject::Value(Value::Ref(id)) => format!("reference {}", id),
            Subject::Object(id, object) => format!("{} {}", object.kind_name(), id),
        }
    }

    /// Error for a subject this driver cannot encode
    pub fn mismatch(&self, driver: &TypeIdentity) -> CodecError {
        CodecError::encode(format!(
            "driver '{}' cannot encode {}",
            driver,
            self.describe()
        ))
    }
}

/// Encoding and decoding strategy for one type
pub trait Driver: Send + Sync + fmt::Debug {
    /// Identity this driver is registered under
    fn identity(&self) -> &TypeIdentity;

    /// Wire framing of instances
    fn shape(&self) -> Shape;

    /// How the type's version is recorded
    fn versioning(&self) -> Versioning {
        Versioning::External
    }

    /// Read one instance's content.
    ///
    /// `this` is the pending arena id for pre-tracked reference types.
    fn decode(
        &self,
        d: &mut Decoder<'_>,
        info: &TypeInfo,
        this: Option<ObjectId>,
    ) -> CodecResult<Decoded>;

    /// Write one instance's content
    fn encode(&self, e: &mut Encoder<'_>, subject: Subject<'_>) -> CodecResult<()>;

    /// True if composites write instances without marker or type entry
    fn is_sealed(&self) -> bool {
        self.shape() == Shape::Value && self.versioning() == Versioning::External
    }
}

/// A composite's constituent driver, with the framing decided once
#[derive(Debug, Clone)]
pub struct Element {
    /// Constituent driver
    pub driver: Arc<dyn Driver>,
    /// Info handed to the driver for naked instances
    pub info: TypeInfo,
    /// Instances are written naked
    pub sealed: bool,
}

impl Element {
    /// Wrap a constituent driver
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        let info = TypeInfo::external(driver.identity().clone());
        let sealed = driver.is_sealed();
        Element {
            driver,
            info,
            sealed,
        }
    }

    /// Identity of the constituent type
    pub fn identity(&self) -> &TypeIdentity {
        self.driver.identity()
    }
}
