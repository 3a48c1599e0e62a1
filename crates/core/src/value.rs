//! Graph values
//!
//! A [`Value`] is what a field, list item, map key or root slot holds. Value
//! types (`Scalar`, `EnumValue`, `StructValue`) are copied by value and have
//! no identity; reference types live in the [`Graph`](crate::graph::Graph)
//! arena and are held as `Value::Ref`.

use crate::graph::ObjectId;
use crate::identity::TypeIdentity;
use crate::scalar::Scalar;

/// A slot in the object graph
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent reference
    #[default]
    Null,
    /// Primitive
    Scalar(Scalar),
    /// Enum member stored as its integral value
    Enum(EnumValue),
    /// Value-type record
    Struct(StructValue),
    /// Reference to an arena object
    Ref(ObjectId),
}

impl Value {
    /// String scalar
    pub fn string(s: impl Into<String>) -> Self {
        Value::Scalar(Scalar::String(s.into()))
    }

    /// `i32` scalar
    pub fn i32(v: i32) -> Self {
        Value::Scalar(Scalar::I32(v))
    }

    /// `i64` scalar
    pub fn i64(v: i64) -> Self {
        Value::Scalar(Scalar::I64(v))
    }

    /// `f64` scalar
    pub fn f64(v: f64) -> Self {
        Value::Scalar(Scalar::F64(v))
    }

    /// `bool` scalar
    pub fn bool(v: bool) -> Self {
        Value::Scalar(Scalar::Bool(v))
    }

    /// True for `Value::Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Referenced object, if this is a reference
    pub fn as_ref_id(&self) -> Option<ObjectId> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Scalar payload, if any
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// String payload, if any
    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_str)
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Ref(id)
    }
}

impl From<EnumValue> for Value {
    fn from(e: EnumValue) -> Self {
        Value::Enum(e)
    }
}

impl From<StructValue> for Value {
    fn from(s: StructValue) -> Self {
        Value::Struct(s)
    }
}

/// Enum member
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumValue {
    /// Enum type
    pub type_id: TypeIdentity,
    /// Integral value (u64 enums store the bit pattern)
    pub value: i64,
}

impl EnumValue {
    /// Create an enum member
    pub fn new(type_id: impl Into<TypeIdentity>, value: i64) -> Self {
        EnumValue {
            type_id: type_id.into(),
            value,
        }
    }
}

/// Value-type record: named fields, no identity
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    /// Struct type
    pub type_id: TypeIdentity,
    /// Fields in declaration order
    pub fields: Vec<(String, Value)>,
}

impl StructValue {
    /// Empty struct of the given type
    pub fn new(type_id: impl Into<TypeIdentity>) -> Self {
        StructValue {
            type_id: type_id.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style field assignment
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Read a field
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Write a field, returning the previous value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.fields.push((name, value));
                None
            }
        }
    }
}
