//! Keyed collections (maps and sets)
//!
//! Lookup goes through a [`KeyComparer`]. Only three comparers exist:
//! structural default, ordinal and ordinal-ignore-case. The last two only
//! apply to `string` keys; every other key type is normalized to the
//! structural comparer. Arbitrary comparer identity is not representable.

use super::ObjectId;
use crate::identity::{builtin, TypeIdentity};
use crate::scalar::{Scalar, ScalarKind};
use crate::value::Value;
use rustc_hash::FxHashMap;

/// Key equality semantics of a map or set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyComparer {
    /// Value equality for value types, identity for references
    #[default]
    Structural,
    /// Byte-wise string equality
    Ordinal,
    /// Case-insensitive string equality
    OrdinalIgnoreCase,
}

impl KeyComparer {
    /// Wire byte
    pub fn to_byte(self) -> u8 {
        match self {
            KeyComparer::Structural => 0,
            KeyComparer::Ordinal => 1,
            KeyComparer::OrdinalIgnoreCase => 2,
        }
    }

    /// Parse a wire byte; `None` for anything outside the closed set
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(KeyComparer::Structural),
            1 => Some(KeyComparer::Ordinal),
            2 => Some(KeyComparer::OrdinalIgnoreCase),
            _ => None,
        }
    }

    /// Comparer actually used for keys of `key_type`
    pub fn normalize_for(self, key_type: &TypeIdentity) -> Self {
        if key_type.weak().as_str() == builtin::STRING {
            self
        } else {
            KeyComparer::Structural
        }
    }

    /// Lookup key for `value` under this comparer
    pub fn key_of(self, value: &Value) -> MapKey {
        MapKey::from_value(value, self)
    }
}

/// Hashable, comparer-normalized form of a key value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    /// Null key
    Null,
    /// Fixed-width scalar reduced to its bits
    Bits(ScalarKind, u128),
    /// String key (case-folded under ignore-case)
    Text(String),
    /// Enum member
    Enum(TypeIdentity, i64),
    /// Value-type record, field by field
    Struct(TypeIdentity, Vec<(String, MapKey)>),
    /// Reference identity
    Object(ObjectId),
}

impl MapKey {
    fn from_value(value: &Value, comparer: KeyComparer) -> Self {
        match value {
            Value::Null => MapKey::Null,
            Value::Scalar(Scalar::String(s)) => match comparer {
                KeyComparer::OrdinalIgnoreCase => MapKey::Text(s.to_lowercase()),
                _ => MapKey::Text(s.clone()),
            },
            Value::Scalar(s) => MapKey::Bits(s.kind(), scalar_bits(s)),
            Value::Enum(e) => MapKey::Enum(e.type_id.clone(), e.value),
            Value::Struct(s) => MapKey::Struct(
                s.type_id.clone(),
                s.fields
                    .iter()
                    .map(|(n, v)| (n.clone(), MapKey::from_value(v, KeyComparer::Structural)))
                    .collect(),
            ),
            Value::Ref(id) => MapKey::Object(*id),
        }
    }
}

fn float_bits(v: f64) -> u128 {
    if v == 0.0 {
        0
    } else if v.is_nan() {
        u128::from(f64::NAN.to_bits())
    } else {
        u128::from(v.to_bits())
    }
}

fn nanos(secs: i64, subsec: i64) -> u128 {
    (i128::from(secs) * 1_000_000_000 + i128::from(subsec)) as u128
}

fn scalar_bits(s: &Scalar) -> u128 {
    match s {
        Scalar::Bool(v) => u128::from(*v),
        Scalar::Char(c) => u128::from(u32::from(*c)),
        Scalar::I8(v) => i128::from(*v) as u128,
        Scalar::U8(v) => u128::from(*v),
        Scalar::I16(v) => i128::from(*v) as u128,
        Scalar::U16(v) => u128::from(*v),
        Scalar::I32(v) => i128::from(*v) as u128,
        Scalar::U32(v) => u128::from(*v),
        Scalar::I64(v) => i128::from(*v) as u128,
        Scalar::U64(v) => u128::from(*v),
        Scalar::F32(v) => float_bits(f64::from(*v)),
        Scalar::F64(v) => float_bits(*v),
        Scalar::Guid(g) => g.as_u128(),
        Scalar::DateTime(dt) => nanos(dt.timestamp(), i64::from(dt.timestamp_subsec_nanos())),
        Scalar::TimeSpan(d) => nanos(d.num_seconds(), i64::from(d.subsec_nanos())),
        Scalar::DateTimeOffset(dt) => {
            nanos(dt.timestamp(), i64::from(dt.timestamp_subsec_nanos()))
        }
        // Strings are keyed as text before reaching here
        Scalar::String(_) => 0,
    }
}

/// Insertion-ordered dictionary with comparer-aware lookup
#[derive(Debug, Clone, PartialEq)]
pub struct MapObject {
    key_type: TypeIdentity,
    value_type: TypeIdentity,
    comparer: KeyComparer,
    entries: Vec<(Value, Value)>,
    index: FxHashMap<MapKey, usize>,
}

impl MapObject {
    /// Empty map; the comparer is normalized for the key type
    pub fn new(key_type: TypeIdentity, value_type: TypeIdentity, comparer: KeyComparer) -> Self {
        let comparer = comparer.normalize_for(&key_type);
        MapObject {
            key_type,
            value_type,
            comparer,
            entries: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    /// Declared key type
    pub fn key_type(&self) -> &TypeIdentity {
        &self.key_type
    }

    /// Declared value type
    pub fn value_type(&self) -> &TypeIdentity {
        &self.value_type
    }

    /// Effective comparer
    pub fn comparer(&self) -> KeyComparer {
        self.comparer
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace; returns the replaced value.
    ///
    /// Replacing keeps the entry's position and its original key.
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        let k = self.comparer.key_of(&key);
        match self.index.get(&k) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos].1, value)),
            None => {
                self.index.insert(k, self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Look up a value
    pub fn get(&self, key: &Value) -> Option<&Value> {
        let pos = *self.index.get(&self.comparer.key_of(key))?;
        Some(&self.entries[pos].1)
    }

    /// True if `key` is present
    pub fn contains_key(&self, key: &Value) -> bool {
        self.index.contains_key(&self.comparer.key_of(key))
    }

    /// Remove an entry, returning the stored key and value
    pub fn remove(&mut self, key: &Value) -> Option<(Value, Value)> {
        let pos = self.index.remove(&self.comparer.key_of(key))?;
        let removed = self.entries.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

/// Insertion-ordered hash set with comparer-aware membership
#[derive(Debug, Clone, PartialEq)]
pub struct SetObject {
    element: TypeIdentity,
    comparer: KeyComparer,
    members: Vec<Value>,
    index: FxHashMap<MapKey, usize>,
}

impl SetObject {
    /// Empty set; the comparer is normalized for the element type
    pub fn new(element: TypeIdentity, comparer: KeyComparer) -> Self {
        let comparer = comparer.normalize_for(&element);
        SetObject {
            element,
            comparer,
            members: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    /// Declared element type
    pub fn element_type(&self) -> &TypeIdentity {
        &self.element
    }

    /// Effective comparer
    pub fn comparer(&self) -> KeyComparer {
        self.comparer
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True if empty
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Add a member; false if an equal member exists
    pub fn insert(&mut self, value: Value) -> bool {
        let k = self.comparer.key_of(&value);
        if self.index.contains_key(&k) {
            return false;
        }
        self.index.insert(k, self.members.len());
        self.members.push(value);
        true
    }

    /// True if an equal member exists
    pub fn contains(&self, value: &Value) -> bool {
        self.index.contains_key(&self.comparer.key_of(value))
    }

    /// Remove a member, returning the stored value
    pub fn remove(&mut self, value: &Value) -> Option<Value> {
        let pos = self.index.remove(&self.comparer.key_of(value))?;
        let removed = self.members.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    /// Members in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.members.iter()
    }
}
