//! Reference-typed object kinds

use super::keyed::{MapObject, SetObject};
use crate::identity::TypeIdentity;
use crate::value::Value;

/// A reference-typed instance stored in the arena
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Identity allocated, contents not completed yet
    Pending,
    /// Bare `object` instance with no state
    Empty,
    /// Named-field record
    Record(Record),
    /// Growable list
    List(Sequence),
    /// Fixed-length array
    Array(Sequence),
    /// Dictionary
    Map(MapObject),
    /// Hash set
    Set(SetObject),
}

impl Object {
    /// Short kind name used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Object::Pending => "pending",
            Object::Empty => "object",
            Object::Record(_) => "record",
            Object::List(_) => "list",
            Object::Array(_) => "array",
            Object::Map(_) => "map",
            Object::Set(_) => "set",
        }
    }

    /// Wire identity of this object's type; `None` while pending
    pub fn type_identity(&self) -> Option<TypeIdentity> {
        Some(match self {
            Object::Pending => return None,
            Object::Empty => TypeIdentity::object(),
            Object::Record(r) => r.type_id.clone(),
            Object::List(s) => TypeIdentity::list_of(&s.element),
            Object::Array(s) => TypeIdentity::array_of(&s.element),
            Object::Map(m) => TypeIdentity::map_of(m.key_type(), m.value_type()),
            Object::Set(s) => TypeIdentity::set_of(s.element_type()),
        })
    }
}

/// Reference-typed record with named fields
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Most-derived type
    pub type_id: TypeIdentity,
    /// Fields across the whole ancestor chain, root layer first
    pub fields: Vec<(String, Value)>,
}

impl Record {
    /// Record with no fields set
    pub fn new(type_id: impl Into<TypeIdentity>) -> Self {
        Record {
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

    /// Remove a field entirely
    pub fn unset(&mut self, name: &str) -> Option<Value> {
        let pos = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(pos).1)
    }
}

/// Ordered items of a list or array
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    /// Declared element type
    pub element: TypeIdentity,
    /// Items in order
    pub items: Vec<Value>,
}

impl Sequence {
    /// Empty sequence
    pub fn new(element: TypeIdentity) -> Self {
        Sequence {
            element,
            items: Vec::new(),
        }
    }

    /// Sequence with the given items
    pub fn from_items(element: TypeIdentity, items: Vec<Value>) -> Self {
        Sequence { element, items }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::KeyComparer;

    #[test]
    fn test_composite_identities() {
        let person = TypeIdentity::new("demo.Person");
        let list = Object::List(Sequence::new(person.clone()));
        assert_eq!(list.type_identity().unwrap().as_str(), "List<demo.Person>");

        let map = Object::Map(MapObject::new(
            TypeIdentity::new("string"),
            person,
            KeyComparer::Ordinal,
        ));
        assert_eq!(
            map.type_identity().unwrap().as_str(),
            "Map<string,demo.Person>"
        );
        assert_eq!(Object::Pending.type_identity(), None);
        assert_eq!(Object::Empty.type_identity().unwrap().as_str(), "object");
    }

    #[test]
    fn test_record_fields() {
        let mut r = Record::new("demo.Person").with("Name", Value::string("A"));
        assert_eq!(r.set("Name", Value::string("B")), Some(Value::string("A")));
        assert_eq!(r.unset("Name"), Some(Value::string("B")));
        assert!(r.get("Name").is_none());
    }
}
