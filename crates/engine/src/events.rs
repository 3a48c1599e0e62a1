//! Mutation events recorded by transactions
//!
//! Events become the `events` list of a transaction's journal fragment.
//! Each one exports as a value struct typed `tessera.<Kind>` whose
//! `Target` is the arena index of the object mutated. Values that reference
//! objects export those objects in full the first time a fragment reaches
//! them.

use tessera_core::{ObjectId, Scalar, StructValue, Value};

/// Type name prefix of exported events
pub const EVENT_TYPE_PREFIX: &str = "tessera.";

/// One change made by a transaction
#[derive(Debug, Clone, PartialEq)]
pub enum MutationEvent {
    /// A new object was added to the graph
    Created {
        /// New object
        id: ObjectId,
    },
    /// The domain root was replaced
    RootChanged {
        /// New root
        root: Value,
    },
    /// A record field was assigned
    FieldSet {
        /// Record
        target: ObjectId,
        /// Field name
        field: String,
        /// New value
        value: Value,
    },
    /// A sequence item was replaced in place
    ItemSet {
        /// List or array
        target: ObjectId,
        /// Position
        index: usize,
        /// New item
        value: Value,
    },
    /// An item was appended to a list
    ItemPushed {
        /// List
        target: ObjectId,
        /// Appended item
        value: Value,
    },
    /// An item was inserted into a list
    ItemInserted {
        /// List
        target: ObjectId,
        /// Position
        index: usize,
        /// Inserted item
        value: Value,
    },
    /// An item was removed from a list
    ItemRemoved {
        /// List
        target: ObjectId,
        /// Former position
        index: usize,
    },
    /// A map entry was added or replaced
    MapInserted {
        /// Map
        target: ObjectId,
        /// Key
        key: Value,
        /// New value
        value: Value,
    },
    /// A map entry was removed
    MapRemoved {
        /// Map
        target: ObjectId,
        /// Key
        key: Value,
    },
    /// A member was added to a set
    SetAdded {
        /// Set
        target: ObjectId,
        /// Member
        member: Value,
    },
    /// A member was removed from a set
    SetRemoved {
        /// Set
        target: ObjectId,
        /// Member
        member: Value,
    },
}

impl MutationEvent {
    /// Short event kind
    pub fn kind(&self) -> &'static str {
        match self {
            MutationEvent::Created { .. } => "Created",
            MutationEvent::RootChanged { .. } => "RootChanged",
            MutationEvent::FieldSet { .. } => "FieldSet",
            MutationEvent::ItemSet { .. } => "ItemSet",
            MutationEvent::ItemPushed { .. } => "ItemPushed",
            MutationEvent::ItemInserted { .. } => "ItemInserted",
            MutationEvent::ItemRemoved { .. } => "ItemRemoved",
            MutationEvent::MapInserted { .. } => "MapInserted",
            MutationEvent::MapRemoved { .. } => "MapRemoved",
            MutationEvent::SetAdded { .. } => "SetAdded",
            MutationEvent::SetRemoved { .. } => "SetRemoved",
        }
    }

    /// Object the event applies to, if any
    pub fn target(&self) -> Option<ObjectId> {
        match self {
            MutationEvent::Created { id } => Some(*id),
            MutationEvent::RootChanged { .. } => None,
            MutationEvent::FieldSet { target, .. }
            | MutationEvent::ItemSet { target, .. }
            | MutationEvent::ItemPushed { target, .. }
            | MutationEvent::ItemInserted { target, .. }
            | MutationEvent::ItemRemoved { target, .. }
            | MutationEvent::MapInserted { target, .. }
            | MutationEvent::MapRemoved { target, .. }
            | MutationEvent::SetAdded { target, .. }
            | MutationEvent::SetRemoved { target, .. } => Some(*target),
        }
    }

    /// Exportable form of the event
    pub fn to_value(&self) -> Value {
        let mut event = StructValue::new(format!("{}{}", EVENT_TYPE_PREFIX, self.kind()));
        if let Some(target) = self.target() {
            event.set("Target", Scalar::U32(target.index()));
        }
        match self {
            MutationEvent::Created { id } => {
                event.set("Object", Value::Ref(*id));
            }
            MutationEvent::RootChanged { root } => {
                event.set("Root", root.clone());
            }
            MutationEvent::FieldSet { field, value, .. } => {
                event.set("Field", Value::string(field.clone()));
                event.set("Value", value.clone());
            }
            MutationEvent::ItemSet { index, value, .. }
            | MutationEvent::ItemInserted { index, value, .. } => {
                event.set("Index", index_value(*index));
                event.set("Value", value.clone());
            }
            MutationEvent::ItemPushed { value, .. } => {
                event.set("Value", value.clone());
            }
            MutationEvent::ItemRemoved { index, .. } => {
                event.set("Index", index_value(*index));
            }
            MutationEvent::MapInserted { key, value, .. } => {
                event.set("Key", key.clone());
                event.set("Value", value.clone());
            }
            MutationEvent::MapRemoved { key, .. } => {
                event.set("Key", key.clone());
            }
            MutationEvent::SetAdded { member, .. } | MutationEvent::SetRemoved { member, .. } => {
                event.set("Member", member.clone());
            }
        }
        Value::Struct(event)
    }
}

fn index_value(index: usize) -> Value {
    Value::Scalar(Scalar::U64(index as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_set_layout() {
        let event = MutationEvent::FieldSet {
            target: ObjectId::from_index(4),
            field: "Name".into(),
            value: Value::string("Ada"),
        };
        let Value::Struct(s) = event.to_value() else {
            panic!("events export as structs");
        };
        assert_eq!(s.type_id.as_str(), "tessera.FieldSet");
        let names: Vec<&str> = s.fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Target", "Field", "Value"]);
        assert_eq!(s.get("Target"), Some(&Value::Scalar(Scalar::U32(4))));
    }

    #[test]
    fn test_root_change_has_no_target() {
        let event = MutationEvent::RootChanged { root: Value::Null };
        assert_eq!(event.target(), None);
        let Value::Struct(s) = event.to_value() else {
            panic!("events export as structs");
        };
        assert!(s.get("Target").is_none());
        assert_eq!(s.get("Root"), Some(&Value::Null));
    }
}
