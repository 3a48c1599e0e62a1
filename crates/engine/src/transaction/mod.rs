//! Transactions over a domain graph
//!
//! A [`Transaction`] is handed to the body passed to
//! [`Domain::transact`](crate::Domain::transact). Every mutation is checked
//! before it touches the graph, then applied in place while recording:
//! - a [`MutationEvent`] for the journal fragment
//! - an undo entry for rollback
//!
//! If the body returns an error the undo log is replayed newest-first and
//! objects created by the transaction are truncated away, leaving the graph
//! exactly as it was.

mod undo;

use crate::error::{DomainError, DomainResult};
use crate::events::MutationEvent;
use tessera_core::{Graph, Object, ObjectId, Value};
use tracing::warn;
use undo::Undo;

/// Mutable view of a domain for one transaction
pub struct Transaction<'a> {
    graph: &'a mut Graph,
    root: &'a mut Value,
    base_len: usize,
    events: Vec<MutationEvent>,
    undo: Vec<Undo>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(graph: &'a mut Graph, root: &'a mut Value) -> Self {
        let base_len = graph.len();
        Transaction {
            graph,
            root,
            base_len,
            events: Vec::new(),
            undo: Vec::new(),
        }
    }

    /// Current graph, including this transaction's changes
    pub fn graph(&self) -> &Graph {
        self.graph
    }

    /// Current root
    pub fn root(&self) -> &Value {
        self.root
    }

    /// Events recorded so far
    pub fn events(&self) -> &[MutationEvent] {
        &self.events
    }

    /// Add an object to the graph
    pub fn create(&mut self, object: Object) -> DomainResult<ObjectId> {
        if matches!(object, Object::Pending) {
            return Err(DomainError::invalid("cannot create a pending object"));
        }
        self.check_object(&object)?;
        let id = self.graph.insert(object);
        self.events.push(MutationEvent::Created { id });
        Ok(id)
    }

    /// Replace the domain root
    pub fn set_root(&mut self, root: Value) -> DomainResult<()> {
        self.check_value(&root)?;
        let previous = std::mem::replace(self.root, root.clone());
        self.undo.push(Undo::Root(previous));
        self.events.push(MutationEvent::RootChanged { root });
        Ok(())
    }

    /// Assign a record field
    pub fn set_field(
        &mut self,
        target: ObjectId,
        field: impl Into<String>,
        value: Value,
    ) -> DomainResult<()> {
        let field = field.into();
        self.check_value(&value)?;
        let previous = self.graph.record_mut(target)?.set(field.clone(), value.clone());
        self.undo.push(Undo::Field {
            target,
            field: field.clone(),
            previous,
        });
        self.events.push(MutationEvent::FieldSet {
            target,
            field,
            value,
        });
        Ok(())
    }

    /// Replace the item at `index` of a list or array
    pub fn set_item(&mut self, target: ObjectId, index: usize, value: Value) -> DomainResult<()> {
        self.check_value(&value)?;
        let items = &mut self.graph.sequence_mut(target)?.items;
        let len = items.len();
        let slot = items
            .get_mut(index)
            .ok_or_else(|| out_of_bounds(target, index, len))?;
        let previous = std::mem::replace(slot, value.clone());
        self.undo.push(Undo::Item {
            target,
            index,
            previous,
        });
        self.events.push(MutationEvent::ItemSet {
            target,
            index,
            value,
        });
        Ok(())
    }

    /// Append to a list
    pub fn push(&mut self, target: ObjectId, value: Value) -> DomainResult<()> {
        self.check_value(&value)?;
        self.growable(target)?.items.push(value.clone());
        self.undo.push(Undo::Pushed { target });
        self.events.push(MutationEvent::ItemPushed { target, value });
        Ok(())
    }

    /// Insert into a list at `index` (`index == len` appends)
    pub fn insert_item(&mut self, target: ObjectId, index: usize, value: Value) -> DomainResult<()> {
        self.check_value(&value)?;
        let items = &mut self.growable(target)?.items;
        if index > items.len() {
            return Err(out_of_bounds(target, index, items.len()));
        }
        items.insert(index, value.clone());
        self.undo.push(Undo::Inserted { target, index });
        self.events.push(MutationEvent::ItemInserted {
            target,
            index,
            value,
        });
        Ok(())
    }

    /// Remove the item at `index` from a list
    pub fn remove_item(&mut self, target: ObjectId, index: usize) -> DomainResult<Value> {
        let items = &mut self.growable(target)?.items;
        if index >= items.len() {
            return Err(out_of_bounds(target, index, items.len()));
        }
        let value = items.remove(index);
        self.undo.push(Undo::Removed {
            target,
            index,
            value: value.clone(),
        });
        self.events.push(MutationEvent::ItemRemoved { target, index });
        Ok(value)
    }

    /// Add or replace a map entry, returning the replaced value
    pub fn map_insert(
        &mut self,
        target: ObjectId,
        key: Value,
        value: Value,
    ) -> DomainResult<Option<Value>> {
        self.check_value(&key)?;
        self.check_value(&value)?;
        let previous = self.graph.map_mut(target)?.insert(key.clone(), value.clone());
        self.undo.push(Undo::MapInserted {
            target,
            key: key.clone(),
            previous: previous.clone(),
        });
        self.events.push(MutationEvent::MapInserted { target, key, value });
        Ok(previous)
    }

    /// Remove a map entry, returning its value
    pub fn map_remove(&mut self, target: ObjectId, key: &Value) -> DomainResult<Option<Value>> {
        let map = self.graph.map_mut(target)?;
        if !map.contains_key(key) {
            return Ok(None);
        }
        let before = Object::Map(map.clone());
        let removed = map.remove(key).map(|(_, v)| v);
        self.undo.push(Undo::Replace {
            target,
            object: before,
        });
        self.events.push(MutationEvent::MapRemoved {
            target,
            key: key.clone(),
        });
        Ok(removed)
    }

    /// Add a set member; false if an equal member exists
    pub fn set_add(&mut self, target: ObjectId, member: Value) -> DomainResult<bool> {
        self.check_value(&member)?;
        if !self.graph.set_mut(target)?.insert(member.clone()) {
            return Ok(false);
        }
        self.undo.push(Undo::SetAdded {
            target,
            member: member.clone(),
        });
        self.events.push(MutationEvent::SetAdded { target, member });
        Ok(true)
    }

    /// Remove a set member; false if it was absent
    pub fn set_remove(&mut self, target: ObjectId, member: &Value) -> DomainResult<bool> {
        let set = self.graph.set_mut(target)?;
        if !set.contains(member) {
            return Ok(false);
        }
        let before = Object::Set(set.clone());
        set.remove(member);
        self.undo.push(Undo::Replace {
            target,
            object: before,
        });
        self.events.push(MutationEvent::SetRemoved {
            target,
            member: member.clone(),
        });
        Ok(true)
    }

    pub(crate) fn into_events(self) -> Vec<MutationEvent> {
        self.events
    }

    /// Undo everything; returns how many mutations were reverted
    pub(crate) fn rollback(self) -> usize {
        let Transaction {
            graph,
            root,
            base_len,
            undo,
            ..
        } = self;
        let count = undo.len();
        for entry in undo.into_iter().rev() {
            if let Err(e) = entry.revert(graph, root) {
                warn!(target: "tessera::domain", error = %e, "Undo entry failed during rollback");
            }
        }
        graph.truncate(base_len);
        count
    }

    fn growable(&mut self, target: ObjectId) -> DomainResult<&mut tessera_core::Sequence> {
        match self.graph.get_mut(target)? {
            Object::List(seq) => Ok(seq),
            Object::Array(_) => Err(DomainError::invalid(format!(
                "array {} has a fixed length",
                target
            ))),
            other => Err(tessera_core::GraphError::wrong_kind(target, "list", other).into()),
        }
    }

    fn check_value(&self, value: &Value) -> DomainResult<()> {
        match value {
            Value::Ref(id) => {
                self.graph.get(*id)?;
            }
            Value::Struct(s) => {
                for (_, field) in &s.fields {
                    self.check_value(field)?;
                }
            }
            Value::Null | Value::Scalar(_) | Value::Enum(_) => {}
        }
        Ok(())
    }

    fn check_object(&self, object: &Object) -> DomainResult<()> {
        match object {
            Object::Pending | Object::Empty => Ok(()),
            Object::Record(r) => r.fields.iter().try_for_each(|(_, v)| self.check_value(v)),
            Object::List(s) | Object::Array(s) => {
                s.items.iter().try_for_each(|v| self.check_value(v))
            }
            Object::Map(m) => m.iter().try_for_each(|(k, v)| {
                self.check_value(k)?;
                self.check_value(v)
            }),
            Object::Set(s) => s.iter().try_for_each(|v| self.check_value(v)),
        }
    }
}

fn out_of_bounds(target: ObjectId, index: usize, len: usize) -> DomainError {
    DomainError::invalid(format!(
        "index {} out of bounds for {} of length {}",
        index, target, len
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{KeyComparer, MapObject, Record, Sequence, TypeIdentity};

    fn people() -> (Graph, Value, ObjectId, ObjectId) {
        let mut graph = Graph::new();
        let ada = graph.insert(Object::Record(
            Record::new("demo.Person").with("Name", Value::string("Ada")),
        ));
        let list = graph.insert(Object::List(Sequence::from_items(
            TypeIdentity::new("demo.Person"),
            vec![Value::Ref(ada)],
        )));
        (graph, Value::Ref(list), ada, list)
    }

    #[test]
    fn test_rollback_restores_every_change() {
        let (mut graph, mut root, ada, list) = people();
        let before_graph = graph.clone();
        let before_root = root.clone();

        let mut tx = Transaction::new(&mut graph, &mut root);
        let bob = tx
            .create(Object::Record(Record::new("demo.Person").with("Name", Value::string("Bob"))))
            .unwrap();
        tx.set_field(ada, "Name", Value::string("Ada L.")).unwrap();
        tx.set_field(ada, "Friend", Value::Ref(bob)).unwrap();
        tx.push(list, Value::Ref(bob)).unwrap();
        tx.remove_item(list, 0).unwrap();
        tx.set_root(Value::Null).unwrap();
        assert_eq!(tx.events().len(), 6);
        assert_eq!(tx.rollback(), 5);

        assert_eq!(graph.len(), before_graph.len());
        assert_eq!(graph.record(ada).unwrap(), before_graph.record(ada).unwrap());
        assert_eq!(graph.get(list).unwrap(), before_graph.get(list).unwrap());
        assert_eq!(root, before_root);
    }

    #[test]
    fn test_map_rollback_keeps_order() {
        let mut graph = Graph::new();
        let mut map = MapObject::new(TypeIdentity::new("string"), TypeIdentity::new("i32"), KeyComparer::Ordinal);
        map.insert(Value::string("a"), Value::i32(1));
        map.insert(Value::string("b"), Value::i32(2));
        let id = graph.insert(Object::Map(map));
        let before = graph.get(id).unwrap().clone();
        let mut root = Value::Ref(id);

        let mut tx = Transaction::new(&mut graph, &mut root);
        assert_eq!(tx.map_remove(id, &Value::string("a")).unwrap(), Some(Value::i32(1)));
        assert_eq!(tx.map_insert(id, Value::string("b"), Value::i32(20)).unwrap(), Some(Value::i32(2)));
        tx.map_insert(id, Value::string("c"), Value::i32(3)).unwrap();
        tx.rollback();

        assert_eq!(graph.get(id).unwrap(), &before);
    }

    #[test]
    fn test_dangling_reference_rejected_before_mutation() {
        let (mut graph, mut root, ada, _) = people();
        let mut tx = Transaction::new(&mut graph, &mut root);
        let err = tx
            .set_field(ada, "Friend", Value::Ref(ObjectId::from_index(99)))
            .unwrap_err();
        assert!(matches!(err, DomainError::Graph(_)));
        assert!(tx.events().is_empty());
    }

    #[test]
    fn test_arrays_do_not_grow() {
        let mut graph = Graph::new();
        let arr = graph.insert(Object::Array(Sequence::from_items(
            TypeIdentity::new("i32"),
            vec![Value::i32(1)],
        )));
        let mut root = Value::Ref(arr);
        let mut tx = Transaction::new(&mut graph, &mut root);
        assert!(matches!(tx.push(arr, Value::i32(2)), Err(DomainError::InvalidMutation(_))));
        tx.set_item(arr, 0, Value::i32(5)).unwrap();
        assert!(tx.set_item(arr, 1, Value::i32(5)).is_err());
        assert_eq!(tx.into_events().len(), 1);
    }

    #[test]
    fn test_duplicate_set_member_is_not_an_event() {
        let mut graph = Graph::new();
        let set = graph.insert(Object::Set(tessera_core::SetObject::new(
            TypeIdentity::new("string"),
            KeyComparer::OrdinalIgnoreCase,
        )));
        let mut root = Value::Ref(set);
        let mut tx = Transaction::new(&mut graph, &mut root);
        assert!(tx.set_add(set, Value::string("Red")).unwrap());
        assert!(!tx.set_add(set, Value::string("RED")).unwrap());
        assert!(tx.set_remove(set, &Value::string("red")).unwrap());
        assert!(!tx.set_remove(set, &Value::string("red")).unwrap());
        assert_eq!(tx.events().len(), 2);
    }
}
