//! Object graph arena
//!
//! Reference-typed instances live in a [`Graph`] and are addressed by stable
//! [`ObjectId`]s. Reference identity is id equality; cycles and shared
//! references are ordinary id edges, so no pointer juggling is needed to
//! build or tear down a cyclic graph.
//!
//! An arena slot may be *pending*: its identity exists (other objects may
//! already point at it) but its contents have not been completed yet. The
//! codec uses this to decode objects that are referenced from inside their
//! own contents.

mod compare;
mod keyed;
mod object;

pub use compare::graphs_equivalent;
pub use keyed::{KeyComparer, MapKey, MapObject, SetObject};
pub use object::{Object, Record, Sequence};

use crate::error::{GraphError, GraphResult};
use std::fmt;

/// Stable arena index of a reference-typed object
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u32);

impl ObjectId {
    /// Id for an arena index
    pub const fn from_index(index: u32) -> Self {
        ObjectId(index)
    }

    /// Arena index
    pub const fn index(self) -> u32 {
        self.0
    }

    fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Arena of reference-typed objects
#[derive(Debug, Clone, Default)]
pub struct Graph {
    objects: Vec<Object>,
}

impl Graph {
    /// Empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty graph with room for `capacity` objects
    pub fn with_capacity(capacity: usize) -> Self {
        Graph {
            objects: Vec::with_capacity(capacity),
        }
    }

    /// Number of arena slots (pending slots included)
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True if no object was ever allocated
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Add a finished object
    pub fn insert(&mut self, object: Object) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(object);
        id
    }

    /// Allocate an identity whose contents are completed later
    pub fn reserve(&mut self) -> ObjectId {
        self.insert(Object::Pending)
    }

    /// Fill a pending slot
    pub fn complete(&mut self, id: ObjectId, object: Object) -> GraphResult<()> {
        let slot = self
            .objects
            .get_mut(id.slot())
            .ok_or(GraphError::Dangling(id))?;
        if !matches!(slot, Object::Pending) {
            return Err(GraphError::AlreadyCompleted(id));
        }
        *slot = object;
        Ok(())
    }

    /// True if `id` addresses an allocated slot
    pub fn contains(&self, id: ObjectId) -> bool {
        id.slot() < self.objects.len()
    }

    /// Borrow an object
    pub fn get(&self, id: ObjectId) -> GraphResult<&Object> {
        match self.objects.get(id.slot()) {
            Some(Object::Pending) => Err(GraphError::Pending(id)),
            Some(object) => Ok(object),
            None => Err(GraphError::Dangling(id)),
        }
    }

    /// Mutably borrow an object
    pub fn get_mut(&mut self, id: ObjectId) -> GraphResult<&mut Object> {
        match self.objects.get_mut(id.slot()) {
            Some(Object::Pending) => Err(GraphError::Pending(id)),
            Some(object) => Ok(object),
            None => Err(GraphError::Dangling(id)),
        }
    }

    /// Borrow a record
    pub fn record(&self, id: ObjectId) -> GraphResult<&Record> {
        match self.get(id)? {
            Object::Record(record) => Ok(record),
            other => Err(GraphError::wrong_kind(id, "record", other)),
        }
    }

    /// Mutably borrow a record
    pub fn record_mut(&mut self, id: ObjectId) -> GraphResult<&mut Record> {
        match self.get_mut(id)? {
            Object::Record(record) => Ok(record),
            other => Err(GraphError::wrong_kind(id, "record", other)),
        }
    }

    /// Mutably borrow a list or array
    pub fn sequence_mut(&mut self, id: ObjectId) -> GraphResult<&mut Sequence> {
        match self.get_mut(id)? {
            Object::List(seq) | Object::Array(seq) => Ok(seq),
            other => Err(GraphError::wrong_kind(id, "sequence", other)),
        }
    }

    /// Mutably borrow a map
    pub fn map_mut(&mut self, id: ObjectId) -> GraphResult<&mut MapObject> {
        match self.get_mut(id)? {
            Object::Map(map) => Ok(map),
            other => Err(GraphError::wrong_kind(id, "map", other)),
        }
    }

    /// Mutably borrow a set
    pub fn set_mut(&mut self, id: ObjectId) -> GraphResult<&mut SetObject> {
        match self.get_mut(id)? {
            Object::Set(set) => Ok(set),
            other => Err(GraphError::wrong_kind(id, "set", other)),
        }
    }

    /// Ids of slots that were reserved but never completed
    pub fn pending(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects
            .iter()
            .enumerate()
            .filter(|(_, o)| matches!(o, Object::Pending))
            .map(|(i, _)| ObjectId(i as u32))
    }

    /// Iterate over completed objects
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.objects
            .iter()
            .enumerate()
            .filter(|(_, o)| !matches!(o, Object::Pending))
            .map(|(i, o)| (ObjectId(i as u32), o))
    }

    /// Drop every slot at or beyond `len`.
    ///
    /// Objects are appended, so truncating undoes the allocations made after
    /// a known length. References into the dropped range become dangling.
    pub fn truncate(&mut self, len: usize) {
        self.objects.truncate(len);
    }
}
