//! Reference table and deferred actions
//!
//! Every reference-typed object in a stream gets a dense handle the first
//! time it is written. Later occurrences are written as `Reference(handle)`.
//! Handles are never skipped or reused within a pass.
//!
//! Some work cannot happen while the main pass is still filling in objects:
//! map and set entries are inserted by [`DeferredAction`]s that run once,
//! in registration order, after the root value has been read.

use crate::error::CodecResult;
use std::collections::VecDeque;
use std::fmt;
use tessera_core::{Graph, ObjectId};
use thiserror::Error;

/// Dereference failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    /// Handle never assigned
    #[error("reference handle {handle} beyond table size {len}")]
    OutOfRange {
        /// Handle read from the stream
        handle: u32,
        /// Slots assigned so far
        len: usize,
    },

    /// Handle reserved but no object bound to it yet
    #[error("reference handle {0} points at an unpopulated slot")]
    Unpopulated(u32),

    /// `bind` on a slot that is not reserved
    #[error("reference handle {0} cannot be bound twice")]
    AlreadyBound(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Reserved,
    Bound(ObjectId),
}

/// Handle → object table of one decode pass
#[derive(Debug, Default)]
pub struct ReferenceTable {
    slots: Vec<Slot>,
}

impl ReferenceTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Slots assigned so far
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if nothing was tracked
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Take the next handle without an object yet
    pub fn reserve(&mut self) -> u32 {
        let handle = self.slots.len() as u32;
        self.slots.push(Slot::Reserved);
        handle
    }

    /// Attach an object to a reserved handle
    pub fn bind(&mut self, handle: u32, id: ObjectId) -> Result<(), ReferenceError> {
        let len = self.slots.len();
        let slot = self
            .slots
            .get_mut(handle as usize)
            .ok_or(ReferenceError::OutOfRange { handle, len })?;
        if *slot != Slot::Reserved {
            return Err(ReferenceError::AlreadyBound(handle));
        }
        *slot = Slot::Bound(id);
        Ok(())
    }

    /// Track a finished object under the next handle
    pub fn push_bound(&mut self, id: ObjectId) -> u32 {
        let handle = self.slots.len() as u32;
        self.slots.push(Slot::Bound(id));
        handle
    }

    /// Object bound to `handle`
    pub fn resolve(&self, handle: u32) -> Result<ObjectId, ReferenceError> {
        match self.slots.get(handle as usize) {
            Some(Slot::Bound(id)) => Ok(*id),
            Some(Slot::Reserved) => Err(ReferenceError::Unpopulated(handle)),
            None => Err(ReferenceError::OutOfRange {
                handle,
                len: self.slots.len(),
            }),
        }
    }

    /// Handles still reserved
    pub fn unbound(&self) -> impl Iterator<Item = u32> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, Slot::Reserved))
            .map(|(i, _)| i as u32)
    }
}

/// Work run against the graph after the main pass
pub type DeferredAction = Box<dyn FnOnce(&mut Graph) -> CodecResult<()>>;

/// FIFO of deferred actions
#[derive(Default)]
pub struct DeferredQueue {
    actions: VecDeque<DeferredAction>,
}

impl fmt::Debug for DeferredQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredQueue")
            .field("pending", &self.actions.len())
            .finish()
    }
}

impl DeferredQueue {
    /// Empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an action
    pub fn push(&mut self, action: DeferredAction) {
        self.actions.push_back(action);
    }

    /// Actions waiting
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// True if nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run every action in registration order, stopping at the first error.
    ///
    /// Consumes the queue: a pass drains exactly once.
    pub fn drain(self, graph: &mut Graph) -> CodecResult<usize> {
        let mut ran = 0;
        for action in self.actions {
            action(graph)?;
            ran += 1;
        }
        Ok(ran)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tessera_core::Object;

    #[test]
    fn test_handles_are_dense() {
        let mut table = ReferenceTable::new();
        let a = ObjectId::from_index(10);
        let b = ObjectId::from_index(11);
        assert_eq!(table.push_bound(a), 0);
        let h = table.reserve();
        assert_eq!(h, 1);
        table.bind(h, b).unwrap();
        assert_eq!(table.resolve(0), Ok(a));
        assert_eq!(table.resolve(1), Ok(b));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_out_of_range_and_unpopulated() {
        let mut table = ReferenceTable::new();
        let h = table.reserve();
        assert_eq!(table.resolve(h), Err(ReferenceError::Unpopulated(0)));
        assert_eq!(
            table.resolve(5),
            Err(ReferenceError::OutOfRange { handle: 5, len: 1 })
        );
        assert!(table
            .resolve(5)
            .unwrap_err()
            .to_string()
            .contains("beyond table size"));
        assert_eq!(table.unbound().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_bind_twice_fails() {
        let mut table = ReferenceTable::new();
        let h = table.reserve();
        table.bind(h, ObjectId::from_index(0)).unwrap();
        assert_eq!(
            table.bind(h, ObjectId::from_index(1)),
            Err(ReferenceError::AlreadyBound(0))
        );
    }

    #[test]
    fn test_deferred_runs_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut queue = DeferredQueue::new();
        for i in 0..3 {
            let log = Rc::clone(&log);
            queue.push(Box::new(move |_graph: &mut Graph| {
                log.borrow_mut().push(i);
                Ok(())
            }));
        }
        let mut graph = Graph::new();
        assert_eq!(queue.drain(&mut graph).unwrap(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_deferred_stops_at_first_error() {
        let mut queue = DeferredQueue::new();
        queue.push(Box::new(|graph: &mut Graph| {
            graph.insert(Object::Empty);
            Ok(())
        }));
        queue.push(Box::new(|_: &mut Graph| Err(CodecError::detached("duplicate key"))));
        queue.push(Box::new(|graph: &mut Graph| {
            graph.insert(Object::Empty);
            Ok(())
        }));
        let mut graph = Graph::new();
        assert!(queue.drain(&mut graph).is_err());
        assert_eq!(graph.len(), 1);
    }
}
