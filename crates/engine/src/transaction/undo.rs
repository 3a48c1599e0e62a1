//! Undo log entries
//!
//! Every mutation pushes the entry that reverses it. Rollback replays the
//! log newest-first, then truncates objects created by the transaction.

use tessera_core::{Graph, GraphResult, Object, ObjectId, Value};

#[derive(Debug)]
pub(crate) enum Undo {
    Root(Value),
    Field {
        target: ObjectId,
        field: String,
        previous: Option<Value>,
    },
    Item {
        target: ObjectId,
        index: usize,
        previous: Value,
    },
    Pushed {
        target: ObjectId,
    },
    Inserted {
        target: ObjectId,
        index: usize,
    },
    Removed {
        target: ObjectId,
        index: usize,
        value: Value,
    },
    MapInserted {
        target: ObjectId,
        key: Value,
        previous: Option<Value>,
    },
    SetAdded {
        target: ObjectId,
        member: Value,
    },
    /// Whole-object restore; removals would otherwise lose insertion order
    Replace {
        target: ObjectId,
        object: Object,
    },
}

impl Undo {
    pub(crate) fn revert(self, graph: &mut Graph, root: &mut Value) -> GraphResult<()> {
        match self {
            Undo::Root(previous) => *root = previous,
            Undo::Field {
                target,
                field,
                previous,
            } => {
                let record = graph.record_mut(target)?;
                match previous {
                    Some(value) => {
                        record.set(field, value);
                    }
                    None => {
                        record.unset(&field);
                    }
                }
            }
            Undo::Item {
                target,
                index,
                previous,
            } => {
                if let Some(slot) = graph.sequence_mut(target)?.items.get_mut(index) {
                    *slot = previous;
                }
            }
            Undo::Pushed { target } => {
                graph.sequence_mut(target)?.items.pop();
            }
            Undo::Inserted { target, index } => {
                let items = &mut graph.sequence_mut(target)?.items;
                if index < items.len() {
                    items.remove(index);
                }
            }
            Undo::Removed {
                target,
                index,
                value,
            } => {
                let items = &mut graph.sequence_mut(target)?.items;
                items.insert(index.min(items.len()), value);
            }
            Undo::MapInserted {
                target,
                key,
                previous,
            } => {
                let map = graph.map_mut(target)?;
                match previous {
                    Some(value) => {
                        map.insert(key, value);
                    }
                    None => {
                        map.remove(&key);
                    }
                }
            }
            Undo::SetAdded { target, member } => {
                graph.set_mut(target)?.remove(&member);
            }
            Undo::Replace { target, object } => {
                *graph.get_mut(target)? = object;
            }
        }
        Ok(())
    }
}
