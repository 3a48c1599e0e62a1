//! Error types for the object model
//!
//! Graph access fails in a small number of ways: the id was never
//! allocated, the slot is still pending, or the object has another kind
//! than the caller expected. Identity parse errors live next to the parser
//! and are re-exported here.

use crate::graph::{Object, ObjectId};
use thiserror::Error;

pub use crate::identity::IdentityError;

/// Result type alias for graph operations
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Errors raised by [`Graph`](crate::graph::Graph) accessors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The id does not address an allocated slot
    #[error("Dangling object reference {0}")]
    Dangling(ObjectId),

    /// The slot is reserved but its contents were never completed
    #[error("Object {0} is pending")]
    Pending(ObjectId),

    /// `complete` called on a slot that is not pending
    #[error("Object {0} is already completed")]
    AlreadyCompleted(ObjectId),

    /// The object exists but has another kind
    #[error("Object {id} is a {actual}, expected a {expected}")]
    WrongKind {
        /// Object addressed
        id: ObjectId,
        /// Kind the caller asked for
        expected: &'static str,
        /// Kind actually stored
        actual: &'static str,
    },
}

impl GraphError {
    /// Build a [`GraphError::WrongKind`] from the object found
    pub fn wrong_kind(id: ObjectId, expected: &'static str, actual: &Object) -> Self {
        GraphError::WrongKind {
            id,
            expected,
            actual: actual.kind_name(),
        }
    }
}
