//! Core object model for Tessera
//!
//! This crate defines the types the codec, the exporter and the domain host
//! operate on:
//! - TypeIdentity: stable wire name of a type, with a weak (qualifier-free) form
//! - Scalar / ScalarKind: closed set of primitive families
//! - Value: what a field, item or key holds (scalars, enums, structs, references)
//! - Graph: arena of reference-typed objects addressed by ObjectId
//! - Error: graph access and identity parse errors
//! - Limits: nesting depth limits and stack growth for graph walks

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod graph;
pub mod identity;
pub mod limits;
pub mod scalar;
pub mod value;

pub use error::{GraphError, GraphResult, IdentityError};
pub use graph::{
    graphs_equivalent, Graph, KeyComparer, MapKey, MapObject, Object, ObjectId, Record, Sequence,
    SetObject,
};
pub use identity::{builtin, TypeIdentity, TypeName};
pub use limits::{with_stack, DepthGuard, DEFAULT_MAX_DEPTH, MAX_GENERIC_DEPTH};
pub use scalar::{Scalar, ScalarKind};
pub use value::{EnumValue, StructValue, Value};
