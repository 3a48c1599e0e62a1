//! Concrete drivers
//!
//! - [`scalar`]: built-in scalars and the bare `object` type
//! - [`enums`]: declared enums over an integral kind
//! - [`record`]: declared records with versioned ancestor chains
//! - [`collections`]: synthesized arrays, lists, maps and sets

pub mod collections;
pub mod enums;
pub mod record;
pub mod scalar;

pub use collections::{MapDriver, SequenceDriver, SetDriver};
pub use enums::EnumDriver;
pub use record::{FieldDef, RecordDriver, RecordKind, RecordSchema};
pub use scalar::{AnyDriver, ScalarDriver};
