//! Versioned, reference-aware binary codec for Tessera object graphs
//!
//! A stream holds one rooted graph:
//!
//! ```text
//! [Magic: "TSRA"] [Version: u16 LE] [Mode: u8] [Root value]
//! ```
//!
//! Every value starts with a one-byte [`Marker`]. Reference-typed objects are
//! written in full the first time they are reached and as `Reference(handle)`
//! afterwards, so shared references and cycles survive a round trip. Types
//! are described once per stream in a [`catalog`] of identities, versions
//! and ancestor chains, which lets a reader decode data written by an older
//! revision of a type (missing fields take their declared defaults).
//!
//! Drivers (one per type) own the content of each instance. Records, enums
//! and custom drivers are declared up front with a [`RegistryBuilder`];
//! arrays, lists, maps and sets are synthesized on first use.
//!
//! # Example
//!
//! ```
//! use tessera_codec::{decode, encode, CodecOptions, DriverRegistry, RecordSchema};
//! use tessera_core::{graphs_equivalent, Graph, Object, Record, Value};
//!
//! let registry = DriverRegistry::builder()
//!     .record(RecordSchema::reference("demo.Person").field("Name", Value::Null))
//!     .build();
//!
//! let mut graph = Graph::new();
//! let ada = graph.insert(Object::Record(
//!     Record::new("demo.Person").with("Name", Value::string("Ada")),
//! ));
//! let root = Value::Ref(ada);
//!
//! let bytes = encode(&graph, &root, &registry, CodecOptions::default()).unwrap();
//! let decoded = decode(&bytes, &registry).unwrap();
//! assert!(graphs_equivalent(&graph, &root, &decoded.graph, &decoded.root));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod debug;
pub mod decoder;
pub mod driver;
pub mod drivers;
pub mod encoder;
pub mod error;
pub mod header;
pub mod inspect;
pub mod marker;
pub mod pass;
pub mod primitives;
pub mod reference;
pub mod registry;
pub mod varint;

pub use catalog::{LayerInfo, TypeInfo};
pub use debug::Crumb;
pub use decoder::{DecodedGraph, Decoder, PassStats};
pub use driver::{Decoded, Driver, Element, Registration, Shape, Subject, Versioning};
pub use drivers::{FieldDef, RecordKind, RecordSchema};
pub use encoder::{CodecOptions, Encoder};
pub use error::{CodecError, CodecResult, CorruptionReport, DesyncReport, WireError};
pub use header::{FORMAT_VERSION, STREAM_MAGIC};
pub use inspect::{inspect, RootSummary, StreamSummary};
pub use marker::{Marker, ModeByte};
pub use pass::PassState;
pub use registry::{DriverRegistry, RegistryBuilder};

use tessera_core::{Graph, Value};

/// Encode the graph reachable from `root`
pub fn encode(
    graph: &Graph,
    root: &Value,
    registry: &DriverRegistry,
    options: CodecOptions,
) -> CodecResult<Vec<u8>> {
    Encoder::new(graph, registry, options).run(root)
}

/// Decode a stream into a fresh graph
pub fn decode(bytes: &[u8], registry: &DriverRegistry) -> CodecResult<DecodedGraph> {
    Decoder::new(bytes, registry).run()
}

/// Decode a stream under explicit options
pub fn decode_with(
    bytes: &[u8],
    registry: &DriverRegistry,
    options: CodecOptions,
) -> CodecResult<DecodedGraph> {
    Decoder::with_options(bytes, registry, options).run()
}
