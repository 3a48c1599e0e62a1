//! Tessera - in-memory transactional object-graph store
//!
//! Tessera keeps rooted object graphs (cycles and shared references
//! included), persists them with a versioned binary codec and streams their
//! changes to observers as schema-less JSON.
//!
//! # Quick Start
//!
//! ```
//! use tessera::{Domain, DomainConfig, DriverRegistry, Object, Record, RecordSchema, Value};
//!
//! let registry = DriverRegistry::builder()
//!     .record(RecordSchema::reference("demo.Person").field("Name", Value::Null))
//!     .build();
//! let domain = Domain::new("people", registry, DomainConfig::default());
//!
//! domain.transact(|tx| {
//!     let ada = tx.create(Object::Record(
//!         Record::new("demo.Person").with("Name", Value::string("Ada")),
//!     ))?;
//!     tx.set_root(Value::Ref(ada))
//! })?;
//!
//! let bytes = domain.snapshot()?;
//! let copy = Domain::new("copy", domain.registry().clone(), DomainConfig::default());
//! copy.restore(&bytes)?;
//! assert_eq!(copy.export_full()?.json, domain.export_full()?.json);
//! # Ok::<(), tessera::DomainError>(())
//! ```
//!
//! # Architecture
//!
//! - `tessera-core`: graph arena, values, scalars, type identities
//! - `tessera-codec`: binary codec, driver registry, debug sentinels
//! - `tessera-export`: export walk, JSON sink, transaction journal
//! - `tessera-engine`: domains, transactions, snapshot files, config

pub use tessera_codec::{
    decode, decode_with, encode, inspect, CodecError, CodecOptions, CodecResult, DecodedGraph,
    DriverRegistry, RecordSchema, RegistryBuilder,
};
pub use tessera_core::{
    graphs_equivalent, EnumValue, Graph, GraphError, KeyComparer, MapObject, Object, ObjectId,
    Record, Scalar, ScalarKind, Sequence, SetObject, StructValue, TypeIdentity, Value,
    DEFAULT_MAX_DEPTH,
};
pub use tessera_engine::{
    ConfigError, Domain, DomainConfig, DomainError, DomainResult, FullExport, MutationEvent,
    SnapshotFileError, TesseraConfig, Transaction,
};
pub use tessera_export::{
    export_graph, export_graph_with, export_json, export_json_with, ExportError, ExportSink,
    ExportToken, JournalRetention, JsonSink, ObjectExportedKind, SinceResult, TokenRecorder,
    TransactionJournal,
};

