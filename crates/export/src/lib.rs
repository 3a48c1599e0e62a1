//! Structural export of Tessera graphs
//!
//! The export walk turns a live graph into a schema-less token stream for
//! remote viewers. It is independent of the binary codec: it never needs a
//! driver registry and numbers objects on its own.
//!
//! - [`Exporter`]: first-visit handle assignment and back-reference tokens
//! - [`ExportSink`]: token receiver; [`JsonSink`] and [`TokenRecorder`] ship here
//! - [`TransactionJournal`]: cached per-transaction fragments with "since N"
//!   queries and a [`JournalRetention`] policy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod exporter;
pub mod journal;
pub mod json;
pub mod sink;

pub use error::{ExportError, ExportResult, JournalError, JournalResult};
pub use exporter::{export_graph, export_graph_with, Exporter};
pub use journal::{JournalRetention, SinceResult, TransactionJournal};
pub use json::JsonSink;
pub use sink::{ExportSink, ExportToken, ObjectExportedKind, TokenRecorder};

use tessera_core::{Graph, Value};

/// Render the graph reachable from `root` as export JSON
pub fn export_json(graph: &Graph, root: &Value) -> ExportResult<String> {
    Ok(export_graph(graph, root, JsonSink::new())?.into_string())
}

/// [`export_json`] with an explicit nesting limit
pub fn export_json_with(graph: &Graph, root: &Value, max_depth: usize) -> ExportResult<String> {
    Ok(export_graph_with(graph, root, JsonSink::new(), max_depth)?.into_string())
}
