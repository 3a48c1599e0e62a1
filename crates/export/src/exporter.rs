//! Identity-tracking export walk
//!
//! Every reference-typed object gets an export handle the first time the
//! walk reaches it, numbered from 0 in first-visit order. Reaching it again
//! emits a reference token instead of a second full encoding, so shared
//! objects and cycles export in finite, deduplicated form. The numbering is
//! private to one exporter and unrelated to the codec's handles.
//!
//! Nesting is bounded by a depth limit (default
//! [`DEFAULT_MAX_DEPTH`](tessera_core::DEFAULT_MAX_DEPTH)); each level runs
//! on a stack with room to spare, so long chains export without
//! overflowing.

use crate::error::{ExportError, ExportResult};
use crate::sink::{ExportSink, ObjectExportedKind};
use rustc_hash::FxHashMap;
use tessera_core::{
    with_stack, DepthGuard, Graph, GraphError, Object, ObjectId, Scalar, StructValue, Value,
    DEFAULT_MAX_DEPTH,
};
use tracing::debug;

/// Walks a graph and reports it to a sink
pub struct Exporter<'g, S: ExportSink> {
    graph: &'g Graph,
    sink: S,
    handles: FxHashMap<ObjectId, u32>,
    depth: DepthGuard,
}

impl<'g, S: ExportSink> Exporter<'g, S> {
    /// Exporter over `graph` writing into `sink`
    pub fn new(graph: &'g Graph, sink: S) -> Self {
        Exporter {
            graph,
            sink,
            handles: FxHashMap::default(),
            depth: DepthGuard::default(),
        }
    }

    /// Same exporter with another nesting limit
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.depth = DepthGuard::new(max_depth);
        self
    }

    /// Number of objects assigned a handle so far
    pub fn exported_objects(&self) -> usize {
        self.handles.len()
    }

    /// Export handle of an object already visited
    pub fn handle_of(&self, id: ObjectId) -> Option<u32> {
        self.handles.get(&id).copied()
    }

    /// Give the sink back
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Export one value
    pub fn export_value(&mut self, value: &Value) -> ExportResult<()> {
        if !self.depth.enter() {
            return Err(ExportError::TooDeep {
                limit: self.depth.max(),
            });
        }
        let result = with_stack(|| self.export_nested(value));
        self.depth.leave();
        result
    }

    fn export_nested(&mut self, value: &Value) -> ExportResult<()> {
        match value {
            Value::Null => self.sink.null(),
            Value::Scalar(s) => self.sink.scalar(s),
            Value::Enum(e) => self.sink.scalar(&Scalar::I64(e.value)),
            Value::Struct(s) => self.export_struct(s)?,
            Value::Ref(id) => self.export_object(*id)?,
        }
        Ok(())
    }

    /// Export values as a list that has no graph identity (handle slot null)
    pub fn export_sequence(&mut self, items: &[Value]) -> ExportResult<()> {
        self.sink.begin_object(ObjectExportedKind::List, None, None);
        for item in items {
            self.export_value(item)?;
        }
        self.sink.end_object(ObjectExportedKind::List);
        Ok(())
    }

    fn export_struct(&mut self, value: &StructValue) -> ExportResult<()> {
        self.sink
            .begin_object(ObjectExportedKind::Object, None, Some(value.type_id.as_str()));
        for (name, field) in &value.fields {
            self.sink.property(name);
            self.export_value(field)?;
        }
        self.sink.end_object(ObjectExportedKind::Object);
        Ok(())
    }

    fn export_object(&mut self, id: ObjectId) -> ExportResult<()> {
        if let Some(&handle) = self.handles.get(&id) {
            self.sink.reference(handle);
            return Ok(());
        }
        let graph = self.graph;
        let object = graph.get(id).map_err(|e| match e {
            GraphError::Pending(id) => ExportError::PendingObject(id),
            other => ExportError::Graph(other),
        })?;

        // Handle assigned before the contents so self references resolve
        let handle = self.handles.len() as u32;
        self.handles.insert(id, handle);

        match object {
            Object::Pending => return Err(ExportError::PendingObject(id)),
            Object::Empty => self.sink.empty_object(handle),
            Object::Record(record) => {
                self.sink.begin_object(
                    ObjectExportedKind::Object,
                    Some(handle),
                    Some(record.type_id.as_str()),
                );
                for (name, field) in &record.fields {
                    self.sink.property(name);
                    self.export_value(field)?;
                }
                self.sink.end_object(ObjectExportedKind::Object);
            }
            Object::List(seq) | Object::Array(seq) => {
                self.sink.begin_object(ObjectExportedKind::List, Some(handle), None);
                for item in &seq.items {
                    self.export_value(item)?;
                }
                self.sink.end_object(ObjectExportedKind::List);
            }
            Object::Map(map) => {
                self.sink.begin_object(ObjectExportedKind::Map, Some(handle), None);
                for (key, value) in map.iter() {
                    self.export_value(key)?;
                    self.export_value(value)?;
                }
                self.sink.end_object(ObjectExportedKind::Map);
            }
            Object::Set(set) => {
                self.sink.begin_object(ObjectExportedKind::Set, Some(handle), None);
                for member in set.iter() {
                    self.export_value(member)?;
                }
                self.sink.end_object(ObjectExportedKind::Set);
            }
        }
        Ok(())
    }
}

/// Export the graph reachable from `root` into `sink`
pub fn export_graph<S: ExportSink>(graph: &Graph, root: &Value, sink: S) -> ExportResult<S> {
    export_graph_with(graph, root, sink, DEFAULT_MAX_DEPTH)
}

/// [`export_graph`] with an explicit nesting limit
pub fn export_graph_with<S: ExportSink>(
    graph: &Graph,
    root: &Value,
    sink: S,
    max_depth: usize,
) -> ExportResult<S> {
    let mut exporter = Exporter::new(graph, sink).with_max_depth(max_depth);
    exporter.export_value(root)?;
    debug!(
        target: "tessera::export",
        objects = exporter.exported_objects(),
        "Exported graph"
    );
    Ok(exporter.into_sink())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{ExportToken, TokenRecorder};
    use tessera_core::{EnumValue, Record, Sequence, TypeIdentity};

    fn begin(kind: ObjectExportedKind, handle: Option<u32>, ty: Option<&str>) -> ExportToken {
        ExportToken::Begin {
            kind,
            handle,
            type_name: ty.map(str::to_owned),
        }
    }

    #[test]
    fn test_shared_instance_exported_once() {
        let mut graph = Graph::new();
        let x = graph.insert(Object::Record(
            Record::new("demo.Person").with("Name", Value::string("X")),
        ));
        let list = graph.insert(Object::List(Sequence::from_items(
            TypeIdentity::new("demo.Person"),
            vec![Value::Ref(x), Value::Ref(x)],
        )));

        let rec = export_graph(&graph, &Value::Ref(list), TokenRecorder::new()).unwrap();
        assert_eq!(
            rec.tokens(),
            &[
                begin(ObjectExportedKind::List, Some(0), None),
                begin(ObjectExportedKind::Object, Some(1), Some("demo.Person")),
                ExportToken::Property("Name".into()),
                ExportToken::Scalar(Scalar::String("X".into())),
                ExportToken::End(ObjectExportedKind::Object),
                ExportToken::Reference(1),
                ExportToken::End(ObjectExportedKind::List),
            ]
        );
    }

    #[test]
    fn test_self_reference_terminates() {
        let mut graph = Graph::new();
        let node = graph.reserve();
        graph
            .complete(
                node,
                Object::Record(Record::new("demo.Node").with("Next", Value::Ref(node))),
            )
            .unwrap();

        let rec = export_graph(&graph, &Value::Ref(node), TokenRecorder::new()).unwrap();
        assert_eq!(rec.reference_count(), 1);
        assert_eq!(rec.tokens()[2], ExportToken::Reference(0));
    }

    #[test]
    fn test_enum_exports_integral_and_struct_has_no_handle() {
        let mut graph = Graph::new();
        let point = StructValue::new("geo.Point")
            .with("X", Value::i32(1))
            .with("Tint", EnumValue::new("demo.Color", 2));
        let list = graph.insert(Object::List(Sequence::from_items(
            TypeIdentity::object(),
            vec![Value::Struct(point)],
        )));

        let rec = export_graph(&graph, &Value::Ref(list), TokenRecorder::new()).unwrap();
        assert_eq!(rec.tokens()[1], begin(ObjectExportedKind::Object, None, Some("geo.Point")));
        assert_eq!(rec.tokens()[5], ExportToken::Scalar(Scalar::I64(2)));
    }

    #[test]
    fn test_pending_object_is_an_error() {
        let mut graph = Graph::new();
        let id = graph.reserve();
        let err = export_graph(&graph, &Value::Ref(id), TokenRecorder::new()).unwrap_err();
        assert_eq!(err, ExportError::PendingObject(id));
    }

    #[test]
    fn test_depth_limit_stops_the_walk() {
        let mut graph = Graph::new();
        let mut next = Value::Null;
        for _ in 0..6 {
            let id = graph.insert(Object::Record(Record::new("demo.Node").with("Next", next)));
            next = Value::Ref(id);
        }
        let err = export_graph_with(&graph, &next, TokenRecorder::new(), 4).unwrap_err();
        assert_eq!(err, ExportError::TooDeep { limit: 4 });
        // Six records plus the trailing null
        assert!(export_graph_with(&graph, &next, TokenRecorder::new(), 7).is_ok());
    }

    #[test]
    fn test_synthetic_sequence_has_null_handle() {
        let graph = Graph::new();
        let mut exporter = Exporter::new(&graph, TokenRecorder::new());
        exporter.export_sequence(&[Value::i32(1)]).unwrap();
        let rec = exporter.into_sink();
        assert_eq!(rec.tokens()[0], begin(ObjectExportedKind::List, None, None));
    }
}
