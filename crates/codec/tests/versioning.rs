//! Schema evolution across builds
//!
//! Each test encodes with one registry (the "writer build") and decodes
//! with another (the "reader build").

use std::sync::Arc;
use tessera_codec::{decode, encode, CodecOptions, DriverRegistry, RecordSchema};
use tessera_core::{Graph, Object, Record, Sequence, TypeIdentity, Value};

fn write_with(registry: &DriverRegistry, graph: &Graph, root: &Value) -> Vec<u8> {
    encode(graph, root, registry, CodecOptions::default()).unwrap()
}

fn v1_registry() -> Arc<DriverRegistry> {
    DriverRegistry::builder()
        .record(RecordSchema::reference("demo.Person").field("Name", Value::Null))
        .build()
}

fn v2_registry() -> Arc<DriverRegistry> {
    DriverRegistry::builder()
        .record(
            RecordSchema::reference("demo.Person")
                .version(1)
                .field("Name", Value::Null)
                .field_since("Age", 1, Value::i32(-1)),
        )
        .build()
}

fn single_person(type_id: &str, fields: &[(&str, Value)]) -> (Graph, Value) {
    let mut graph = Graph::new();
    let mut record = Record::new(type_id);
    for (name, value) in fields {
        record.set(*name, value.clone());
    }
    let id = graph.insert(Object::Record(record));
    (graph, Value::Ref(id))
}

#[test]
fn test_new_field_takes_default() {
    let (graph, root) = single_person("demo.Person", &[("Name", Value::string("Ada"))]);
    let bytes = write_with(&v1_registry(), &graph, &root);

    let decoded = decode(&bytes, &v2_registry()).unwrap();
    let record = decoded.graph.record(decoded.root.as_ref_id().unwrap()).unwrap();
    assert_eq!(record.get("Name"), Some(&Value::string("Ada")));
    assert_eq!(record.get("Age"), Some(&Value::i32(-1)));
}

#[test]
fn test_unset_field_is_written_as_default() {
    let (graph, root) = single_person("demo.Person", &[]);
    let bytes = write_with(&v2_registry(), &graph, &root);
    let decoded = decode(&bytes, &v2_registry()).unwrap();
    let record = decoded.graph.record(decoded.root.as_ref_id().unwrap()).unwrap();
    assert_eq!(record.get("Name"), Some(&Value::Null));
    assert_eq!(record.get("Age"), Some(&Value::i32(-1)));
}

#[test]
fn test_newer_stream_is_rejected_by_older_reader() {
    let (graph, root) = single_person(
        "demo.Person",
        &[("Name", Value::string("Ada")), ("Age", Value::i32(36))],
    );
    let bytes = write_with(&v2_registry(), &graph, &root);

    let err = decode(&bytes, &v1_registry()).unwrap_err();
    let report = err.corruption_report().expect("corruption error");
    assert!(report.detail.contains("newer than local version 0"));
    assert_eq!(report.breadcrumbs, vec!["demo.Person".to_string()]);
}

#[test]
fn test_undeclared_field_fails_to_encode() {
    let (graph, root) = single_person(
        "demo.Person",
        &[("Name", Value::string("Ada")), ("Age", Value::i32(36))],
    );
    let err = encode(&graph, &root, &v1_registry(), CodecOptions::default()).unwrap_err();
    assert!(err.to_string().contains("field 'Age' is not declared"));
}

#[test]
fn test_qualified_identities_match_across_builds() {
    let writer = DriverRegistry::builder()
        .record(RecordSchema::reference("demo.Person|model@1.0").field("Name", Value::Null))
        .build();
    let reader = DriverRegistry::builder()
        .record(RecordSchema::reference("demo.Person|model@2.3").field("Name", Value::Null))
        .build();

    let mut graph = Graph::new();
    let p = graph.insert(Object::Record(
        Record::new("demo.Person|model@1.0").with("Name", Value::string("Ada")),
    ));
    let list = graph.insert(Object::List(Sequence::from_items(
        TypeIdentity::new("demo.Person|model@1.0"),
        vec![Value::Ref(p)],
    )));
    let bytes = write_with(&writer, &graph, &Value::Ref(list));

    let decoded = decode(&bytes, &reader).unwrap();
    let Object::List(items) = decoded.graph.get(decoded.root.as_ref_id().unwrap()).unwrap() else {
        panic!("root is a list");
    };
    assert_eq!(items.element.as_str(), "demo.Person|model@2.3");
    let person = decoded.graph.record(items.items[0].as_ref_id().unwrap()).unwrap();
    assert_eq!(person.type_id.as_str(), "demo.Person|model@2.3");
    assert_eq!(person.get("Name"), Some(&Value::string("Ada")));
}

#[test]
fn test_base_layer_evolves_under_a_subtype() {
    let writer = DriverRegistry::builder()
        .record(RecordSchema::reference("demo.Person").field("Name", Value::Null))
        .record(
            RecordSchema::reference("demo.Employee")
                .parent("demo.Person")
                .field("Badge", Value::i32(0)),
        )
        .build();
    let reader = DriverRegistry::builder()
        .record(
            RecordSchema::reference("demo.Person")
                .version(1)
                .field("Name", Value::Null)
                .field_since("Email", 1, Value::string("unknown")),
        )
        .record(
            RecordSchema::reference("demo.Employee")
                .parent("demo.Person")
                .field("Badge", Value::i32(0)),
        )
        .build();

    let (graph, root) = single_person(
        "demo.Employee",
        &[("Name", Value::string("Grace")), ("Badge", Value::i32(7))],
    );
    let bytes = write_with(&writer, &graph, &root);
    let decoded = decode(&bytes, &reader).unwrap();
    let record = decoded.graph.record(decoded.root.as_ref_id().unwrap()).unwrap();
    let names: Vec<&str> = record.fields.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["Name", "Email", "Badge"]);
    assert_eq!(record.get("Email"), Some(&Value::string("unknown")));
    assert_eq!(record.get("Badge"), Some(&Value::i32(7)));
}

#[test]
fn test_new_base_layer_takes_all_defaults() {
    // The writer's Employee had no parent yet
    let writer = DriverRegistry::builder()
        .record(RecordSchema::reference("demo.Employee").field("Badge", Value::i32(0)))
        .build();
    let reader = DriverRegistry::builder()
        .record(RecordSchema::reference("demo.Person").field("Name", Value::string("?")))
        .record(
            RecordSchema::reference("demo.Employee")
                .parent("demo.Person")
                .field("Badge", Value::i32(0)),
        )
        .build();

    let (graph, root) = single_person("demo.Employee", &[("Badge", Value::i32(3))]);
    let bytes = write_with(&writer, &graph, &root);
    let decoded = decode(&bytes, &reader).unwrap();
    let record = decoded.graph.record(decoded.root.as_ref_id().unwrap()).unwrap();
    assert_eq!(record.get("Name"), Some(&Value::string("?")));
    assert_eq!(record.get("Badge"), Some(&Value::i32(3)));
}

#[test]
fn test_unknown_stream_layer_is_corruption() {
    let writer = DriverRegistry::builder()
        .record(RecordSchema::reference("demo.Person").field("Name", Value::Null))
        .record(
            RecordSchema::reference("demo.Employee")
                .parent("demo.Person")
                .field("Badge", Value::i32(0)),
        )
        .build();
    let reader = DriverRegistry::builder()
        .record(RecordSchema::reference("demo.Employee").field("Badge", Value::i32(0)))
        .build();

    let (graph, root) = single_person(
        "demo.Employee",
        &[("Name", Value::string("Grace")), ("Badge", Value::i32(7))],
    );
    let bytes = write_with(&writer, &graph, &root);
    let err = decode(&bytes, &reader).unwrap_err();
    assert!(err.is_corruption());
    assert!(err
        .to_string()
        .contains("stream layer 'demo.Person' is not part of local type 'demo.Employee'"));
}

#[test]
fn test_unresolvable_type_fails_only_when_materialized() {
    let writer = v1_registry();
    let (graph, root) = single_person("demo.Person", &[("Name", Value::string("Ada"))]);
    let bytes = write_with(&writer, &graph, &root);

    // Inspection needs no driver
    let summary = tessera_codec::inspect(&bytes).unwrap();
    assert!(matches!(summary.root, tessera_codec::RootSummary::Object(_)));

    let err = decode(&bytes, &DriverRegistry::builtin()).unwrap_err();
    assert!(matches!(err, tessera_codec::CodecError::Resolution { .. }));
}
