//! Corruption and desync detection
//!
//! Crafted and damaged streams must fail with a corruption error carrying
//! context, never panic or decode garbage silently.

use std::sync::Arc;
use tessera_codec::catalog::{ReadCatalog, TypeInfo};
use tessera_codec::{
    decode, encode, CodecError, CodecOptions, Decoded, Decoder, Driver, DriverRegistry, Encoder,
    Marker, RecordSchema, Shape, Subject, WireError,
};
use tessera_core::{
    Graph, Object, ObjectId, Record, Sequence, StructValue, TypeIdentity, Value, DEFAULT_MAX_DEPTH,
};

fn header(debug: bool) -> Vec<u8> {
    let mut bytes = b"TSRA".to_vec();
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.push(if debug { 182 } else { 180 });
    bytes
}

fn person_registry(fields: &[&str]) -> Arc<DriverRegistry> {
    let mut schema = RecordSchema::reference("demo.Person");
    for name in fields {
        schema = schema.field(name, Value::Null);
    }
    DriverRegistry::builder().record(schema).build()
}

#[test]
fn test_reference_past_table_end() {
    let mut bytes = header(false);
    bytes.extend_from_slice(&[Marker::Reference.to_byte(), 0x05]);
    let err = decode(&bytes, &DriverRegistry::builtin()).unwrap_err();
    let report = err.corruption_report().expect("corruption");
    assert!(report.detail.contains("reference handle 5 beyond table size 0"));
    assert_eq!(report.offset, 9);
}

#[test]
fn test_reference_past_table_end_inside_list() {
    let mut bytes = header(false);
    bytes.push(Marker::Object.to_byte());
    // New named entry "List<object>", external version
    bytes.push(2);
    bytes.push(12);
    bytes.extend_from_slice(b"List<object>");
    bytes.push(1);
    // Two items: a back-reference to the list itself, then one past the end
    bytes.push(2);
    bytes.extend_from_slice(&[Marker::Reference.to_byte(), 0]);
    bytes.extend_from_slice(&[Marker::Reference.to_byte(), 1]);

    let err = decode(&bytes, &DriverRegistry::builtin()).unwrap_err();
    let report = err.corruption_report().expect("corruption");
    assert!(report.detail.contains("beyond table size 1"));
    assert_eq!(report.objects, 1);
    assert_eq!(report.breadcrumbs, vec!["List<object>", "[1]"]);
}

#[test]
fn test_invalid_marker_and_truncation() {
    let mut bad_marker = header(false);
    bad_marker.push(42);
    assert!(decode(&bad_marker, &DriverRegistry::builtin())
        .unwrap_err()
        .to_string()
        .contains("unknown marker byte 42"));

    let mut truncated = header(false);
    truncated.extend_from_slice(&[Marker::Int32.to_byte(), 1, 2]);
    assert!(decode(&truncated, &DriverRegistry::builtin())
        .unwrap_err()
        .is_corruption());

    assert!(decode(b"TSR", &DriverRegistry::builtin()).is_err());
}

#[test]
fn test_unsupported_version_and_bad_version_value() {
    let mut wrong = b"TSRA".to_vec();
    wrong.extend_from_slice(&[9, 0, 180, 0]);
    let err = decode(&wrong, &DriverRegistry::builtin()).unwrap_err();
    assert!(err.to_string().contains("unsupported format version 9"));

    // Struct marker with a type version of -2 (zig-zag 3)
    let mut bytes = header(false);
    bytes.extend_from_slice(&[Marker::Struct.to_byte(), 2, 3, b'i', b'6', b'4', 3]);
    let err = decode(&bytes, &DriverRegistry::builtin()).unwrap_err();
    assert!(err.is_corruption());
}

#[test]
fn test_unknown_comparer_byte() {
    let mut bytes = header(false);
    bytes.push(Marker::Object.to_byte());
    bytes.push(2);
    bytes.push(10);
    bytes.extend_from_slice(b"Set<float>");
    bytes.push(1);
    bytes.push(9);
    let err = decode(&bytes, &DriverRegistry::builtin()).unwrap_err();
    // "float" is not a built-in name
    assert!(matches!(err, CodecError::Resolution { .. }));

    let mut bytes = header(false);
    bytes.push(Marker::Object.to_byte());
    bytes.push(2);
    bytes.push(8);
    bytes.extend_from_slice(b"Set<i32>");
    bytes.push(1);
    bytes.push(9);
    let err = decode(&bytes, &DriverRegistry::builtin()).unwrap_err();
    assert!(err.to_string().contains("unknown key comparer byte 9"));
}

#[test]
fn test_duplicate_set_member_fails_in_deferred_pass() {
    let registry = DriverRegistry::builtin();
    let mut bytes = header(false);
    bytes.push(Marker::Object.to_byte());
    bytes.push(2);
    bytes.push(8);
    bytes.extend_from_slice(b"Set<i32>");
    bytes.push(1);
    // Structural comparer, two identical members
    bytes.extend_from_slice(&[0, 2]);
    bytes.extend_from_slice(&[Marker::Int32.to_byte(), 7, 0, 0, 0]);
    bytes.extend_from_slice(&[Marker::Int32.to_byte(), 7, 0, 0, 0]);

    let err = decode(&bytes, &registry).unwrap_err();
    let report = err.corruption_report().expect("corruption");
    assert!(report.detail.contains("duplicate member"));
    assert_eq!(report.breadcrumbs, vec!["deferred"]);
    assert_eq!(report.offset, bytes.len() as u64);
}

#[test]
fn test_count_larger_than_stream() {
    let mut bytes = header(false);
    bytes.push(Marker::Object.to_byte());
    bytes.push(2);
    bytes.push(9);
    bytes.extend_from_slice(b"List<i32>");
    bytes.push(1);
    // Claims 1000 elements (varint 0xE8 0x07)
    bytes.extend_from_slice(&[0xE8, 0x07]);
    let err = decode(&bytes, &DriverRegistry::builtin()).unwrap_err();
    assert!(err.to_string().contains("element count 1000 exceeds"));
}

#[test]
fn test_runaway_nesting_is_corruption() {
    // One List<object> entry, then 200k lists each holding the next
    let mut bytes = header(false);
    bytes.extend_from_slice(&[Marker::Object.to_byte(), 2, 12]);
    bytes.extend_from_slice(b"List<object>");
    bytes.extend_from_slice(&[1, 1]);
    for _ in 0..200_000 {
        bytes.extend_from_slice(&[Marker::Object.to_byte(), 3, 0, 1]);
    }
    bytes.push(Marker::Null.to_byte());

    let err = decode(&bytes, &DriverRegistry::builtin()).unwrap_err();
    let report = err.corruption_report().expect("corruption");
    assert!(report
        .detail
        .contains(&format!("nested deeper than the limit of {}", DEFAULT_MAX_DEPTH)));
    assert!(report.breadcrumbs.len() < 64);
}

#[test]
fn test_random_byte_flips_never_panic() {
    let registry = person_registry(&["Name", "Friend"]);
    let mut graph = Graph::new();
    let a = graph.reserve();
    let b = graph.insert(Object::Record(
        Record::new("demo.Person")
            .with("Name", Value::string("B"))
            .with("Friend", Value::Ref(a)),
    ));
    graph
        .complete(
            a,
            Object::Record(
                Record::new("demo.Person")
                    .with("Name", Value::string("A"))
                    .with("Friend", Value::Ref(b)),
            ),
        )
        .unwrap();
    let bytes = encode(&graph, &Value::Ref(a), &registry, CodecOptions::debug()).unwrap();

    for i in 0..bytes.len() {
        let mut damaged = bytes.clone();
        damaged[i] ^= 0x5A;
        // Either a clean error or (rarely) a still-valid stream
        let _ = decode(&damaged, &registry);
        let _ = decode(&bytes[..i], &registry);
    }
}

// ============================================================================
// Debug sentinels
// ============================================================================

#[test]
fn test_missing_write_detected_at_next_sentinel() {
    // Writer build forgot the Age field; reader build expects it
    let writer = person_registry(&["Name"]);
    let reader = person_registry(&["Name", "Age"]);

    let mut graph = Graph::new();
    let p = graph.insert(Object::Record(
        Record::new("demo.Person").with("Name", Value::string("Ada")),
    ));
    let list = graph.insert(Object::List(Sequence::from_items(
        TypeIdentity::object(),
        vec![Value::Ref(p), Value::i32(5)],
    )));
    let root = Value::Ref(list);
    let bytes = encode(&graph, &root, &writer, CodecOptions::debug()).unwrap();

    let err = decode(&bytes, &reader).unwrap_err();
    let report = err.desync_report().expect("desync");
    // Sentinels: list value (0), person value (1), Name checkpoint (2),
    // Name value (3); the reader expects the Age checkpoint next
    assert_eq!(report.expected_counter, 4);
    assert_eq!(report.expected_tag, "demo.Person.Age");
    assert_eq!(report.found_counter, Some(4));
    assert_eq!(report.found_tag.as_deref(), Some("value"));
    assert_eq!(report.last_verified.as_deref(), Some("value"));
    assert_eq!(
        report.breadcrumbs,
        vec!["List<object>", "[0]", "demo.Person"]
    );
}

#[test]
fn test_without_debug_the_same_drift_goes_unnoticed() {
    let writer = person_registry(&["Name"]);
    let reader = person_registry(&["Name", "Age"]);

    let mut graph = Graph::new();
    let p = graph.insert(Object::Record(
        Record::new("demo.Person").with("Name", Value::string("Ada")),
    ));
    let list = graph.insert(Object::List(Sequence::from_items(
        TypeIdentity::object(),
        vec![Value::Ref(p), Value::i32(5)],
    )));
    let bytes = encode(&graph, &Value::Ref(list), &writer, CodecOptions::default()).unwrap();

    // The reader swallows the next list item as Age and then runs out
    let err = decode(&bytes, &reader).unwrap_err();
    assert!(err.desync_report().is_none());
    assert!(err.is_corruption());
}

#[test]
fn test_field_order_drift_reports_both_tags() {
    let writer = person_registry(&["Name", "Age"]);
    let reader = person_registry(&["Age", "Name"]);

    let mut graph = Graph::new();
    let p = graph.insert(Object::Record(
        Record::new("demo.Person")
            .with("Name", Value::string("Ada"))
            .with("Age", Value::i32(36)),
    ));
    let bytes = encode(&graph, &Value::Ref(p), &writer, CodecOptions::debug()).unwrap();
    let err = decode(&bytes, &reader).unwrap_err();
    let report = err.desync_report().expect("desync");
    assert_eq!(report.expected_counter, 1);
    assert_eq!(report.expected_tag, "demo.Person.Age");
    assert_eq!(report.found_tag.as_deref(), Some("demo.Person.Name"));
    assert!(err.to_string().contains("demo.Person.Age"));
}

/// Value type that switches debug mode on around its payload
#[derive(Debug)]
struct Traced {
    identity: TypeIdentity,
}

impl Driver for Traced {
    fn identity(&self) -> &TypeIdentity {
        &self.identity
    }

    fn shape(&self) -> Shape {
        Shape::Value
    }

    fn decode(
        &self,
        d: &mut Decoder<'_>,
        _info: &TypeInfo,
        _this: Option<ObjectId>,
    ) -> tessera_codec::CodecResult<Decoded> {
        let inner = d.read_value()?;
        assert!(d.debug_active());
        d.checkpoint("Traced.end")?;
        Ok(Decoded::Value(Value::Struct(
            StructValue::new(self.identity.clone()).with("Inner", inner),
        )))
    }

    fn encode(&self, e: &mut Encoder<'_>, subject: Subject<'_>) -> tessera_codec::CodecResult<()> {
        let Subject::Value(Value::Struct(s)) = subject else {
            return Err(subject.mismatch(&self.identity));
        };
        e.set_debug(true);
        e.write_value(s.get("Inner").unwrap_or(&Value::Null))?;
        e.checkpoint("Traced.end");
        Ok(())
    }
}

#[test]
fn test_mode_byte_switches_debug_mid_stream() {
    let registry = DriverRegistry::builder()
        .custom(Arc::new(Traced {
            identity: TypeIdentity::new("demo.Traced"),
        }))
        .build();
    let root = Value::Struct(StructValue::new("demo.Traced").with("Inner", Value::string("x")));

    let bytes = encode(&Graph::new(), &root, &registry, CodecOptions::default()).unwrap();
    assert!(bytes.contains(&182));

    let decoded = decode(&bytes, &registry).unwrap();
    assert_eq!(decoded.root, root);
    assert_eq!(decoded.stats.checkpoints, 2);

    let summary = tessera_codec::inspect(&bytes).unwrap();
    assert!(!summary.debug);
}

#[test]
fn test_catalog_back_reference_must_point_backwards() {
    let mut catalog = ReadCatalog::new();
    let bytes = [3u8, 0];
    let err = catalog
        .read_entry(&mut tessera_codec::primitives::ByteReader::new(&bytes))
        .unwrap_err();
    assert_eq!(err, WireError::BadCatalogIndex { index: 0, len: 0 });
    assert!(err.to_string().contains("beyond catalog size 0"));
}
