//! Record schemas and the record driver
//!
//! A record type is declared once with a [`RecordSchema`]: its identity,
//! current version, fields (each with the version it was introduced in and
//! a default), and optionally a parent record. The registry assembles the
//! ancestor chain from parent declarations and builds a [`RecordDriver`].
//!
//! ## Wire content
//!
//! Layers are written root first. Each layer writes every field it knows,
//! in declaration order, as a full value. In debug mode each field is
//! preceded by a checkpoint tagged `Layer.field` (weak layer name).
//!
//! ## Version tolerance
//!
//! On decode, stream layers are matched to local layers by weak identity.
//! A local field is read only if the stream's layer version includes it
//! (`since <= version`); otherwise it takes its default. Local layers the
//! stream does not have take all defaults. A stream layer the local chain
//! does not know, or one newer than the local definition, is corruption:
//! its field bytes cannot be skipped.

use crate::catalog::{LayerInfo, TypeInfo};
use crate::debug::Crumb;
use crate::decoder::Decoder;
use crate::driver::{Decoded, Driver, Registration, Shape, Subject, Versioning};
use crate::encoder::Encoder;
use crate::error::{CodecError, CodecResult};
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tessera_core::{Object, ObjectId, Record, StructValue, TypeIdentity, Value};

/// Reference records live in the graph; value records are copied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Tracked, may be shared and take part in cycles
    Reference,
    /// Struct semantics
    Value,
}

/// One declared field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// Field name
    pub name: Arc<str>,
    /// Layer version that introduced the field
    pub since: i32,
    /// Value used when the stream predates the field
    pub default: Value,
}

/// Declaration of one record type
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    identity: TypeIdentity,
    kind: RecordKind,
    version: i32,
    registration: Registration,
    parent: Option<TypeIdentity>,
    fields: Vec<FieldDef>,
}

impl RecordSchema {
    /// Reference record (pre-tracked, version 0)
    pub fn reference(identity: impl Into<TypeIdentity>) -> Self {
        Self::declare(identity.into(), RecordKind::Reference)
    }

    /// Value record (version 0)
    pub fn value(identity: impl Into<TypeIdentity>) -> Self {
        Self::declare(identity.into(), RecordKind::Value)
    }

    fn declare(identity: TypeIdentity, kind: RecordKind) -> Self {
        RecordSchema {
            identity,
            kind,
            version: 0,
            registration: Registration::PreTrack,
            parent: None,
            fields: Vec::new(),
        }
    }

    /// Set the current version
    pub fn version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    /// Add a field present since version 0
    pub fn field(self, name: &str, default: impl Into<Value>) -> Self {
        self.field_since(name, 0, default)
    }

    /// Add a field introduced in version `since`
    pub fn field_since(mut self, name: &str, since: i32, default: impl Into<Value>) -> Self {
        self.fields.push(FieldDef {
            name: Arc::from(name),
            since,
            default: default.into(),
        });
        self
    }

    /// Declare the parent record
    pub fn parent(mut self, parent: impl Into<TypeIdentity>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Choose when decoded instances get their handle
    pub fn registration(mut self, registration: Registration) -> Self {
        self.registration = registration;
        self
    }

    /// Declared identity
    pub fn identity(&self) -> &TypeIdentity {
        &self.identity
    }

    /// Reference or value record
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Declared parent
    pub fn parent_identity(&self) -> Option<&TypeIdentity> {
        self.parent.as_ref()
    }

    /// Declared fields of this layer only
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }
}

/// One layer of a resolved chain
#[derive(Debug, Clone)]
struct Layer {
    weak: TypeIdentity,
    version: i32,
    fields: Vec<FieldDef>,
}

/// Driver for a declared record type and its ancestor chain
#[derive(Debug)]
pub struct RecordDriver {
    identity: TypeIdentity,
    kind: RecordKind,
    registration: Registration,
    layers: Vec<Layer>,
    versioning: Versioning,
}

impl RecordDriver {
    /// Build a driver from a chain of schemas, root first, leaf last.
    ///
    /// Rejects fields introduced after their layer's version and field names
    /// repeated anywhere in the chain.
    pub fn from_chain(chain: &[&RecordSchema]) -> CodecResult<Self> {
        let Some(leaf) = chain.last() else {
            return Err(CodecError::resolution("<record>", "empty ancestor chain"));
        };
        let mut seen = FxHashSet::default();
        let mut layers = Vec::with_capacity(chain.len());
        let mut infos = Vec::with_capacity(chain.len());

        for schema in chain {
            if schema.version < 0 {
                return Err(CodecError::resolution(
                    &schema.identity,
                    format!("negative version {}", schema.version),
                ));
            }
            for field in &schema.fields {
                if field.since > schema.version || field.since < 0 {
                    return Err(CodecError::resolution(
                        &schema.identity,
                        format!(
                            "field '{}' introduced in version {} but the layer is at version {}",
                            field.name, field.since, schema.version
                        ),
                    ));
                }
                if !seen.insert(field.name.clone()) {
                    return Err(CodecError::resolution(
                        &leaf.identity,
                        format!("field '{}' declared twice in the ancestor chain", field.name),
                    ));
                }
            }
            layers.push(Layer {
                weak: schema.identity.weak(),
                version: schema.version,
                fields: schema.fields.clone(),
            });
            infos.push(LayerInfo::new(schema.identity.clone(), schema.version));
        }

        Ok(RecordDriver {
            identity: leaf.identity.clone(),
            kind: leaf.kind,
            registration: leaf.registration,
            layers,
            versioning: Versioning::SelfDescribing(Arc::from(infos)),
        })
    }

    /// Reference or value record
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Field names across the chain, root layer first
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.layers
            .iter()
            .flat_map(|l| l.fields.iter().map(|f| &*f.name))
    }

    fn declares(&self, name: &str) -> bool {
        self.field_names().any(|n| n == name)
    }

    /// Stream version for each local layer, `None` where the stream lacks it
    fn match_layers(&self, d: &Decoder<'_>, info: &TypeInfo) -> CodecResult<Vec<Option<i32>>> {
        if !info.is_self_describing() {
            return Err(d.corruption(format!(
                "record '{}' written without a version",
                info.identity
            )));
        }
        let mut versions = vec![None; self.layers.len()];
        let mut next = 0;
        for stream in info.chain.iter() {
            let weak = stream.identity.weak();
            let Some(offset) = self.layers[next..].iter().position(|l| l.weak == weak) else {
                return Err(d.corruption(format!(
                    "stream layer '{}' is not part of local type '{}'",
                    stream.identity, self.identity
                )));
            };
            let index = next + offset;
            let local = &self.layers[index];
            if stream.version > local.version {
                return Err(d.corruption(format!(
                    "stream layer '{}' has version {}, newer than local version {}",
                    stream.identity, stream.version, local.version
                )));
            }
            versions[index] = Some(stream.version);
            next = index + 1;
        }
        Ok(versions)
    }

    fn read_fields(
        &self,
        d: &mut Decoder<'_>,
        info: &TypeInfo,
    ) -> CodecResult<Vec<(String, Value)>> {
        let versions = self.match_layers(d, info)?;
        let mut fields = Vec::new();
        for (layer, stream_version) in self.layers.iter().zip(versions) {
            for field in &layer.fields {
                let value = match stream_version {
                    Some(v) if field.since <= v => {
                        d.checkpoint(format_args!("{}.{}", layer.weak, field.name))?;
                        d.enter(Crumb::Field(field.name.clone()));
                        let value = d.read_value()?;
                        d.leave();
                        value
                    }
                    _ => field.default.clone(),
                };
                fields.push((field.name.to_string(), value));
            }
        }
        Ok(fields)
    }

    fn write_fields(
        &self,
        e: &mut Encoder<'_>,
        present: &[(String, Value)],
    ) -> CodecResult<()> {
        if let Some((name, _)) = present.iter().find(|(n, _)| !self.declares(n)) {
            return Err(CodecError::encode(format!(
                "field '{}' is not declared by '{}'",
                name, self.identity
            )));
        }
        for layer in &self.layers {
            for field in &layer.fields {
                e.checkpoint(format_args!("{}.{}", layer.weak, field.name));
                let value = present
                    .iter()
                    .find(|(n, _)| **n == *field.name)
                    .map(|(_, v)| v)
                    .unwrap_or(&field.default);
                e.write_value(value)?;
            }
        }
        Ok(())
    }
}

impl Driver for RecordDriver {
    fn identity(&self) -> &TypeIdentity {
        &self.identity
    }

    fn shape(&self) -> Shape {
        match self.kind {
            RecordKind::Reference => Shape::Reference(self.registration),
            RecordKind::Value => Shape::Value,
        }
    }

    fn versioning(&self) -> Versioning {
        self.versioning.clone()
    }

    fn decode(
        &self,
        d: &mut Decoder<'_>,
        info: &TypeInfo,
        _this: Option<ObjectId>,
    ) -> CodecResult<Decoded> {
        let fields = self.read_fields(d, info)?;
        Ok(match self.kind {
            RecordKind::Reference => Decoded::Object(Object::Record(Record {
                type_id: self.identity.clone(),
                fields,
            })),
            RecordKind::Value => Decoded::Value(Value::Struct(StructValue {
                type_id: self.identity.clone(),
                fields,
            })),
        })
    }

    fn encode(&self, e: &mut Encoder<'_>, subject: Subject<'_>) -> CodecResult<()> {
        match (self.kind, subject) {
            (RecordKind::Reference, Subject::Object(_, Object::Record(r)))
                if r.type_id.weakly_matches(&self.identity) =>
            {
                self.write_fields(e, &r.fields)
            }
            (RecordKind::Value, Subject::Value(Value::Struct(s)))
                if s.type_id.weakly_matches(&self.identity) =>
            {
                self.write_fields(e, &s.fields)
            }
            (_, other) => Err(other.mismatch(&self.identity)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_versioning_lists_every_layer() {
        let base = RecordSchema::reference("demo.Entity").field("Id", Value::i32(0));
        let person = RecordSchema::reference("demo.Person|model@2")
            .version(2)
            .parent("demo.Entity")
            .field("Name", Value::Null)
            .field_since("Age", 2, Value::i32(-1));
        let driver = RecordDriver::from_chain(&[&base, &person]).unwrap();

        let Versioning::SelfDescribing(layers) = driver.versioning() else {
            panic!("records are self-describing");
        };
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0], LayerInfo::new("demo.Entity", 0));
        assert_eq!(layers[1], LayerInfo::new("demo.Person|model@2", 2));
        assert_eq!(
            driver.field_names().collect::<Vec<_>>(),
            vec!["Id", "Name", "Age"]
        );
        assert_eq!(driver.shape(), Shape::Reference(Registration::PreTrack));
    }

    #[test]
    fn test_field_newer_than_layer_is_rejected() {
        let schema = RecordSchema::reference("demo.Person").field_since("Age", 3, Value::Null);
        let err = RecordDriver::from_chain(&[&schema]).unwrap_err();
        assert!(err.to_string().contains("introduced in version 3"));
    }

    #[test]
    fn test_duplicate_field_across_chain_is_rejected() {
        let base = RecordSchema::reference("demo.Entity").field("Name", Value::Null);
        let leaf = RecordSchema::reference("demo.Person")
            .parent("demo.Entity")
            .field("Name", Value::Null);
        let err = RecordDriver::from_chain(&[&base, &leaf]).unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_value_record_is_not_sealed() {
        let point = RecordSchema::value("demo.Point")
            .field("X", Value::i32(0))
            .field("Y", Value::i32(0));
        let driver = RecordDriver::from_chain(&[&point]).unwrap();
        assert_eq!(driver.shape(), Shape::Value);
        assert!(!driver.is_sealed());
    }
}
