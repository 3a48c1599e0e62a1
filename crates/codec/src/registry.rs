//! Driver registry
//!
//! Maps type identities to drivers. Declarations (records, enums, custom
//! drivers) are collected at startup by a [`RegistryBuilder`]; everything
//! else is synthesized on first use and memoized.
//!
//! ## Lookup
//!
//! 1. Exact identity already in the memo
//! 2. Weak form (qualifiers stripped), synthesizing on first sight:
//!    - declared enum: wraps its underlying integral kind
//!    - `Array<T>`, `List<T>`, `Set<T>`, `Map<K,V>`: constituents resolved
//!      recursively, then wrapped
//!    - declared record: ancestor chain assembled from parent declarations
//! 3. Anything else is a resolution error
//!
//! ## Thread Safety
//!
//! Memo cells are `Arc<OnceCell<_>>` stored in a `DashMap`. The map guard is
//! released before a cell is initialized, so synthesis of one type may
//! resolve its constituents, and concurrent first uses of the same type
//! synthesize it exactly once. Initialized entries never change.

use crate::driver::{Driver, Element};
use crate::drivers::{
    AnyDriver, EnumDriver, MapDriver, RecordDriver, RecordSchema, ScalarDriver,
    SequenceDriver, SetDriver,
};
use crate::error::{CodecError, CodecResult};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tessera_core::{builtin, ScalarKind, TypeIdentity, TypeName};
use tracing::debug;

type Cell = Arc<OnceCell<Arc<dyn Driver>>>;

/// Identity → driver table shared by every pass
#[derive(Debug, Default)]
pub struct DriverRegistry {
    records: FxHashMap<TypeIdentity, RecordSchema>,
    enums: FxHashMap<TypeIdentity, (TypeIdentity, ScalarKind)>,
    memo: DashMap<TypeIdentity, Cell>,
}

impl DriverRegistry {
    /// Registry with only the built-in scalar and `object` drivers
    pub fn builtin() -> Arc<DriverRegistry> {
        RegistryBuilder::new().build()
    }

    /// Start a declaration table
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Driver for `identity`, synthesized and memoized on first use
    pub fn resolve(&self, identity: &TypeIdentity) -> CodecResult<Arc<dyn Driver>> {
        if let Some(driver) = self.memo.get(identity).and_then(|cell| cell.get().cloned()) {
            return Ok(driver);
        }

        let weak = identity.weak();
        // Clone the cell out so the shard lock is not held during synthesis
        let cell: Cell = self.memo.entry(weak.clone()).or_default().clone();
        let driver = match cell.get_or_try_init(|| self.synthesize(&weak)) {
            Ok(driver) => driver.clone(),
            Err(e) => {
                // Failed identities leave no entry behind
                self.memo.remove_if(&weak, |_, cell| cell.get().is_none());
                return Err(e);
            }
        };
        if *identity != weak {
            self.memo.entry(identity.clone()).or_insert(cell);
        }
        Ok(driver)
    }

    /// True if a record with this weak identity was declared
    pub fn declares_record(&self, identity: &TypeIdentity) -> bool {
        self.records.contains_key(&identity.weak())
    }

    /// True if an enum with this weak identity was declared
    pub fn declares_enum(&self, identity: &TypeIdentity) -> bool {
        self.enums.contains_key(&identity.weak())
    }

    /// Number of memoized identities (exact and weak)
    pub fn memoized(&self) -> usize {
        self.memo.len()
    }

    fn synthesize(&self, weak: &TypeIdentity) -> CodecResult<Arc<dyn Driver>> {
        if let Some((declared, kind)) = self.enums.get(weak) {
            debug!(target: "tessera::registry", identity = %weak, "Synthesizing enum driver");
            return Ok(Arc::new(EnumDriver::new(declared.clone(), *kind)?));
        }

        let name = weak
            .parse()
            .map_err(|e| CodecError::resolution(weak, e.to_string()))?;
        if !name.args.is_empty() {
            return self.synthesize_composite(weak, &name);
        }

        if self.records.contains_key(weak) {
            return self.synthesize_record(weak);
        }

        Err(CodecError::resolution(weak, "type is not declared"))
    }

    fn synthesize_composite(
        &self,
        weak: &TypeIdentity,
        name: &TypeName,
    ) -> CodecResult<Arc<dyn Driver>> {
        let arity = match name.name.as_str() {
            builtin::ARRAY | builtin::LIST | builtin::SET => 1,
            builtin::MAP => 2,
            other => {
                return Err(CodecError::resolution(
                    weak,
                    format!("unknown generic type '{}'", other),
                ))
            }
        };
        if name.args.len() != arity {
            return Err(CodecError::resolution(
                weak,
                format!(
                    "'{}' takes {} type argument(s), found {}",
                    name.name,
                    arity,
                    name.args.len()
                ),
            ));
        }

        debug!(target: "tessera::registry", identity = %weak, "Synthesizing collection driver");
        let mut elements = Vec::with_capacity(arity);
        for arg in &name.args {
            let driver = self.resolve(&TypeIdentity::new(arg.weak_text()))?;
            elements.push(Element::new(driver));
        }

        let identity = weak.clone();
        let mut elements = elements.into_iter();
        let (Some(first), second) = (elements.next(), elements.next()) else {
            return Err(CodecError::resolution(weak, "missing type argument"));
        };
        Ok(match (name.name.as_str(), second) {
            (builtin::MAP, Some(value)) => Arc::new(MapDriver::new(identity, first, value)),
            (builtin::SET, _) => Arc::new(SetDriver::new(identity, first)),
            (builtin::ARRAY, _) => Arc::new(SequenceDriver::array(identity, first)),
            _ => Arc::new(SequenceDriver::list(identity, first)),
        })
    }

    fn synthesize_record(&self, weak: &TypeIdentity) -> CodecResult<Arc<dyn Driver>> {
        let mut chain: Vec<&RecordSchema> = Vec::new();
        let mut visited = FxHashSet::default();
        let mut cursor = Some(weak.clone());

        while let Some(current) = cursor {
            if !visited.insert(current.clone()) {
                return Err(CodecError::resolution(
                    weak,
                    format!("ancestor cycle through '{}'", current),
                ));
            }
            let Some(schema) = self.records.get(&current) else {
                return Err(CodecError::resolution(
                    weak,
                    format!("parent '{}' is not declared", current),
                ));
            };
            if let Some(child) = chain.last() {
                if child.kind() != schema.kind() {
                    return Err(CodecError::resolution(
                        weak,
                        format!(
                            "'{}' and its parent '{}' mix reference and value records",
                            child.identity(),
                            schema.identity()
                        ),
                    ));
                }
            }
            chain.push(schema);
            cursor = schema.parent_identity().map(TypeIdentity::weak);
        }

        chain.reverse();
        debug!(
            target: "tessera::registry",
            identity = %weak,
            layers = chain.len(),
            "Synthesizing record driver"
        );
        Ok(Arc::new(RecordDriver::from_chain(&chain)?))
    }
}

/// Collects declarations and produces an immutable [`DriverRegistry`]
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    records: Vec<RecordSchema>,
    enums: Vec<(TypeIdentity, ScalarKind)>,
    custom: Vec<Arc<dyn Driver>>,
}

impl RegistryBuilder {
    /// Empty declaration table
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a record type
    pub fn record(mut self, schema: RecordSchema) -> Self {
        self.records.push(schema);
        self
    }

    /// Declare an enum stored as `underlying`
    pub fn enumeration(mut self, identity: impl Into<TypeIdentity>, underlying: ScalarKind) -> Self {
        self.enums.push((identity.into(), underlying));
        self
    }

    /// Register a hand-written driver under its own identity
    pub fn custom(mut self, driver: Arc<dyn Driver>) -> Self {
        self.custom.push(driver);
        self
    }

    /// Freeze the declarations. Later declarations of the same weak
    /// identity replace earlier ones.
    pub fn build(self) -> Arc<DriverRegistry> {
        let memo: DashMap<TypeIdentity, Cell> = DashMap::new();
        let preset = |driver: Arc<dyn Driver>| {
            let exact = driver.identity().clone();
            let weak = exact.weak();
            let cell: Cell = Arc::new(OnceCell::with_value(driver));
            if exact != weak {
                memo.insert(exact, Arc::clone(&cell));
            }
            memo.insert(weak, cell);
        };
        for kind in ScalarKind::ALL {
            preset(Arc::new(ScalarDriver::new(kind)));
        }
        preset(Arc::new(AnyDriver::new()));
        for driver in self.custom {
            preset(driver);
        }

        let records = self
            .records
            .into_iter()
            .map(|schema| (schema.identity().weak(), schema))
            .collect();
        let enums = self
            .enums
            .into_iter()
            .map(|(identity, kind)| (identity.weak(), (identity, kind)))
            .collect();

        Arc::new(DriverRegistry {
            records,
            enums,
            memo,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Registration, Shape};
    use tessera_core::Value;

    fn registry() -> Arc<DriverRegistry> {
        DriverRegistry::builder()
            .record(
                RecordSchema::reference("demo.Person|model@1")
                    .field("Name", Value::Null)
                    .field("Friend", Value::Null),
            )
            .record(RecordSchema::reference("demo.Employee").parent("demo.Person"))
            .record(RecordSchema::value("demo.Point").field("X", Value::i32(0)))
            .enumeration("demo.Color", ScalarKind::U8)
            .build()
    }

    #[test]
    fn test_builtins_resolve() {
        let registry = DriverRegistry::builtin();
        for kind in ScalarKind::ALL {
            let driver = registry.resolve(&kind.identity()).unwrap();
            assert_eq!(driver.identity(), &kind.identity());
        }
        let any = registry.resolve(&TypeIdentity::object()).unwrap();
        assert_eq!(any.shape(), Shape::Dynamic);
    }

    #[test]
    fn test_qualified_identity_shares_driver() {
        let registry = registry();
        let a = registry
            .resolve(&TypeIdentity::new("demo.Person|model@1"))
            .unwrap();
        let b = registry
            .resolve(&TypeIdentity::new("demo.Person|model@7"))
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.identity().as_str(), "demo.Person|model@1");
    }

    #[test]
    fn test_composites_memoized_once() {
        let registry = registry();
        let id = TypeIdentity::new("Map<string,List<demo.Person>>");
        let first = registry.resolve(&id).unwrap();
        let second = registry.resolve(&id).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.shape(), Shape::Reference(Registration::PreTrack));
        // The nested list was memoized along the way
        assert!(registry
            .memo
            .contains_key(&TypeIdentity::new("List<demo.Person>")));
    }

    #[test]
    fn test_concurrent_first_use_synthesizes_once() {
        let registry = registry();
        let id = TypeIdentity::new("List<demo.Color>");
        let drivers: Vec<Arc<dyn Driver>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| registry.resolve(&id).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for d in &drivers[1..] {
            assert!(Arc::ptr_eq(&drivers[0], d));
        }
    }

    #[test]
    fn test_inherited_record_chain() {
        let registry = registry();
        let driver = registry.resolve(&TypeIdentity::new("demo.Employee")).unwrap();
        let crate::driver::Versioning::SelfDescribing(layers) = driver.versioning() else {
            panic!("records are self-describing");
        };
        let names: Vec<&str> = layers.iter().map(|l| l.identity.as_str()).collect();
        assert_eq!(names, vec!["demo.Person|model@1", "demo.Employee"]);
    }

    #[test]
    fn test_resolution_failures() {
        let registry = registry();
        let cases = [
            ("demo.Unknown", "not declared"),
            ("List<i32,i32>", "takes 1 type argument"),
            ("Tuple<i32>", "unknown generic type"),
            ("List<demo.Unknown>", "not declared"),
        ];
        let before = registry.memoized();
        for (text, reason) in cases {
            let err = registry.resolve(&TypeIdentity::new(text)).unwrap_err();
            assert!(
                err.to_string().contains(reason),
                "{}: {}",
                text,
                err
            );
        }
        assert_eq!(registry.memoized(), before);
    }

    #[test]
    fn test_unresolvable_stream_identities_do_not_accumulate() {
        let registry = registry();
        let before = registry.memoized();
        for i in 0..100 {
            let junk = TypeIdentity::new(format!("junk.Type{}|build{}", i, i));
            assert!(registry.resolve(&junk).is_err());
        }
        let deep = format!("{}i32{}", "List<".repeat(10_000), ">".repeat(10_000));
        let err = registry.resolve(&TypeIdentity::new(deep)).unwrap_err();
        assert!(err.to_string().contains("nested too deeply"));
        assert_eq!(registry.memoized(), before);

        // A later success is still memoized
        registry.resolve(&TypeIdentity::new("List<i32>")).unwrap();
        assert_eq!(registry.memoized(), before + 1);
    }

    #[test]
    fn test_undeclared_parent_and_cycles() {
        let registry = DriverRegistry::builder()
            .record(RecordSchema::reference("demo.Orphan").parent("demo.Missing"))
            .record(RecordSchema::reference("demo.A").parent("demo.B"))
            .record(RecordSchema::reference("demo.B").parent("demo.A"))
            .record(RecordSchema::value("demo.V").parent("demo.A"))
            .build();
        let orphan = registry.resolve(&TypeIdentity::new("demo.Orphan")).unwrap_err();
        assert!(orphan.to_string().contains("parent 'demo.Missing' is not declared"));
        let cycle = registry.resolve(&TypeIdentity::new("demo.A")).unwrap_err();
        assert!(cycle.to_string().contains("ancestor cycle"));
        let mixed = registry.resolve(&TypeIdentity::new("demo.V")).unwrap_err();
        assert!(mixed.to_string().contains("mix reference and value records"));
    }

    #[test]
    fn test_value_record_shape() {
        let registry = registry();
        let driver = registry.resolve(&TypeIdentity::new("demo.Point")).unwrap();
        assert_eq!(driver.shape(), Shape::Value);
        assert!(registry.declares_record(&TypeIdentity::new("demo.Point|x")));
        assert!(registry.declares_enum(&TypeIdentity::new("demo.Color")));
    }
}
