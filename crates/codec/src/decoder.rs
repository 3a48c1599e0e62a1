//! Decode pass
//!
//! A [`Decoder`] reads exactly one stream into a fresh [`Graph`]. It owns
//! the per-pass state (type catalog, reference table, deferred queue, debug
//! counters and breadcrumbs) and hands drivers a narrow API for reading
//! their content.
//!
//! ## Pre-tracked objects
//!
//! ```text
//! handle = table.reserve()      next handle, slot Reserved
//! id     = graph.reserve()      pending arena slot
//! table.bind(handle, id)        contents may now refer back to `id`
//! driver.decode(.., Some(id))   read contents
//! graph.complete(id, object)
//! ```
//!
//! Directly registered objects are decoded first and tracked afterwards, so
//! a reference to them from inside their own contents is out of range.

use crate::catalog::{ReadCatalog, TypeInfo};
use crate::debug::{Breadcrumbs, Crumb, DebugState, VALUE_TAG};
use crate::driver::{Driver, Element, Registration, Shape};
use crate::encoder::CodecOptions;
use crate::error::{CodecError, CodecResult, CorruptionReport, DesyncReport, WireError};
use crate::header::read_header;
use crate::marker::{Marker, ModeByte};
use crate::pass::PassState;
use crate::primitives::ByteReader;
use crate::reference::{DeferredQueue, ReferenceTable};
use crate::registry::DriverRegistry;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;
use tessera_core::{with_stack, DepthGuard, Graph, Object, Scalar, ScalarKind, Value};
use tracing::{debug, warn};

/// Counters describing a finished pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Stream length in bytes
    pub bytes: usize,
    /// Objects tracked in the reference table
    pub objects: usize,
    /// Type catalog entries
    pub type_entries: usize,
    /// Deferred actions run after the main pass
    pub deferred_actions: usize,
    /// Debug sentinels verified
    pub checkpoints: u64,
}

/// Output of a successful decode
#[derive(Debug)]
pub struct DecodedGraph {
    /// Every reference-typed object read
    pub graph: Graph,
    /// The root value
    pub root: Value,
    /// Pass counters
    pub stats: PassStats,
}

/// Single-use decode pass over one stream
#[derive(Debug)]
pub struct Decoder<'a> {
    reader: ByteReader<'a>,
    registry: &'a DriverRegistry,
    catalog: ReadCatalog,
    table: ReferenceTable,
    deferred: DeferredQueue,
    graph: Graph,
    depth: DepthGuard,
    debug: DebugState,
    crumbs: Breadcrumbs,
    state: PassState,
}

impl<'a> Decoder<'a> {
    /// Prepare a pass over `bytes` with default options
    pub fn new(bytes: &'a [u8], registry: &'a DriverRegistry) -> Self {
        Self::with_options(bytes, registry, CodecOptions::default())
    }

    /// Prepare a pass over `bytes`. Debug mode is taken from the stream;
    /// only the nesting limit of `options` applies.
    pub fn with_options(
        bytes: &'a [u8],
        registry: &'a DriverRegistry,
        options: CodecOptions,
    ) -> Self {
        Decoder {
            reader: ByteReader::new(bytes),
            registry,
            catalog: ReadCatalog::new(),
            table: ReferenceTable::new(),
            deferred: DeferredQueue::new(),
            graph: Graph::new(),
            depth: DepthGuard::new(options.max_depth),
            debug: DebugState::default(),
            crumbs: Breadcrumbs::new(),
            state: PassState::Idle,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> PassState {
        self.state
    }

    /// Registry drivers are resolved from
    pub fn registry(&self) -> &DriverRegistry {
        self.registry
    }

    /// Run the pass. A decoder runs at most once.
    pub fn run(&mut self) -> CodecResult<DecodedGraph> {
        if self.state != PassState::Idle {
            return Err(CodecError::PassState {
                expected: PassState::Idle.name(),
                actual: self.state.name(),
            });
        }
        let result = self.run_pass();
        if let Err(e) = &result {
            warn!(
                target: "tessera::codec",
                state = self.state.name(),
                offset = self.reader.position(),
                error = %e,
                "Decode pass failed"
            );
            self.state = PassState::Failed;
        }
        result
    }

    fn run_pass(&mut self) -> CodecResult<DecodedGraph> {
        let bytes = self.reader.remaining();
        debug!(target: "tessera::codec", bytes, "Decode pass started");

        self.state.advance(PassState::ReadingHeader)?;
        let header = read_header(&mut self.reader);
        let header = header.map_err(|e| self.corruption(e.to_string()))?;
        self.debug = DebugState::new(header.debug);

        self.state.advance(PassState::DecodingMainPass)?;
        let root = self.read_value()?;
        if !self.reader.is_at_end() {
            return Err(self.corruption(format!(
                "{} trailing bytes after the root value",
                self.reader.remaining()
            )));
        }

        self.state.advance(PassState::DrainingDeferred)?;
        let queue = std::mem::take(&mut self.deferred);
        let drained = queue.drain(&mut self.graph);
        let deferred_actions = drained.map_err(|e| self.contextualize(e))?;

        if let Some(handle) = self.table.unbound().next() {
            return Err(self.corruption(format!(
                "reference handle {} was reserved but never bound",
                handle
            )));
        }
        if let Some(id) = self.graph.pending().next() {
            return Err(self.corruption(format!("object {} was never completed", id)));
        }

        self.state.advance(PassState::Done)?;
        let stats = PassStats {
            bytes,
            objects: self.table.len(),
            type_entries: self.catalog.len(),
            deferred_actions,
            checkpoints: self.debug.counter,
        };
        debug!(
            target: "tessera::codec",
            bytes = stats.bytes,
            objects = stats.objects,
            type_entries = stats.type_entries,
            deferred = stats.deferred_actions,
            "Decode pass finished"
        );
        Ok(DecodedGraph {
            graph: std::mem::take(&mut self.graph),
            root,
            stats,
        })
    }

    // ========================================================================
    // Values
    // ========================================================================

    /// Read one marker-prefixed value, with its optional mode byte and
    /// debug sentinel
    pub fn read_value(&mut self) -> CodecResult<Value> {
        self.nested(|d| d.read_framed())
    }

    /// Run one nesting level of the pass on a stack with room to spare
    fn nested(&mut self, step: impl FnOnce(&mut Self) -> CodecResult<Value>) -> CodecResult<Value> {
        if !self.depth.enter() {
            return Err(self.corruption(format!(
                "values nested deeper than the limit of {}",
                self.depth.max()
            )));
        }
        let result = with_stack(|| step(self));
        self.depth.leave();
        result
    }

    fn read_framed(&mut self) -> CodecResult<Value> {
        if let Some(mode) = self.reader.peek_u8().and_then(ModeByte::from_byte) {
            self.wire(|r| r.read_u8())?;
            self.debug.active = mode.apply(self.debug.active);
        }
        self.checkpoint(VALUE_TAG)?;

        let byte = self.wire(|r| r.read_u8())?;
        let Some(marker) = Marker::from_byte(byte) else {
            return Err(self.corruption(format!("unknown marker byte {}", byte)));
        };
        match marker {
            Marker::Null => Ok(Value::Null),
            Marker::String => self.read_inline(ScalarKind::String),
            Marker::Int32 => self.read_inline(ScalarKind::I32),
            Marker::Double => self.read_inline(ScalarKind::F64),
            Marker::Char => self.read_inline(ScalarKind::Char),
            Marker::Boolean => self.read_inline(ScalarKind::Bool),
            Marker::UInt32 => self.read_inline(ScalarKind::U32),
            Marker::Float => self.read_inline(ScalarKind::F32),
            Marker::DateTime => self.read_inline(ScalarKind::DateTime),
            Marker::Guid => self.read_inline(ScalarKind::Guid),
            Marker::TimeSpan => self.read_inline(ScalarKind::TimeSpan),
            Marker::DateTimeOffset => self.read_inline(ScalarKind::DateTimeOffset),
            Marker::Reference => {
                let handle = self.wire(|r| r.read_varint_u32())?;
                let resolved = self.table.resolve(handle);
                let id = resolved.map_err(|e| self.corruption(e.to_string()))?;
                Ok(Value::Ref(id))
            }
            Marker::EmptyObject => {
                let id = self.graph.insert(Object::Empty);
                self.table.push_bound(id);
                Ok(Value::Ref(id))
            }
            Marker::Object => self.read_object(),
            Marker::Struct => self.read_struct(),
        }
    }

    fn read_inline(&mut self, kind: ScalarKind) -> CodecResult<Value> {
        Ok(Value::Scalar(self.read_scalar(kind)?))
    }

    fn read_type_entry(&mut self) -> CodecResult<(Arc<dyn Driver>, TypeInfo)> {
        let entry = self.catalog.read_type(&mut self.reader);
        let index = self.lift(entry)?;
        let driver = self.catalog.driver(index, self.registry)?;
        let Some(info) = self.catalog.type_info(index) else {
            return Err(self.corruption(format!("type entry {} not in catalog", index)));
        };
        Ok((driver, info))
    }

    fn read_object(&mut self) -> CodecResult<Value> {
        let (driver, info) = self.read_type_entry()?;
        let registration = match driver.shape() {
            Shape::Reference(registration) => registration,
            other => {
                return Err(self.corruption(format!(
                    "type '{}' has {:?} shape and cannot appear under the Object marker",
                    info.identity, other
                )))
            }
        };

        self.crumbs.enter(Crumb::Type(info.identity.clone()));
        let id = match registration {
            Registration::PreTrack => {
                let handle = self.table.reserve();
                let id = self.graph.reserve();
                let bound = self.table.bind(handle, id);
                bound.map_err(|e| self.corruption(e.to_string()))?;
                let object = driver
                    .decode(self, &info, Some(id))?
                    .into_object(driver.identity())?;
                self.graph.complete(id, object)?;
                id
            }
            Registration::Direct => {
                let object = driver
                    .decode(self, &info, None)?
                    .into_object(driver.identity())?;
                let id = self.graph.insert(object);
                self.table.push_bound(id);
                id
            }
        };
        self.crumbs.leave();
        Ok(Value::Ref(id))
    }

    fn read_struct(&mut self) -> CodecResult<Value> {
        let (driver, info) = self.read_type_entry()?;
        if driver.shape() != Shape::Value {
            return Err(self.corruption(format!(
                "type '{}' has {:?} shape and cannot appear under the Struct marker",
                info.identity,
                driver.shape()
            )));
        }
        self.crumbs.enter(Crumb::Type(info.identity.clone()));
        let value = driver
            .decode(self, &info, None)?
            .into_value(driver.identity())?;
        self.crumbs.leave();
        Ok(value)
    }

    /// Read one composite element: naked for sealed drivers, a full value
    /// otherwise
    pub fn read_element(&mut self, element: &Element) -> CodecResult<Value> {
        if element.sealed {
            self.nested(|d| {
                element
                    .driver
                    .decode(d, &element.info, None)?
                    .into_value(element.identity())
            })
        } else {
            self.read_value()
        }
    }

    // ========================================================================
    // Primitives
    // ========================================================================

    /// Scalar payload of `kind` without a marker
    #[track_caller]
    pub fn read_scalar(&mut self, kind: ScalarKind) -> CodecResult<Scalar> {
        self.wire(|r| r.read_scalar(kind))
    }

    /// Single byte
    #[track_caller]
    pub fn read_u8(&mut self) -> CodecResult<u8> {
        self.wire(|r| r.read_u8())
    }

    /// Unsigned varint
    #[track_caller]
    pub fn read_varint(&mut self) -> CodecResult<u64> {
        self.wire(|r| r.read_varint())
    }

    /// Length-prefixed UTF-8
    #[track_caller]
    pub fn read_string(&mut self) -> CodecResult<String> {
        self.wire(|r| r.read_string())
    }

    /// Element count; larger than the bytes left is corruption since every
    /// element takes at least one byte
    #[track_caller]
    pub fn read_count(&mut self) -> CodecResult<usize> {
        let count = self.wire(|r| r.read_varint())?;
        let remaining = self.reader.remaining();
        if count > remaining as u64 {
            return Err(self.corruption(format!(
                "element count {} exceeds the {} bytes left",
                count, remaining
            )));
        }
        Ok(count as usize)
    }

    /// Bytes left in the stream
    pub fn remaining(&self) -> usize {
        self.reader.remaining()
    }

    /// Current byte offset
    pub fn position(&self) -> u64 {
        self.reader.position()
    }

    // ========================================================================
    // Debug, breadcrumbs, deferred work
    // ========================================================================

    /// Verify a driver checkpoint; a no-op outside debug mode
    pub fn checkpoint(&mut self, tag: impl fmt::Display) -> CodecResult<()> {
        if !self.debug.active {
            return Ok(());
        }
        let tag = tag.to_string();
        let offset = self.reader.position();
        let expected_counter = self.debug.counter;
        let last_verified = self.debug.last_tag.clone();
        match self.debug.verify(&mut self.reader, &tag) {
            Ok(()) => Ok(()),
            Err((found_counter, found_tag)) => {
                let report = DesyncReport {
                    expected_counter,
                    expected_tag: tag,
                    found_counter,
                    found_tag,
                    last_verified,
                    breadcrumbs: self.crumbs.render(),
                    offset,
                };
                warn!(target: "tessera::codec", %report, "Debug sentinel mismatch");
                Err(CodecError::Desync(Box::new(report)))
            }
        }
    }

    /// True while sentinels are expected
    pub fn debug_active(&self) -> bool {
        self.debug.active
    }

    /// Descend into a named part of the instance being decoded
    pub fn enter(&mut self, crumb: Crumb) {
        self.crumbs.enter(crumb);
    }

    /// Leave the part entered last
    pub fn leave(&mut self) {
        self.crumbs.leave();
    }

    /// Queue work that must run after the main pass
    pub fn defer(&mut self, action: impl FnOnce(&mut Graph) -> CodecResult<()> + 'static) {
        self.deferred.push(Box::new(action));
    }

    // ========================================================================
    // Errors
    // ========================================================================

    /// Corruption error carrying this pass's context
    #[track_caller]
    pub fn corruption(&self, detail: impl Into<String>) -> CodecError {
        let report = CorruptionReport {
            detail: detail.into(),
            offset: self.reader.position(),
            objects: self.table.len(),
            breadcrumbs: self.crumbs.render(),
            location: Location::caller(),
        };
        warn!(
            target: "tessera::codec",
            offset = report.offset,
            detail = %report.detail,
            "Stream corruption detected"
        );
        CodecError::Corruption(Box::new(report))
    }

    #[track_caller]
    fn lift<T>(&self, result: Result<T, WireError>) -> CodecResult<T> {
        match result {
            Ok(v) => Ok(v),
            Err(e) => Err(self.corruption(e.to_string())),
        }
    }

    #[track_caller]
    fn wire<T>(
        &mut self,
        read: impl FnOnce(&mut ByteReader<'a>) -> Result<T, WireError>,
    ) -> CodecResult<T> {
        let result = read(&mut self.reader);
        self.lift(result)
    }

    fn contextualize(&self, error: CodecError) -> CodecError {
        match error {
            CodecError::Corruption(report) => {
                let mut crumbs = self.crumbs.render();
                crumbs.push("deferred".to_string());
                CodecError::Corruption(Box::new(report.with_context(
                    self.reader.position(),
                    self.table.len(),
                    crumbs,
                )))
            }
            other => other,
        }
    }
}
