//! Encode pass
//!
//! An [`Encoder`] writes one rooted graph to a fresh stream. Handle
//! numbering mirrors what the decoder will do: pre-tracked objects take
//! their handle before their contents are written, directly registered
//! objects after. An object that is still being written cannot be
//! referenced unless it was pre-tracked, so a cycle through a directly
//! registered object is an encode error.

use crate::catalog::WriteCatalog;
use crate::debug::{DebugState, VALUE_TAG};
use crate::driver::{Driver, Element, Registration, Shape, Subject};
use crate::error::{CodecError, CodecResult};
use crate::header::write_header;
use crate::marker::{Marker, ModeByte};
use crate::pass::PassState;
use crate::primitives::ByteWriter;
use crate::registry::DriverRegistry;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::sync::Arc;
use tessera_core::{
    with_stack, DepthGuard, Graph, Object, ObjectId, Scalar, TypeIdentity, Value, DEFAULT_MAX_DEPTH,
};
use tracing::{debug, warn};

/// Knobs for one encode or decode pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecOptions {
    /// Write debug sentinels from the start of the stream
    pub debug: bool,
    /// Deepest nesting of values a pass accepts
    pub max_depth: usize,
}

impl CodecOptions {
    /// Options with debug sentinels on
    pub fn debug() -> Self {
        CodecOptions {
            debug: true,
            ..CodecOptions::default()
        }
    }

    /// Same options with another nesting limit
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl Default for CodecOptions {
    fn default() -> Self {
        CodecOptions {
            debug: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Single-use encode pass over one graph
#[derive(Debug)]
pub struct Encoder<'g> {
    graph: &'g Graph,
    registry: &'g DriverRegistry,
    out: ByteWriter,
    catalog: WriteCatalog,
    handles: FxHashMap<ObjectId, u32>,
    in_progress: FxHashSet<ObjectId>,
    depth: DepthGuard,
    debug: DebugState,
    pending_mode: Option<bool>,
    state: PassState,
    options: CodecOptions,
}

impl<'g> Encoder<'g> {
    /// Prepare a pass over `graph`
    pub fn new(graph: &'g Graph, registry: &'g DriverRegistry, options: CodecOptions) -> Self {
        Encoder {
            graph,
            registry,
            out: ByteWriter::new(),
            catalog: WriteCatalog::new(),
            handles: FxHashMap::default(),
            in_progress: FxHashSet::default(),
            depth: DepthGuard::new(options.max_depth),
            debug: DebugState::default(),
            pending_mode: None,
            state: PassState::Idle,
            options,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> PassState {
        self.state
    }

    /// Graph being written
    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    /// Write `root` and return the finished stream. An encoder runs at
    /// most once.
    pub fn run(&mut self, root: &Value) -> CodecResult<Vec<u8>> {
        if self.state != PassState::Idle {
            return Err(CodecError::PassState {
                expected: PassState::Idle.name(),
                actual: self.state.name(),
            });
        }
        match self.run_pass(root) {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                warn!(target: "tessera::codec", error = %e, "Encode pass failed");
                self.state = PassState::Failed;
                Err(e)
            }
        }
    }

    fn run_pass(&mut self, root: &Value) -> CodecResult<Vec<u8>> {
        debug!(
            target: "tessera::codec",
            objects = self.graph.len(),
            debug = self.options.debug,
            "Encode pass started"
        );
        self.state.advance(PassState::WritingHeader)?;
        write_header(&mut self.out, self.options.debug);
        self.debug = DebugState::new(self.options.debug);

        self.state.advance(PassState::EncodingMainPass)?;
        self.write_value(root)?;

        self.state.advance(PassState::Done)?;
        let bytes = std::mem::take(&mut self.out).into_inner();
        debug!(
            target: "tessera::codec",
            bytes = bytes.len(),
            objects = self.handles.len(),
            type_entries = self.catalog.len(),
            "Encode pass finished"
        );
        Ok(bytes)
    }

    // ========================================================================
    // Values
    // ========================================================================

    /// Write one marker-prefixed value
    pub fn write_value(&mut self, value: &Value) -> CodecResult<()> {
        self.nested(|e| e.write_framed(value))
    }

    /// Run one nesting level of the walk on a stack with room to spare
    fn nested(&mut self, step: impl FnOnce(&mut Self) -> CodecResult<()>) -> CodecResult<()> {
        if !self.depth.enter() {
            return Err(CodecError::encode(format!(
                "values nested deeper than the limit of {}",
                self.depth.max()
            )));
        }
        let result = with_stack(|| step(self));
        self.depth.leave();
        result
    }

    fn write_framed(&mut self, value: &Value) -> CodecResult<()> {
        self.emit_mode();
        self.debug.write(&mut self.out, VALUE_TAG);
        match value {
            Value::Null => {
                self.out.write_u8(Marker::Null.to_byte());
                Ok(())
            }
            Value::Scalar(s) => match Marker::for_scalar(s.kind()) {
                Some(marker) => {
                    self.out.write_u8(marker.to_byte());
                    self.out.write_scalar(s);
                    Ok(())
                }
                None => self.write_struct(&s.kind().identity(), value),
            },
            Value::Enum(e) => self.write_struct(&e.type_id, value),
            Value::Struct(s) => self.write_struct(&s.type_id, value),
            Value::Ref(id) => self.write_object(*id),
        }
    }

    fn write_struct(&mut self, identity: &TypeIdentity, value: &Value) -> CodecResult<()> {
        let driver = self.registry.resolve(identity)?;
        if driver.shape() != Shape::Value {
            return Err(CodecError::encode(format!(
                "type '{}' is not a value type",
                identity
            )));
        }
        self.out.write_u8(Marker::Struct.to_byte());
        self.catalog.write_type(&mut self.out, driver.as_ref());
        driver.encode(self, Subject::Value(value))
    }

    fn write_object(&mut self, id: ObjectId) -> CodecResult<()> {
        if let Some(&handle) = self.handles.get(&id) {
            self.out.write_u8(Marker::Reference.to_byte());
            self.out.write_varint(u64::from(handle));
            return Ok(());
        }
        if self.in_progress.contains(&id) {
            return Err(CodecError::encode(format!(
                "cycle through directly registered object {}",
                id
            )));
        }

        let graph = self.graph;
        let object = graph.get(id)?;
        let identity = match object {
            Object::Pending => {
                return Err(CodecError::encode(format!("object {} is pending", id)));
            }
            Object::Empty => {
                self.out.write_u8(Marker::EmptyObject.to_byte());
                self.track(id);
                return Ok(());
            }
            other => other
                .type_identity()
                .ok_or_else(|| CodecError::encode(format!("object {} has no type", id)))?,
        };

        let driver: Arc<dyn Driver> = self.registry.resolve(&identity)?;
        let Shape::Reference(registration) = driver.shape() else {
            return Err(CodecError::encode(format!(
                "type '{}' of object {} is not a reference type",
                identity, id
            )));
        };

        self.out.write_u8(Marker::Object.to_byte());
        self.catalog.write_type(&mut self.out, driver.as_ref());
        match registration {
            Registration::PreTrack => {
                self.track(id);
                driver.encode(self, Subject::Object(id, object))
            }
            Registration::Direct => {
                self.in_progress.insert(id);
                driver.encode(self, Subject::Object(id, object))?;
                self.in_progress.remove(&id);
                self.track(id);
                Ok(())
            }
        }
    }

    fn track(&mut self, id: ObjectId) {
        let handle = self.handles.len() as u32;
        self.handles.insert(id, handle);
    }

    /// Write one composite element: naked for sealed drivers, a full value
    /// otherwise
    pub fn write_element(&mut self, element: &Element, value: &Value) -> CodecResult<()> {
        if element.sealed {
            self.nested(|e| element.driver.encode(e, Subject::Value(value)))
        } else {
            self.write_value(value)
        }
    }

    // ========================================================================
    // Primitives
    // ========================================================================

    /// Scalar payload without a marker
    pub fn write_scalar(&mut self, scalar: &Scalar) {
        self.out.write_scalar(scalar);
    }

    /// Single byte
    pub fn write_u8(&mut self, v: u8) {
        self.out.write_u8(v);
    }

    /// Unsigned varint
    pub fn write_varint(&mut self, v: u64) {
        self.out.write_varint(v);
    }

    /// Length-prefixed UTF-8
    pub fn write_string(&mut self, s: &str) {
        self.out.write_string(s);
    }

    /// Element count
    pub fn write_count(&mut self, count: usize) {
        self.out.write_varint(count as u64);
    }

    /// Bytes written so far
    pub fn position(&self) -> usize {
        self.out.len()
    }

    // ========================================================================
    // Debug
    // ========================================================================

    /// Write a driver checkpoint; a no-op outside debug mode
    pub fn checkpoint(&mut self, tag: impl fmt::Display) {
        if self.debug.active {
            let tag = tag.to_string();
            self.debug.write(&mut self.out, &tag);
        }
    }

    /// Switch debug mode. The mode byte is written in front of the next
    /// value.
    pub fn set_debug(&mut self, active: bool) {
        self.pending_mode = Some(active);
    }

    /// True while sentinels are being written
    pub fn debug_active(&self) -> bool {
        self.pending_mode.unwrap_or(self.debug.active)
    }

    fn emit_mode(&mut self) {
        let Some(target) = self.pending_mode.take() else {
            return;
        };
        let mode = match (self.debug.active, target) {
            (false, true) => ModeByte::EnterDebug,
            (true, false) => ModeByte::ExitDebug,
            _ => ModeByte::NoChange,
        };
        self.out.write_u8(mode.to_byte());
        self.debug.active = mode.apply(self.debug.active);
    }
}
