//! Stream inspection without a registry
//!
//! Reads the header and the root value's framing (marker and type entry
//! chain) so tools can tell what a stream holds before deciding how to
//! decode it. No driver is resolved and no content is read.

use crate::catalog::{LayerInfo, ReadCatalog};
use crate::debug::{DebugState, VALUE_TAG};
use crate::error::{CodecError, CodecResult};
use crate::header::read_header;
use crate::marker::{Marker, ModeByte};
use crate::primitives::ByteReader;
use std::sync::Arc;
use tessera_core::ScalarKind;

/// Framing of the root value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootSummary {
    /// `Null` marker
    Null,
    /// Inline scalar
    Scalar(ScalarKind),
    /// `EmptyObject` marker
    EmptyObject,
    /// Reference-typed object, with its stream chain root first
    Object(Arc<[LayerInfo]>),
    /// Value-typed instance, with its stream chain root first
    Struct(Arc<[LayerInfo]>),
}

/// What [`inspect`] learned about a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    /// Header format version
    pub format_version: u16,
    /// Debug mode at the root value
    pub debug: bool,
    /// Root framing
    pub root: RootSummary,
}

/// Read the header and root framing of `bytes`
pub fn inspect(bytes: &[u8]) -> CodecResult<StreamSummary> {
    let mut r = ByteReader::new(bytes);
    let header = read_header(&mut r).map_err(|e| CodecError::detached(e.to_string()))?;
    let mut debug = DebugState::new(header.debug);

    if let Some(mode) = r.peek_u8().and_then(ModeByte::from_byte) {
        r.read_u8().map_err(wire)?;
        debug.active = mode.apply(debug.active);
    }
    if debug.active {
        debug
            .verify(&mut r, VALUE_TAG)
            .map_err(|_| CodecError::detached("root sentinel does not verify"))?;
    }

    let byte = r.read_u8().map_err(wire)?;
    let marker = Marker::from_byte(byte)
        .ok_or_else(|| CodecError::detached(format!("unknown marker byte {}", byte)))?;
    let root = match marker {
        Marker::Null => RootSummary::Null,
        Marker::EmptyObject => RootSummary::EmptyObject,
        Marker::Reference => {
            return Err(CodecError::detached("root value is a back-reference"));
        }
        Marker::Object | Marker::Struct => {
            let mut catalog = ReadCatalog::new();
            let index = catalog.read_type(&mut r).map_err(wire)?;
            let chain = catalog.chain(index);
            if marker == Marker::Object {
                RootSummary::Object(chain)
            } else {
                RootSummary::Struct(chain)
            }
        }
        inline => match inline.scalar_kind() {
            Some(kind) => RootSummary::Scalar(kind),
            None => return Err(CodecError::detached(format!("marker {:?} has no kind", inline))),
        },
    };

    Ok(StreamSummary {
        format_version: header.format_version,
        debug: debug.active,
        root,
    })
}

fn wire(e: crate::error::WireError) -> CodecError {
    CodecError::detached(e.to_string())
}
