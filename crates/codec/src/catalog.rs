//! Per-stream type catalog
//!
//! The first time a type appears in a stream its identity is written in
//! full, together with its version and (for self-describing types) its
//! ancestor chain. Every later occurrence is a back-reference to the
//! catalog index assigned on first sight.
//!
//! ## Entry encoding
//!
//! ```text
//! entry := 0                          end of chain / no parent
//!        | 1 version [parent]         new entry, empty identity
//!        | 2 string version [parent]  new entry, named
//!        | 3 varint                   back-reference to an earlier entry
//! version := zig-zag varint (-1 = externally versioned, no parent follows)
//! parent  := entry                    present only when version >= 0
//! ```
//!
//! Indices are assigned in the order names are registered, leaf before its
//! parents. A back-reference ends a chain: the referenced entry already
//! carries its own ancestors.

use crate::driver::{Driver, Versioning};
use crate::error::{CodecError, CodecResult, WireError};
use crate::primitives::{ByteReader, ByteWriter};
use crate::registry::DriverRegistry;
use crate::varint::{zigzag_decode, zigzag_encode};
use once_cell::unsync::OnceCell;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tessera_core::TypeIdentity;

const END: u8 = 0;
const NEW_EMPTY: u8 = 1;
const NEW_NAMED: u8 = 2;
const BACK_REF: u8 = 3;

/// Version written for externally versioned types
pub const EXTERNAL_VERSION: i32 = -1;

/// One layer of a type's ancestor chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerInfo {
    /// Layer identity
    pub identity: TypeIdentity,
    /// Layer version (-1 if externally versioned)
    pub version: i32,
}

impl LayerInfo {
    /// Create a layer description
    pub fn new(identity: impl Into<TypeIdentity>, version: i32) -> Self {
        LayerInfo {
            identity: identity.into(),
            version,
        }
    }
}

/// What a driver learns about the instance it is decoding
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// Most-derived identity as written in the stream
    pub identity: TypeIdentity,
    /// Most-derived version as written in the stream
    pub version: i32,
    /// Stream layers, root first, leaf last
    pub chain: Arc<[LayerInfo]>,
}

impl TypeInfo {
    /// Info for an externally versioned instance written without a type
    /// entry (sealed composite elements)
    pub fn external(identity: TypeIdentity) -> Self {
        let chain: Arc<[LayerInfo]> =
            Arc::from(vec![LayerInfo::new(identity.clone(), EXTERNAL_VERSION)]);
        TypeInfo {
            identity,
            version: EXTERNAL_VERSION,
            chain,
        }
    }

    /// True if the stream wrote this type with a version
    pub fn is_self_describing(&self) -> bool {
        self.version >= 0
    }
}

/// A catalog entry read from the stream
#[derive(Debug)]
pub struct CatalogEntry {
    /// Identity as written
    pub identity: TypeIdentity,
    /// Version as written
    pub version: i32,
    /// Index of the parent entry
    pub parent: Option<u32>,
    chain: OnceCell<Arc<[LayerInfo]>>,
    driver: OnceCell<Arc<dyn Driver>>,
}

/// Catalog state of a decode pass
#[derive(Debug, Default)]
pub struct ReadCatalog {
    entries: Vec<CatalogEntry>,
}

impl ReadCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries registered so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no entry was read
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Borrow an entry
    pub fn entry(&self, index: u32) -> Option<&CatalogEntry> {
        self.entries.get(index as usize)
    }

    /// Read an entry chain; `None` when the first discriminator is `0`
    pub fn read_entry(&mut self, r: &mut ByteReader<'_>) -> Result<Option<u32>, WireError> {
        // Back-references may only target entries completed before this chain
        let complete = self.entries.len();
        let mut first = None;
        let mut child: Option<usize> = None;

        loop {
            let disc = r.read_u8()?;
            let (index, continues) = match disc {
                END => (None, false),
                BACK_REF => {
                    let index = r.read_varint()?;
                    if index >= complete as u64 {
                        return Err(WireError::BadCatalogIndex {
                            index,
                            len: complete,
                        });
                    }
                    (Some(index as u32), false)
                }
                NEW_EMPTY | NEW_NAMED => {
                    let identity = if disc == NEW_EMPTY {
                        TypeIdentity::empty()
                    } else {
                        TypeIdentity::new(r.read_string()?)
                    };
                    let index = self.entries.len() as u32;
                    self.entries.push(CatalogEntry {
                        identity,
                        version: EXTERNAL_VERSION,
                        parent: None,
                        chain: OnceCell::new(),
                        driver: OnceCell::new(),
                    });
                    let raw = zigzag_decode(r.read_varint()?);
                    let version = i32::try_from(raw)
                        .ok()
                        .filter(|v| *v >= EXTERNAL_VERSION)
                        .ok_or(WireError::BadVersion(raw))?;
                    self.entries[index as usize].version = version;
                    (Some(index), version >= 0)
                }
                other => return Err(WireError::BadDiscriminator(other)),
            };

            match child {
                Some(c) => self.entries[c].parent = index,
                None => first = index,
            }
            if !continues {
                return Ok(first);
            }
            child = index.map(|i| i as usize);
        }
    }

    /// Read an entry that must be present
    pub fn read_type(&mut self, r: &mut ByteReader<'_>) -> Result<u32, WireError> {
        self.read_entry(r)?.ok_or(WireError::MissingTypeEntry)
    }

    /// Ancestor chain of an entry, root first. Materialized once per entry.
    pub fn chain(&self, index: u32) -> Arc<[LayerInfo]> {
        let Some(entry) = self.entry(index) else {
            return Arc::from(Vec::new());
        };
        entry
            .chain
            .get_or_init(|| {
                let mut layers = Vec::new();
                let mut cursor = Some(index);
                while let Some(i) = cursor {
                    let Some(e) = self.entry(i) else { break };
                    layers.push(LayerInfo::new(e.identity.clone(), e.version));
                    if layers.len() > self.entries.len() {
                        break;
                    }
                    cursor = e.parent;
                }
                layers.reverse();
                Arc::from(layers)
            })
            .clone()
    }

    /// Everything a driver needs to know about an entry
    pub fn type_info(&self, index: u32) -> Option<TypeInfo> {
        let entry = self.entry(index)?;
        Some(TypeInfo {
            identity: entry.identity.clone(),
            version: entry.version,
            chain: self.chain(index),
        })
    }

    /// Driver for an entry, resolved on first use and cached on the entry
    pub fn driver(&self, index: u32, registry: &DriverRegistry) -> CodecResult<Arc<dyn Driver>> {
        let entry = self
            .entry(index)
            .ok_or_else(|| CodecError::detached(format!("type entry {} not in catalog", index)))?;
        entry
            .driver
            .get_or_try_init(|| registry.resolve(&entry.identity))
            .cloned()
    }
}

/// Catalog state of an encode pass
#[derive(Debug, Default)]
pub struct WriteCatalog {
    indices: FxHashMap<TypeIdentity, u32>,
}

impl WriteCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries registered so far
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// True if nothing was registered
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Write the type entry for a driver
    pub fn write_type(&mut self, out: &mut ByteWriter, driver: &dyn Driver) {
        match driver.versioning() {
            Versioning::External => {
                let layer = LayerInfo::new(driver.identity().clone(), EXTERNAL_VERSION);
                self.write_layers(out, std::slice::from_ref(&layer));
            }
            Versioning::SelfDescribing(layers) => self.write_layers(out, &layers),
        }
    }

    /// Write a chain given root first; emitted leaf first
    pub fn write_layers(&mut self, out: &mut ByteWriter, layers: &[LayerInfo]) {
        for layer in layers.iter().rev() {
            if let Some(&index) = self.indices.get(&layer.identity) {
                out.write_u8(BACK_REF);
                out.write_varint(u64::from(index));
                return;
            }
            if layer.identity.is_empty() {
                out.write_u8(NEW_EMPTY);
            } else {
                out.write_u8(NEW_NAMED);
                out.write_string(layer.identity.as_str());
            }
            let index = self.indices.len() as u32;
            self.indices.insert(layer.identity.clone(), index);
            out.write_varint(zigzag_encode(i64::from(layer.version)));
            if layer.version < 0 {
                return;
            }
        }
        out.write_u8(END);
    }
}
