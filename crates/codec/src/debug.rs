//! Debug sentinels and breadcrumbs
//!
//! While debug mode is active the encoder writes a sentinel before every
//! value and at every checkpoint a driver asks for:
//!
//! ```text
//! [Magic: i32 LE 987654321]
//! [Counter: varint]   starts at 0, +1 per sentinel
//! [Tag: string]       "value" or "Layer.field"
//! ```
//!
//! The decoder checks magic, counter and tag at the same points. The first
//! mismatch is reported with the last sentinel that did verify, which puts
//! the divergence between two known-good positions.

use crate::primitives::{ByteReader, ByteWriter};
use std::sync::Arc;
use tessera_core::TypeIdentity;

/// Sentinel magic
pub const SENTINEL_MAGIC: i32 = 987_654_321;

/// Tag of the sentinel written before every value
pub const VALUE_TAG: &str = "value";

/// Debug state shared by both pass directions
#[derive(Debug, Clone, Default)]
pub struct DebugState {
    /// Sentinels are being written / expected
    pub active: bool,
    /// Next sentinel counter
    pub counter: u64,
    /// Tag of the last sentinel written or verified
    pub last_tag: Option<String>,
}

impl DebugState {
    /// State for a pass starting in `active` mode
    pub fn new(active: bool) -> Self {
        DebugState {
            active,
            ..Self::default()
        }
    }

    /// Write a sentinel if active
    pub fn write(&mut self, out: &mut ByteWriter, tag: &str) {
        if !self.active {
            return;
        }
        out.write_i32(SENTINEL_MAGIC);
        out.write_varint(self.counter);
        out.write_string(tag);
        self.counter += 1;
        self.last_tag = Some(tag.to_string());
    }

    /// Read the next sentinel and compare it with what is expected.
    ///
    /// Returns `Err((found_counter, found_tag))` on mismatch; both are
    /// `None` if the magic itself did not match.
    pub fn verify(
        &mut self,
        r: &mut ByteReader<'_>,
        tag: &str,
    ) -> Result<(), (Option<u64>, Option<String>)> {
        let magic = r.read_i32().map_err(|_| (None, None))?;
        if magic != SENTINEL_MAGIC {
            return Err((None, None));
        }
        let counter = r.read_varint().map_err(|_| (None, None))?;
        let found = r.read_string().map_err(|_| (Some(counter), None))?;
        if counter != self.counter || found != tag {
            return Err((Some(counter), Some(found)));
        }
        self.counter += 1;
        self.last_tag = Some(found);
        Ok(())
    }
}

/// One step of the path being decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Crumb {
    /// Entered an instance of a type
    Type(TypeIdentity),
    /// Entered a named field
    Field(Arc<str>),
    /// Entered a composite element
    Index(usize),
}

/// Path of types, fields and indices currently being decoded
#[derive(Debug, Clone, Default)]
pub struct Breadcrumbs {
    stack: Vec<Crumb>,
}

impl Breadcrumbs {
    /// Empty path
    pub fn new() -> Self {
        Self::default()
    }

    /// Descend
    pub fn enter(&mut self, crumb: Crumb) {
        self.stack.push(crumb);
    }

    /// Ascend
    pub fn leave(&mut self) {
        self.stack.pop();
    }

    /// Depth of the path
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Render the path, outermost first. Deep paths keep their outermost
    /// and innermost crumbs around a count of the elided middle.
    pub fn render(&self) -> Vec<String> {
        let render = |crumb: &Crumb| match crumb {
            Crumb::Type(id) => id.to_string(),
            Crumb::Field(name) => name.to_string(),
            Crumb::Index(i) => format!("[{}]", i),
        };
        if self.stack.len() <= RENDER_HEAD + RENDER_TAIL {
            return self.stack.iter().map(render).collect();
        }
        let elided = self.stack.len() - RENDER_HEAD - RENDER_TAIL;
        let mut out: Vec<String> = self.stack[..RENDER_HEAD].iter().map(render).collect();
        out.push(format!("... {} more", elided));
        out.extend(self.stack[self.stack.len() - RENDER_TAIL..].iter().map(render));
        out
    }
}

const RENDER_HEAD: usize = 8;
const RENDER_TAIL: usize = 24;
