//! Nesting limits for graph walks
//!
//! Encoding, decoding and export recurse once per nested value, so a long
//! chain of objects reached only through each other nests as deeply as it is
//! long. Walks run their recursive step through [`with_stack`], which moves
//! onto a fresh heap-allocated stack segment when the current one runs low,
//! and stop with an error past their configured depth.

/// Default maximum nesting depth of values in one walk
pub const DEFAULT_MAX_DEPTH: usize = 16_384;

/// Maximum nesting of generic arguments in a type identity
pub const MAX_GENERIC_DEPTH: usize = 64;

/// Stack left before a new segment is allocated
const RED_ZONE: usize = 128 * 1024;

/// Size of each new stack segment
const STACK_SEGMENT: usize = 2 * 1024 * 1024;

/// Run one recursive step, growing the stack first if it is nearly exhausted
#[inline]
pub fn with_stack<R>(step: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_SEGMENT, step)
}

/// Depth counter for one walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthGuard {
    depth: usize,
    max: usize,
}

impl DepthGuard {
    /// Counter starting at depth 0 that allows `max` nested levels
    pub fn new(max: usize) -> Self {
        DepthGuard { depth: 0, max }
    }

    /// Current depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Configured limit
    pub fn max(&self) -> usize {
        self.max
    }

    /// Enter one level; `false` once the limit would be exceeded
    pub fn enter(&mut self) -> bool {
        if self.depth >= self.max {
            return false;
        }
        self.depth += 1;
        true
    }

    /// Leave the level entered last
    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

impl Default for DepthGuard {
    fn default() -> Self {
        DepthGuard::new(DEFAULT_MAX_DEPTH)
    }
}
