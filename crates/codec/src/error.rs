//! Codec error types
//!
//! Every fatal decode problem carries enough context to locate it: the byte
//! offset, how many objects were tracked when it happened, the breadcrumb
//! path of types and fields being decoded, and the source location of the
//! check that fired. Reports are boxed so `CodecResult` stays small on the
//! happy path.

use std::fmt;
use std::panic::Location;
use tessera_core::GraphError;
use thiserror::Error;

/// Result type alias for codec operations
pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// Errors raised by encode, decode and driver resolution
#[derive(Debug, Error)]
pub enum CodecError {
    /// The stream violates the wire format
    #[error("{0}")]
    Corruption(Box<CorruptionReport>),

    /// A debug sentinel did not match what the decoder expected
    #[error("{0}")]
    Desync(Box<DesyncReport>),

    /// No driver could be found or synthesized for a type
    #[error("Cannot resolve driver for '{identity}': {reason}")]
    Resolution {
        /// Identity that failed to resolve
        identity: String,
        /// Why resolution failed
        reason: String,
    },

    /// A pass was used outside its legal lifecycle
    #[error("Invalid pass state: expected {expected}, found {actual}")]
    PassState {
        /// State the operation requires
        expected: &'static str,
        /// State the pass is in
        actual: &'static str,
    },

    /// The graph cannot be written
    #[error("Encode error: {0}")]
    Encode(String),

    /// A driver returned something its shape does not allow
    #[error("Driver for '{identity}' broke its contract: {detail}")]
    DriverContract {
        /// Driver identity
        identity: String,
        /// What went wrong
        detail: String,
    },

    /// Graph access failed
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
}

impl CodecError {
    /// Create an encode error
    pub fn encode(msg: impl Into<String>) -> Self {
        CodecError::Encode(msg.into())
    }

    /// Create a resolution error
    pub fn resolution(identity: impl fmt::Display, reason: impl Into<String>) -> Self {
        CodecError::Resolution {
            identity: identity.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a driver contract error
    pub fn contract(identity: impl fmt::Display, detail: impl Into<String>) -> Self {
        CodecError::DriverContract {
            identity: identity.to_string(),
            detail: detail.into(),
        }
    }

    /// Corruption detected outside a decoder (no offset or breadcrumbs yet)
    #[track_caller]
    pub fn detached(detail: impl Into<String>) -> Self {
        CodecError::Corruption(Box::new(CorruptionReport {
            detail: detail.into(),
            offset: 0,
            objects: 0,
            breadcrumbs: Vec::new(),
            location: Location::caller(),
        }))
    }

    /// True for corruption and desync errors
    pub fn is_corruption(&self) -> bool {
        matches!(self, CodecError::Corruption(_) | CodecError::Desync(_))
    }

    /// Corruption report, if this is a corruption error
    pub fn corruption_report(&self) -> Option<&CorruptionReport> {
        match self {
            CodecError::Corruption(report) => Some(report),
            _ => None,
        }
    }

    /// Desync report, if this is a sentinel mismatch
    pub fn desync_report(&self) -> Option<&DesyncReport> {
        match self {
            CodecError::Desync(report) => Some(report),
            _ => None,
        }
    }
}

/// Context of a wire-format violation
#[derive(Debug, Clone)]
pub struct CorruptionReport {
    /// What was wrong
    pub detail: String,
    /// Byte offset at which the problem was detected
    pub offset: u64,
    /// Objects tracked in the reference table at that point
    pub objects: usize,
    /// Types and fields being decoded, outermost first
    pub breadcrumbs: Vec<String>,
    /// Source location of the check that fired
    pub location: &'static Location<'static>,
}

impl CorruptionReport {
    /// Fill in decoder context on a report created without it
    pub fn with_context(mut self, offset: u64, objects: usize, breadcrumbs: Vec<String>) -> Self {
        self.offset = offset;
        self.objects = objects;
        self.breadcrumbs = breadcrumbs;
        self
    }
}

impl fmt::Display for CorruptionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stream corruption at byte {}: {} (objects tracked: {}",
            self.offset, self.detail, self.objects
        )?;
        if !self.breadcrumbs.is_empty() {
            write!(f, ", path: {}", self.breadcrumbs.join(" > "))?;
        }
        write!(
            f,
            ", detected at {}:{})",
            self.location.file(),
            self.location.line()
        )
    }
}

/// Context of a debug sentinel mismatch
#[derive(Debug, Clone)]
pub struct DesyncReport {
    /// Counter the decoder expected
    pub expected_counter: u64,
    /// Tag the decoder expected
    pub expected_tag: String,
    /// Counter found in the stream, if the magic matched
    pub found_counter: Option<u64>,
    /// Tag found in the stream, if the magic matched
    pub found_tag: Option<String>,
    /// Tag of the last sentinel that verified
    pub last_verified: Option<String>,
    /// Types and fields being decoded, outermost first
    pub breadcrumbs: Vec<String>,
    /// Byte offset of the sentinel
    pub offset: u64,
}

impl fmt::Display for DesyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stream desync at byte {}: expected checkpoint #{} '{}'",
            self.offset, self.expected_counter, self.expected_tag
        )?;
        match (&self.found_counter, &self.found_tag) {
            (Some(counter), Some(tag)) => write!(f, ", found #{} '{}'", counter, tag)?,
            _ => write!(f, ", found no sentinel")?,
        }
        match &self.last_verified {
            Some(tag) => write!(f, " (last verified '{}'", tag)?,
            None => write!(f, " (nothing verified yet")?,
        }
        if !self.breadcrumbs.is_empty() {
            write!(f, ", path: {}", self.breadcrumbs.join(" > "))?;
        }
        write!(f, ")")
    }
}

/// Low-level wire violations, reported without decoder context.
///
/// The decoder lifts these into [`CodecError::Corruption`] with the offset
/// and breadcrumbs it knows about.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Fewer bytes left than the value needs
    #[error("unexpected end of stream: wanted {wanted} bytes, {available} available")]
    UnexpectedEnd {
        /// Bytes needed
        wanted: usize,
        /// Bytes left
        available: usize,
    },

    /// Varint longer than 64 bits
    #[error("varint overflows 64 bits")]
    VarintOverflow,

    /// Varint value does not fit the target width
    #[error("varint value {0} out of range")]
    VarintRange(u64),

    /// String payload is not UTF-8
    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,

    /// Char payload is not a Unicode scalar value
    #[error("invalid char scalar value {0:#x}")]
    InvalidChar(u32),

    /// Boolean byte other than 0 or 1
    #[error("invalid boolean byte {0}")]
    InvalidBool(u8),

    /// Date-time or duration out of range
    #[error("invalid {0} payload")]
    InvalidTime(&'static str),

    /// Unknown type catalog discriminator
    #[error("invalid type entry discriminator {0}")]
    BadDiscriminator(u8),

    /// Catalog back-reference to an index that does not exist yet
    #[error("type entry back-reference {index} beyond catalog size {len}")]
    BadCatalogIndex {
        /// Index referenced
        index: u64,
        /// Entries registered so far (excluding the chain being read)
        len: usize,
    },

    /// Version below -1
    #[error("invalid type version {0}")]
    BadVersion(i64),

    /// A type entry was required but the chain ended
    #[error("missing type entry")]
    MissingTypeEntry,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corruption_display_has_context() {
        let err = CodecError::detached("reference handle 9 beyond table size 2");
        let CodecError::Corruption(report) = err else {
            panic!("expected corruption");
        };
        let report = report.with_context(17, 2, vec!["demo.Person".into(), "Friend".into()]);
        let msg = report.to_string();
        assert!(msg.contains("byte 17"));
        assert!(msg.contains("beyond table size"));
        assert!(msg.contains("demo.Person > Friend"));
        assert!(msg.contains("error.rs"));
    }

    #[test]
    fn test_desync_display() {
        let report = DesyncReport {
            expected_counter: 4,
            expected_tag: "demo.Person.Name".into(),
            found_counter: None,
            found_tag: None,
            last_verified: Some("value".into()),
            breadcrumbs: vec![],
            offset: 30,
        };
        let msg = report.to_string();
        assert!(msg.contains("#4 'demo.Person.Name'"));
        assert!(msg.contains("found no sentinel"));
        assert!(msg.contains("last verified 'value'"));
    }

    #[test]
    fn test_is_corruption() {
        assert!(CodecError::detached("x").is_corruption());
        assert!(!CodecError::encode("x").is_corruption());
        assert!(CodecError::resolution("demo.X", "not declared")
            .to_string()
            .contains("demo.X"));
    }

    #[test]
    fn test_wire_error_display() {
        let err = WireError::UnexpectedEnd {
            wanted: 4,
            available: 1,
        };
        assert_eq!(
            err.to_string(),
            "unexpected end of stream: wanted 4 bytes, 1 available"
        );
    }
}
