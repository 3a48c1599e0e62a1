//! Error types for the domain host

use std::path::PathBuf;
use tessera_codec::CodecError;
use tessera_core::GraphError;
use tessera_export::{ExportError, JournalError};
use thiserror::Error;

/// Result type alias for domain operations
pub type DomainResult<T> = std::result::Result<T, DomainError>;

/// Errors raised by [`Domain`](crate::Domain) and its transactions
#[derive(Debug, Error)]
pub enum DomainError {
    /// Encoding or decoding the domain state failed
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Graph access failed
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Exporting state failed
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Caching a transaction fragment failed
    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    /// Reading or writing a snapshot file failed
    #[error("Snapshot file error: {0}")]
    Snapshot(#[from] SnapshotFileError),

    /// A mutation was rejected before touching the graph
    #[error("Invalid mutation: {0}")]
    InvalidMutation(String),

    /// The transaction body gave up
    #[error("Transaction aborted: {0}")]
    Aborted(String),
}

impl DomainError {
    /// Create an invalid mutation error
    pub fn invalid(msg: impl Into<String>) -> Self {
        DomainError::InvalidMutation(msg.into())
    }

    /// Create an abort error, for use inside transaction bodies
    pub fn aborted(msg: impl Into<String>) -> Self {
        DomainError::Aborted(msg.into())
    }
}

/// Errors raised by the snapshot file envelope
#[derive(Debug, Error)]
pub enum SnapshotFileError {
    /// File shorter than its header and trailer
    #[error("Snapshot too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum size
        expected: usize,
        /// Actual size
        actual: usize,
    },

    /// Magic bytes do not match
    #[error("Invalid magic bytes: expected TSNP, found {found:?}")]
    InvalidMagic {
        /// Bytes found
        found: Vec<u8>,
    },

    /// Envelope version not supported
    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),

    /// Stored checksum does not match the content
    #[error("Checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Stored checksum
        expected: u32,
        /// Computed checksum
        actual: u32,
    },

    /// Declared payload length does not match the file
    #[error("Payload length {declared} does not match the {actual} bytes present")]
    LengthMismatch {
        /// Length in the header
        declared: u64,
        /// Bytes actually present
        actual: u64,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading or saving `tessera.toml`
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config file '{}': {source}", path.display())]
    Read {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file could not be written
    #[error("Failed to write config file '{}': {source}", path.display())]
    Write {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema
    #[error("Failed to parse config file '{}': {message}", path.display())]
    Parse {
        /// File path
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// The config could not be serialized
    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    /// A value is out of range
    #[error("Invalid config value for '{key}': {reason}")]
    Invalid {
        /// Offending key
        key: &'static str,
        /// Why it was rejected
        reason: String,
    },
}
