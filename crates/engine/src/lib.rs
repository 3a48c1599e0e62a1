//! Domain host for Tessera graphs
//!
//! This crate plays the transaction-engine role around the codec and the
//! exporter:
//! - Domain: one rooted graph behind a read/write lock
//! - Transaction: checked mutations with an undo log and mutation events
//! - Journal integration: each commit caches an export fragment
//! - Snapshots: codec streams in a checksummed, atomically written file
//! - Config: `tessera.toml`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod snapshot;
pub mod transaction;

pub use config::{JournalConfig, TesseraConfig, CONFIG_FILE_NAME};
pub use domain::{Domain, DomainConfig, FullExport};
pub use error::{ConfigError, DomainError, DomainResult, SnapshotFileError};
pub use events::MutationEvent;
pub use snapshot::{SnapshotEnvelope, SnapshotInfo};
pub use transaction::Transaction;
