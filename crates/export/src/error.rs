//! Error types for export and the fragment journal

use tessera_core::{GraphError, ObjectId};
use thiserror::Error;

/// Result type alias for export operations
pub type ExportResult<T> = std::result::Result<T, ExportError>;

/// Result type alias for journal operations
pub type JournalResult<T> = std::result::Result<T, JournalError>;

/// Errors raised while walking a graph for export
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    /// Graph access failed
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// The walk reached an object whose contents were never completed
    #[error("Cannot export pending object {0}")]
    PendingObject(ObjectId),

    /// Values nest deeper than the exporter allows
    #[error("Values nested deeper than the limit of {limit}")]
    TooDeep {
        /// Configured limit
        limit: usize,
    },
}

/// Errors raised by [`TransactionJournal`](crate::TransactionJournal)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JournalError {
    /// Transactions must be recorded in strictly increasing order
    #[error("Transaction {txn} recorded out of order (last recorded: {last})")]
    OutOfOrder {
        /// Transaction offered
        txn: u64,
        /// Highest transaction already recorded
        last: u64,
    },

    /// Exporting the transaction's events failed
    #[error("Export failed for transaction {txn}: {source}")]
    Export {
        /// Transaction being recorded
        txn: u64,
        /// Underlying export error
        #[source]
        source: ExportError,
    },
}
