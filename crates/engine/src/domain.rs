//! Domain host
//!
//! A [`Domain`] owns one rooted graph and serializes access to it:
//! - [`transact`](Domain::transact) runs a body under the write lock with
//!   an undo log; committed transactions get the next transaction id and
//!   their events are cached in the journal
//! - [`read`](Domain::read) runs a body under the read lock
//! - [`snapshot`](Domain::snapshot) and [`restore`](Domain::restore) move
//!   the whole graph through the codec
//! - [`changes_since`](Domain::changes_since) and
//!   [`export_full`](Domain::export_full) serve observers
//!
//! Lock order is state, then journal.

use crate::config::TesseraConfig;
use crate::error::{DomainError, DomainResult};
use crate::snapshot::{SnapshotEnvelope, SnapshotInfo};
use crate::transaction::Transaction;
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::Arc;
use tessera_codec::{CodecOptions, DriverRegistry};
use tessera_core::{Graph, Value};
use tessera_export::{export_json_with, JournalRetention, SinceResult, TransactionJournal};
use tracing::{debug, info, warn};

/// Per-domain settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomainConfig {
    /// Options for snapshot encoding
    pub codec: CodecOptions,
    /// Journal retention
    pub retention: JournalRetention,
}

impl From<&TesseraConfig> for DomainConfig {
    fn from(config: &TesseraConfig) -> Self {
        DomainConfig {
            codec: config.codec_options(),
            retention: config.journal_retention(),
        }
    }
}

/// Full export of a domain at a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullExport {
    /// Last transaction reflected
    pub txn: u64,
    /// Export JSON of the graph reachable from the root
    pub json: String,
}

#[derive(Debug, Default)]
struct DomainState {
    graph: Graph,
    root: Value,
    last_txn: u64,
}

/// A named, transactional object graph
pub struct Domain {
    name: String,
    registry: Arc<DriverRegistry>,
    config: DomainConfig,
    state: RwLock<DomainState>,
    journal: Mutex<TransactionJournal>,
}

impl Domain {
    /// Empty domain with a null root
    pub fn new(name: impl Into<String>, registry: Arc<DriverRegistry>, config: DomainConfig) -> Self {
        let name = name.into();
        debug!(target: "tessera::domain", domain = %name, "Domain created");
        Domain {
            name,
            registry,
            config,
            state: RwLock::new(DomainState {
                graph: Graph::new(),
                root: Value::Null,
                last_txn: 0,
            }),
            journal: Mutex::new(
                TransactionJournal::new(config.retention).with_max_depth(config.codec.max_depth),
            ),
        }
    }

    /// Domain name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Driver registry used for snapshots
    pub fn registry(&self) -> &Arc<DriverRegistry> {
        &self.registry
    }

    /// Settings
    pub fn config(&self) -> DomainConfig {
        self.config
    }

    /// Id of the last committed transaction (0 before the first)
    pub fn last_txn(&self) -> u64 {
        self.state.read().last_txn
    }

    /// Run `body` as a transaction.
    ///
    /// An error from the body rolls every change back and is returned
    /// unchanged. A body that changes nothing commits no transaction.
    pub fn transact<T, F>(&self, body: F) -> DomainResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> DomainResult<T>,
    {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let mut tx = Transaction::new(&mut state.graph, &mut state.root);

        let value = match body(&mut tx) {
            Ok(value) => value,
            Err(e) => {
                let undone = tx.rollback();
                warn!(
                    target: "tessera::domain",
                    domain = %self.name,
                    undone,
                    error = %e,
                    "Transaction rolled back"
                );
                return Err(e);
            }
        };

        if tx.events().is_empty() {
            return Ok(value);
        }
        let events: Vec<Value> = tx.events().iter().map(|e| e.to_value()).collect();
        let txn = state.last_txn + 1;

        let recorded = self.journal.lock().record(txn, &events, tx.graph());
        if let Err(e) = recorded {
            tx.rollback();
            warn!(
                target: "tessera::domain",
                domain = %self.name,
                txn,
                error = %e,
                "Fragment export failed, transaction rolled back"
            );
            return Err(e.into());
        }
        let event_count = tx.into_events().len();
        state.last_txn = txn;
        debug!(
            target: "tessera::domain",
            domain = %self.name,
            txn,
            events = event_count,
            "Transaction committed"
        );
        Ok(value)
    }

    /// Run `body` with shared access to the graph and root
    pub fn read<T>(&self, body: impl FnOnce(&Graph, &Value) -> T) -> T {
        let state = self.state.read();
        body(&state.graph, &state.root)
    }

    /// Encode the graph reachable from the root
    pub fn snapshot(&self) -> DomainResult<Vec<u8>> {
        let state = self.state.write();
        let bytes = tessera_codec::encode(&state.graph, &state.root, &self.registry, self.config.codec)?;
        debug!(
            target: "tessera::domain",
            domain = %self.name,
            txn = state.last_txn,
            bytes = bytes.len(),
            "Snapshot encoded"
        );
        Ok(bytes)
    }

    /// Replace the domain state with a decoded stream.
    ///
    /// On failure the current state is left untouched. On success the
    /// restore counts as a transaction that is never journaled, so every
    /// observer must fetch a full export.
    pub fn restore(&self, bytes: &[u8]) -> DomainResult<u64> {
        let mut state = self.state.write();
        let decoded = tessera_codec::decode_with(bytes, &self.registry, self.config.codec)?;
        state.graph = decoded.graph;
        state.root = decoded.root;
        state.last_txn += 1;
        let txn = state.last_txn;
        self.journal.lock().reset(txn);
        info!(
            target: "tessera::domain",
            domain = %self.name,
            txn,
            objects = decoded.stats.objects,
            "Domain restored"
        );
        Ok(txn)
    }

    /// Write a snapshot file atomically
    pub fn save_snapshot(&self, path: &Path) -> DomainResult<SnapshotInfo> {
        let state = self.state.write();
        let payload = tessera_codec::encode(&state.graph, &state.root, &self.registry, self.config.codec)?;
        let envelope = SnapshotEnvelope::new(state.last_txn, payload);
        Ok(envelope.write_atomic(path)?)
    }

    /// Verify a snapshot file and restore from it
    pub fn load_snapshot(&self, path: &Path) -> DomainResult<u64> {
        let envelope = SnapshotEnvelope::read(path)?;
        debug!(
            target: "tessera::domain",
            domain = %self.name,
            snapshot_txn = envelope.last_txn,
            "Loading snapshot"
        );
        self.restore(&envelope.payload)
    }

    /// Cached fragments for every transaction after `txn`
    pub fn changes_since(&self, txn: u64) -> SinceResult {
        let _state = self.state.read();
        self.journal.lock().since(txn)
    }

    /// Export the whole graph reachable from the root
    pub fn export_full(&self) -> DomainResult<FullExport> {
        let state = self.state.read();
        let json = export_json_with(&state.graph, &state.root, self.config.codec.max_depth)
            .map_err(DomainError::from)?;
        Ok(FullExport {
            txn: state.last_txn,
            json,
        })
    }
}

impl std::fmt::Debug for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Domain")
            .field("name", &self.name)
            .field("last_txn", &self.last_txn())
            .finish_non_exhaustive()
    }
}
