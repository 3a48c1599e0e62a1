//! Per-transaction export fragment cache
//!
//! Each committed transaction's events are exported exactly once into a
//! JSON fragment:
//!
//! ```text
//! {"txn":7,"events":["$list",null,e1,e2]}
//! ```
//!
//! Observers that already hold state up to transaction `N` ask for
//! [`TransactionJournal::since`]. The answer concatenates the cached
//! fragments for every transaction after `N`, without walking live state.
//! If retention already evicted a transaction the observer needs, the
//! journal answers [`SinceResult::FullExportRequired`] and the observer
//! must fetch a full export instead.
//!
//! # Retention
//!
//! Eviction is oldest-first and controlled by a [`JournalRetention`]
//! policy supplied by the caller:
//! - `max_count`: keep at most this many fragments
//! - `max_bytes`: keep the total fragment text under this size
//! - `max_age`: drop fragments older than this
//!
//! The newest fragment is never evicted by the size and count limits, so a
//! single large transaction is still served.

use crate::error::{JournalError, JournalResult};
use crate::exporter::Exporter;
use crate::json::JsonSink;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tessera_core::{Graph, Value, DEFAULT_MAX_DEPTH};
use tracing::debug;

/// Eviction limits for the journal; `None` means unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JournalRetention {
    /// Maximum number of cached fragments
    pub max_count: Option<usize>,
    /// Maximum total size of cached fragment text, in bytes
    pub max_bytes: Option<usize>,
    /// Maximum fragment age
    pub max_age: Option<Duration>,
}

impl JournalRetention {
    /// Keep everything
    pub fn keep_all() -> Self {
        Self::default()
    }

    /// Limit the fragment count
    pub fn with_max_count(mut self, count: usize) -> Self {
        self.max_count = Some(count);
        self
    }

    /// Limit the total fragment size
    pub fn with_max_bytes(mut self, bytes: usize) -> Self {
        self.max_bytes = Some(bytes);
        self
    }

    /// Limit fragment age
    pub fn with_max_age(mut self, age: Duration) -> Self {
        self.max_age = Some(age);
        self
    }
}

#[derive(Debug, Clone)]
struct Fragment {
    txn: u64,
    json: String,
    recorded_at: Instant,
}

/// Answer to a "since N" query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinceResult {
    /// JSON array of the fragments for every transaction after N
    Fragments(String),
    /// A transaction after N is no longer cached
    FullExportRequired,
}

/// Cache of exported transaction fragments
#[derive(Debug)]
pub struct TransactionJournal {
    retention: JournalRetention,
    fragments: VecDeque<Fragment>,
    total_bytes: usize,
    last_txn: u64,
    /// Highest transaction no longer cached (0 when nothing was lost)
    evicted_through: u64,
    max_depth: usize,
}

impl TransactionJournal {
    /// Empty journal
    pub fn new(retention: JournalRetention) -> Self {
        TransactionJournal {
            retention,
            fragments: VecDeque::new(),
            total_bytes: 0,
            last_txn: 0,
            evicted_through: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Same journal with another nesting limit for fragment exports
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Retention policy in force
    pub fn retention(&self) -> JournalRetention {
        self.retention
    }

    /// Number of cached fragments
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// True if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Total size of cached fragment text
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Highest transaction recorded
    pub fn last_txn(&self) -> u64 {
        self.last_txn
    }

    /// Oldest transaction still cached
    pub fn oldest_txn(&self) -> Option<u64> {
        self.fragments.front().map(|f| f.txn)
    }

    /// Cached fragment for one transaction
    pub fn fragment(&self, txn: u64) -> Option<&str> {
        self.fragments
            .iter()
            .find(|f| f.txn == txn)
            .map(|f| f.json.as_str())
    }

    /// Export `events` for transaction `txn` and cache the fragment
    pub fn record(&mut self, txn: u64, events: &[Value], graph: &Graph) -> JournalResult<()> {
        self.record_at(txn, events, graph, Instant::now())
    }

    /// [`record`](Self::record) with an explicit clock reading
    pub fn record_at(
        &mut self,
        txn: u64,
        events: &[Value],
        graph: &Graph,
        now: Instant,
    ) -> JournalResult<()> {
        if txn <= self.last_txn {
            return Err(JournalError::OutOfOrder {
                txn,
                last: self.last_txn,
            });
        }

        let mut exporter = Exporter::new(graph, JsonSink::new()).with_max_depth(self.max_depth);
        exporter
            .export_sequence(events)
            .map_err(|source| JournalError::Export { txn, source })?;
        let events_json = exporter.into_sink().into_string();
        let json = format!("{{\"txn\":{},\"events\":{}}}", txn, events_json);

        self.total_bytes += json.len();
        self.fragments.push_back(Fragment {
            txn,
            json,
            recorded_at: now,
        });
        self.last_txn = txn;
        debug!(
            target: "tessera::journal",
            txn,
            events = events.len(),
            cached = self.fragments.len(),
            "Recorded fragment"
        );
        self.evict(now);
        Ok(())
    }

    /// Fragments for every transaction after `txn`
    pub fn since(&mut self, txn: u64) -> SinceResult {
        self.since_at(txn, Instant::now())
    }

    /// [`since`](Self::since) with an explicit clock reading
    pub fn since_at(&mut self, txn: u64, now: Instant) -> SinceResult {
        self.evict(now);
        if txn < self.evicted_through {
            debug!(
                target: "tessera::journal",
                requested = txn,
                evicted_through = self.evicted_through,
                "Full export required"
            );
            return SinceResult::FullExportRequired;
        }
        let mut out = String::from("[");
        for (i, fragment) in self.fragments.iter().filter(|f| f.txn > txn).enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&fragment.json);
        }
        out.push(']');
        SinceResult::Fragments(out)
    }

    /// Forget every fragment; observers behind `last_txn` need a full export
    pub fn reset(&mut self, last_txn: u64) {
        self.fragments.clear();
        self.total_bytes = 0;
        self.last_txn = last_txn;
        self.evicted_through = last_txn;
        debug!(target: "tessera::journal", last_txn, "Journal reset");
    }

    /// Apply the retention policy
    pub fn evict(&mut self, now: Instant) {
        let before = self.fragments.len();
        if let Some(max_age) = self.retention.max_age {
            while let Some(front) = self.fragments.front() {
                if now.saturating_duration_since(front.recorded_at) <= max_age {
                    break;
                }
                self.pop_front();
            }
        }
        if let Some(max_count) = self.retention.max_count {
            while self.fragments.len() > max_count.max(1) {
                self.pop_front();
            }
        }
        if let Some(max_bytes) = self.retention.max_bytes {
            while self.fragments.len() > 1 && self.total_bytes > max_bytes {
                self.pop_front();
            }
        }
        let evicted = before - self.fragments.len();
        if evicted > 0 {
            debug!(
                target: "tessera::journal",
                evicted,
                evicted_through = self.evicted_through,
                "Evicted fragments"
            );
        }
    }

    fn pop_front(&mut self) {
        if let Some(fragment) = self.fragments.pop_front() {
            self.total_bytes -= fragment.json.len();
            self.evicted_through = fragment.txn;
        }
    }
}

impl Default for TransactionJournal {
    fn default() -> Self {
        Self::new(JournalRetention::default())
    }
}
