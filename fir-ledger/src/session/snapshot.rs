//! Record snapshot with stale-result protection.
//!
//! The snapshot is tagged with a binding epoch, bumped every time the
//! session rebinds or disconnects, and a reload sequence. A reload result
//! is committed only when it was started in the current epoch and is newer
//! than the last committed reload. Provisional inserts carry the epoch of
//! the subscription that delivered them.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::sync::LoadOutcome;
use crate::record::{Record, RecordStats};

/// What the last committed reload produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub enum LoadState {
    /// Nothing loaded in this epoch yet
    NotLoaded,
    /// At least one record
    Loaded,
    /// The contract holds no records
    Empty,
    /// The load aborted; records are empty because of the failure
    Failed,
}

/// Issued when a reload starts; presented again to commit its result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadTicket {
    epoch: u64,
    seq: u64,
}

impl ReloadTicket {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Local read model of the registry
#[derive(Debug, Clone)]
pub struct RecordSnapshot {
    records: Vec<Record>,
    state: LoadState,
    failure: Option<String>,
    epoch: u64,
    issued_seq: u64,
    committed_seq: u64,
}

impl Default for RecordSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordSnapshot {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            state: LoadState::NotLoaded,
            failure: None,
            epoch: 0,
            issued_seq: 0,
            committed_seq: 0,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Start a new epoch, dropping all records. Returns the new epoch.
    pub fn advance_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.records.clear();
        self.state = LoadState::NotLoaded;
        self.failure = None;
        self.epoch
    }

    /// Begin a reload in the current epoch
    pub fn begin_reload(&mut self) -> ReloadTicket {
        self.issued_seq += 1;
        ReloadTicket {
            epoch: self.epoch,
            seq: self.issued_seq,
        }
    }

    /// Commit a reload result. Returns false if the result was stale and discarded.
    pub fn commit(&mut self, ticket: ReloadTicket, outcome: LoadOutcome) -> bool {
        if ticket.epoch != self.epoch || ticket.seq <= self.committed_seq {
            debug!(
                ticket_epoch = ticket.epoch,
                ticket_seq = ticket.seq,
                epoch = self.epoch,
                committed_seq = self.committed_seq,
                "Discarding stale reload"
            );
            return false;
        }

        self.committed_seq = ticket.seq;
        match outcome {
            LoadOutcome::Loaded(records) => {
                self.records = records;
                self.state = LoadState::Loaded;
                self.failure = None;
            }
            LoadOutcome::Empty => {
                self.records.clear();
                self.state = LoadState::Empty;
                self.failure = None;
            }
            LoadOutcome::Failed(reason) => {
                self.records.clear();
                self.state = LoadState::Failed;
                self.failure = Some(reason);
            }
        }
        true
    }

    /// Prepend a provisional record delivered in `epoch`.
    ///
    /// Returns false when the epoch is stale or the id is already present.
    pub fn insert_provisional(&mut self, epoch: u64, record: Record) -> bool {
        if epoch != self.epoch {
            debug!(id = record.id, epoch, current = self.epoch, "Discarding stale event");
            return false;
        }
        if self.records.iter().any(|r| r.id == record.id) {
            return false;
        }

        self.records.insert(0, record);
        if matches!(self.state, LoadState::NotLoaded | LoadState::Empty) {
            self.state = LoadState::Loaded;
        }
        true
    }

    /// Records, most recent first
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, id: u64) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// Reason of the last failed load
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn stats(&self) -> RecordStats {
        RecordStats::from_records(&self.records)
    }
}
