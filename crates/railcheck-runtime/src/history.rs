//! Append-only log of demo runs.
//!
//! Entries are appended as runs complete and are never mutated or removed.
//! Readers get a snapshot; writers never block readers for longer than one
//! push.

use parking_lot::RwLock;
use railcheck_core::HistoryEntry;

/// Thread-safe, append-only history of [`HistoryEntry`] records.
///
/// Ordering is completion order: whichever run appends first appears first,
/// regardless of which started first.
#[derive(Debug, Default)]
pub struct HistoryLog {
    entries: RwLock<Vec<HistoryEntry>>,
}

impl HistoryLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry.
    pub fn append(&self, entry: HistoryEntry) {
        self.entries.write().push(entry);
    }

    /// Snapshot of all entries in insertion order.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.read().clone()
    }

    /// Number of entries recorded so far.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
