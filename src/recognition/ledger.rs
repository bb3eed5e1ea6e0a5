use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use super::LedgerEntry;

#[derive(Debug)]
pub enum LedgerInsert {
    Accepted,
    /// The key was already present; carries the entry that won.
    Duplicate(LedgerEntry),
}

/// First accepted result per `(session_id, subject_id)` wins; later ones are
/// no-ops.
#[derive(Debug, Default)]
pub struct Ledger {
    entries: HashMap<(String, i64), LedgerEntry>,
    order: Vec<(String, i64)>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: LedgerEntry) -> LedgerInsert {
        let key = entry.key();
        if let Some(existing) = self.entries.get(&key) {
            return LedgerInsert::Duplicate(existing.clone());
        }
        self.order.push(key.clone());
        self.entries.insert(key, entry);
        LedgerInsert::Accepted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in acceptance order.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.order
            .iter()
            .filter_map(|key| self.entries.get(key).cloned())
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveLogEntry {
    pub label: String,
    #[serde(flatten)]
    pub entry: LedgerEntry,
}

/// The most recent ledger insertions, newest first. Observability only.
#[derive(Debug)]
pub struct LiveLog {
    capacity: usize,
    entries: VecDeque<LiveLogEntry>,
}

impl LiveLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, entry: LiveLogEntry) {
        if self.capacity == 0 {
            return;
        }
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    pub fn snapshot(&self) -> Vec<LiveLogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
