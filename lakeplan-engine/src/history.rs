//! Snapshot-based undo log.
//!
//! Each entry carries exactly the pre-operation state its inversion needs.
//! Entries are never edited once written. A full reset moves the whole log
//! into its own entry, so every undoable step is stored exactly once and the
//! retention caps count nested steps too.
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::BTreeMap;

use crate::constants::{HISTORY_MEMORY_LIMIT, HISTORY_NEST_DEPTH, LOG_UNDO, LOG_UNDO_EMPTY};
use crate::inventory::{Inventory, PoolState, Trackers};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Source of history timestamps.
pub trait Clock {
    fn now_millis(&self) -> Timestamp;
}

/// Wall-clock time via `chrono`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> Timestamp {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Deterministic clock that moves forward one millisecond per reading.
#[derive(Debug, Default)]
pub struct TickingClock {
    next: Cell<Timestamp>,
}

impl TickingClock {
    #[must_use]
    pub const fn starting_at(start: Timestamp) -> Self {
        Self {
            next: Cell::new(start),
        }
    }
}

impl Clock for TickingClock {
    fn now_millis(&self) -> Timestamp {
        let now = self.next.get();
        self.next.set(now + 1);
        now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Draw,
    PoolClear,
    PoolReset,
    TrackerUpdate,
    FullReset,
}

impl HistoryKind {
    /// Kinds hidden from recent activity once a later full reset happened.
    #[must_use]
    pub const fn is_reset(self) -> bool {
        matches!(self, Self::PoolReset | Self::FullReset)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEntry {
    Draw {
        pool_id: String,
        category_id: String,
        before: PoolState,
        at: Timestamp,
    },
    PoolClear {
        pool_id: String,
        before: PoolState,
        at: Timestamp,
    },
    PoolReset {
        pool_id: String,
        /// `true` for a progress reset, `false` for a plain restock.
        zeroed_counters: bool,
        before: PoolState,
        at: Timestamp,
    },
    TrackerUpdate {
        before: Trackers,
        at: Timestamp,
    },
    FullReset {
        pools: BTreeMap<String, PoolState>,
        trackers: Trackers,
        prior_history: Vec<HistoryEntry>,
        at: Timestamp,
    },
}

impl HistoryEntry {
    #[must_use]
    pub const fn kind(&self) -> HistoryKind {
        match self {
            Self::Draw { .. } => HistoryKind::Draw,
            Self::PoolClear { .. } => HistoryKind::PoolClear,
            Self::PoolReset { .. } => HistoryKind::PoolReset,
            Self::TrackerUpdate { .. } => HistoryKind::TrackerUpdate,
            Self::FullReset { .. } => HistoryKind::FullReset,
        }
    }

    #[must_use]
    pub const fn at(&self) -> Timestamp {
        match self {
            Self::Draw { at, .. }
            | Self::PoolClear { at, .. }
            | Self::PoolReset { at, .. }
            | Self::TrackerUpdate { at, .. }
            | Self::FullReset { at, .. } => *at,
        }
    }

    #[must_use]
    pub fn pool_id(&self) -> Option<&str> {
        match self {
            Self::Draw { pool_id, .. }
            | Self::PoolClear { pool_id, .. }
            | Self::PoolReset { pool_id, .. } => Some(pool_id),
            Self::TrackerUpdate { .. } | Self::FullReset { .. } => None,
        }
    }
}

/// Undoable steps in `entries`, counting the prior logs held by full resets.
fn count_entries(entries: &[HistoryEntry]) -> usize {
    entries
        .iter()
        .map(|entry| match entry {
            HistoryEntry::FullReset { prior_history, .. } => 1 + count_entries(prior_history),
            _ => 1,
        })
        .sum()
}

/// The newest `budget` undoable steps in undo order. A full reset's prior log
/// is spent from the same budget before anything older than the reset, and
/// full resets below `depth` levels keep no prior log.
fn newest(entries: &[HistoryEntry], budget: usize, depth: usize) -> Vec<HistoryEntry> {
    let mut remaining = budget;
    let mut kept = Vec::new();
    for entry in entries.iter().rev() {
        if remaining == 0 {
            break;
        }
        remaining -= 1;
        let entry = match entry {
            HistoryEntry::FullReset {
                pools,
                trackers,
                prior_history,
                at,
            } => {
                let prior = match depth.checked_sub(1) {
                    Some(next) => newest(prior_history, remaining, next),
                    None => Vec::new(),
                };
                remaining -= count_entries(&prior);
                HistoryEntry::FullReset {
                    pools: pools.clone(),
                    trackers: trackers.clone(),
                    prior_history: prior,
                    at: *at,
                }
            }
            other => other.clone(),
        };
        kept.push(entry);
    }
    kept.reverse();
    kept
}

fn collect_recent<'a>(
    entries: &'a [HistoryEntry],
    cutoff: Option<Timestamp>,
    limit: usize,
    out: &mut Vec<&'a HistoryEntry>,
) {
    for entry in entries.iter().rev() {
        if out.len() >= limit {
            return;
        }
        let hidden = cutoff.is_some_and(|cut| entry.kind().is_reset() && entry.at() < cut);
        if !hidden {
            out.push(entry);
        }
        if let HistoryEntry::FullReset { prior_history, .. } = entry {
            collect_recent(prior_history, cutoff, limit, out);
        }
    }
}

/// What `undo` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    Empty,
    Restored {
        kind: HistoryKind,
        pool_id: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    entries: Vec<HistoryEntry>,
    #[serde(skip, default = "History::default_limit")]
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            limit: HISTORY_MEMORY_LIMIT,
        }
    }
}

impl History {
    const fn default_limit() -> usize {
        HISTORY_MEMORY_LIMIT
    }

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted entries, oldest first.
    #[must_use]
    pub fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        let mut history = Self::default();
        history.replace(entries);
        history
    }

    /// Number of steps `undo` can revert, including those held inside full
    /// resets.
    #[must_use]
    pub fn len(&self) -> usize {
        count_entries(&self.entries)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    #[must_use]
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
        self.enforce_limit();
    }

    pub fn pop(&mut self) -> Option<HistoryEntry> {
        self.entries.pop()
    }

    /// Empty the log, returning its retained entries for a full-reset
    /// snapshot. The log then lives only inside that snapshot.
    pub fn take_for_full_reset(&mut self) -> Vec<HistoryEntry> {
        let prior = newest(&self.entries, self.limit, HISTORY_NEST_DEPTH);
        self.entries.clear();
        prior
    }

    fn replace(&mut self, entries: Vec<HistoryEntry>) {
        self.entries = entries;
        self.enforce_limit();
    }

    fn enforce_limit(&mut self) {
        if count_entries(&self.entries) > self.limit {
            self.entries = newest(&self.entries, self.limit, HISTORY_NEST_DEPTH);
        }
    }

    /// The newest `limit` undoable steps, nested ones included, ready to
    /// persist.
    #[must_use]
    pub fn persisted(&self, limit: usize) -> Vec<HistoryEntry> {
        newest(&self.entries, limit, HISTORY_NEST_DEPTH)
    }

    #[must_use]
    pub fn last_full_reset_at(&self) -> Option<Timestamp> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.kind() == HistoryKind::FullReset)
            .map(HistoryEntry::at)
    }

    /// Newest-first activity, without reset entries that predate the latest
    /// full reset.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<&HistoryEntry> {
        let mut recent = Vec::new();
        collect_recent(&self.entries, self.last_full_reset_at(), limit, &mut recent);
        recent
    }

    /// Pop the newest entry and restore the state it captured.
    pub fn undo(&mut self, inventory: &mut Inventory) -> UndoOutcome {
        let Some(entry) = self.pop() else {
            log::debug!("{LOG_UNDO_EMPTY}");
            return UndoOutcome::Empty;
        };
        let kind = entry.kind();
        let pool_id = entry.pool_id().map(str::to_string);
        match entry {
            HistoryEntry::Draw {
                pool_id, before, ..
            }
            | HistoryEntry::PoolClear {
                pool_id, before, ..
            }
            | HistoryEntry::PoolReset {
                pool_id, before, ..
            } => inventory.restore_pool(&pool_id, before),
            HistoryEntry::TrackerUpdate { before, .. } => inventory.trackers = before,
            HistoryEntry::FullReset {
                pools,
                trackers,
                prior_history,
                ..
            } => {
                inventory.pools = pools;
                inventory.trackers = trackers;
                self.replace(prior_history);
            }
        }
        log::debug!("{LOG_UNDO}: {kind:?} {}", pool_id.as_deref().unwrap_or("*"));
        UndoOutcome::Restored { kind, pool_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw(at: Timestamp) -> HistoryEntry {
        HistoryEntry::Draw {
            pool_id: "pond".into(),
            category_id: "carp".into(),
            before: PoolState::default(),
            at,
        }
    }

    fn reset(at: Timestamp) -> HistoryEntry {
        HistoryEntry::PoolReset {
            pool_id: "pond".into(),
            zeroed_counters: false,
            before: PoolState::default(),
            at,
        }
    }

    #[test]
    fn push_caps_memory_at_limit() {
        let mut history = History::new();
        for at in 0..150 {
            history.push(draw(at));
        }
        assert_eq!(history.len(), HISTORY_MEMORY_LIMIT);
        assert_eq!(history.entries()[0].at(), 50);
        let persisted = history.persisted(50);
        assert_eq!(persisted.len(), 50);
        assert_eq!(persisted[0].at(), 100);
    }

    #[test]
    fn undo_on_empty_log_is_a_no_op() {
        let mut history = History::new();
        let mut inventory = Inventory::new();
        assert_eq!(history.undo(&mut inventory), UndoOutcome::Empty);
        assert_eq!(inventory, Inventory::new());
    }

    fn full_reset(prior_history: Vec<HistoryEntry>, at: Timestamp) -> HistoryEntry {
        HistoryEntry::FullReset {
            pools: BTreeMap::new(),
            trackers: Trackers::default(),
            prior_history,
            at,
        }
    }

    #[test]
    fn recent_hides_resets_before_full_reset() {
        let mut history = History::new();
        history.push(reset(1));
        history.push(draw(2));
        let prior = history.take_for_full_reset();
        assert!(history.is_empty());
        history.push(full_reset(prior, 3));
        history.push(reset(4));
        assert_eq!(history.len(), 4);
        let kinds: Vec<(HistoryKind, Timestamp)> = history
            .recent(10)
            .iter()
            .map(|e| (e.kind(), e.at()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (HistoryKind::PoolReset, 4),
                (HistoryKind::FullReset, 3),
                (HistoryKind::Draw, 2),
            ]
        );
    }

    #[test]
    fn persisted_budget_spans_nested_history() {
        let mut history = History::new();
        history.push(full_reset((0..80).map(draw).collect(), 100));
        let persisted = history.persisted(50);
        assert_eq!(count_entries(&persisted), 50);
        match &persisted[0] {
            HistoryEntry::FullReset { prior_history, .. } => {
                assert_eq!(prior_history.len(), 49);
                assert_eq!(prior_history[0].at(), 31);
            }
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[test]
    fn memory_cap_counts_nested_steps() {
        let mut history = History::new();
        history.push(full_reset((0..90).map(draw).collect(), 100));
        for at in 101..121 {
            history.push(draw(at));
        }
        assert_eq!(history.len(), HISTORY_MEMORY_LIMIT);
        assert_eq!(history.last().map(HistoryEntry::at), Some(120));
    }

    #[test]
    fn repeated_full_resets_stay_bounded_and_shallow() {
        let mut history = History::new();
        for round in 0..40 {
            history.push(draw(round * 10));
            let prior = history.take_for_full_reset();
            history.push(full_reset(prior, round * 10 + 1));
        }
        assert!(history.len() <= HISTORY_MEMORY_LIMIT);

        let persisted = history.persisted(50);
        assert!(count_entries(&persisted) <= 50);
        let json = serde_json::to_string(&persisted).unwrap();
        let back: Vec<HistoryEntry> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, persisted);

        let mut depth = 0;
        let mut level = back.as_slice();
        while let Some(HistoryEntry::FullReset { prior_history, .. }) = level.first() {
            depth += 1;
            level = prior_history;
        }
        assert!(depth <= HISTORY_NEST_DEPTH + 1);
    }

    #[test]
    fn undo_walks_back_through_nested_resets() {
        let mut history = History::new();
        let mut inventory = Inventory::new();
        history.push(draw(1));
        let prior = history.take_for_full_reset();
        history.push(full_reset(prior, 2));
        history.push(draw(3));
        let prior = history.take_for_full_reset();
        history.push(full_reset(prior, 4));
        assert_eq!(history.len(), 4);

        let mut kinds = Vec::new();
        while let UndoOutcome::Restored { kind, .. } = history.undo(&mut inventory) {
            kinds.push(kind);
        }
        assert_eq!(
            kinds,
            vec![
                HistoryKind::FullReset,
                HistoryKind::Draw,
                HistoryKind::FullReset,
                HistoryKind::Draw,
            ]
        );
    }

    #[test]
    fn entries_round_trip_through_json() {
        let entry = reset(9);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"kind\":\"pool_reset\""));
        let back: HistoryEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn ticking_clock_is_monotonic() {
        let clock = TickingClock::starting_at(10);
        assert_eq!(clock.now_millis(), 10);
        assert_eq!(clock.now_millis(), 11);
        assert!(SystemClock.now_millis() > 0);
    }
}
