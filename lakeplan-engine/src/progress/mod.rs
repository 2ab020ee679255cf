//! Versioned per-entity progress persisted as one root blob.
//!
//! The whole root is rewritten on every change. In-memory state only moves
//! forward once the backend accepted the new root, so a failed write leaves
//! both sides as they were.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::bus::{ChangeBus, ChangeEvent, SubscriptionId};
use crate::constants::{
    HISTORY_PERSIST_LIMIT, LOG_HISTORY_DISCARD, LOG_STORE_WRITE, PROGRESS_ROOT_KEY,
};
use crate::history::{History, HistoryEntry};

pub mod backend;
pub mod record;
pub mod transfer;
pub use backend::{ByteStore, MemoryByteStore};
pub use record::{FishingToolState, GoalInputs, ProgressKey, ProgressRecord};
pub use transfer::{ExportPayload, ImportError, ImportSummary};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend failed: {0}")]
    Backend(String),
    #[error("progress data could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn backend_error<E: std::error::Error>(err: E) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Everything stored under the root key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProgressRoot {
    /// Keyed by [`ProgressKey::storage_key`].
    #[serde(default)]
    pub records: BTreeMap<String, ProgressRecord>,
    #[serde(default)]
    pub preferences: Map<String, Value>,
}

#[derive(Debug)]
pub struct ProgressStore<S: ByteStore> {
    backend: S,
    root: ProgressRoot,
    bus: ChangeBus,
}

impl<S: ByteStore> ProgressStore<S> {
    /// Load the root from `backend`, starting empty when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read or the stored root is
    /// not valid progress data.
    pub fn open(backend: S) -> Result<Self, StoreError> {
        let root = match backend.get(PROGRESS_ROOT_KEY).map_err(backend_error)? {
            Some(text) => serde_json::from_str(&text)?,
            None => ProgressRoot::default(),
        };
        Ok(Self {
            backend,
            root,
            bus: ChangeBus::new(),
        })
    }

    #[must_use]
    pub const fn backend(&self) -> &S {
        &self.backend
    }

    #[must_use]
    pub const fn root(&self) -> &ProgressRoot {
        &self.root
    }

    #[must_use]
    pub fn preferences(&self) -> &Map<String, Value> {
        &self.root.preferences
    }

    /// Read a record without creating it.
    #[must_use]
    pub fn record(&self, key: &ProgressKey) -> Option<&ProgressRecord> {
        self.root.records.get(&key.storage_key())
    }

    pub fn records(&self) -> impl Iterator<Item = &ProgressRecord> {
        self.root.records.values()
    }

    /// Existing record, or a freshly persisted empty one.
    ///
    /// # Errors
    ///
    /// Returns an error if a new record cannot be persisted.
    pub fn get(&mut self, key: &ProgressKey) -> Result<ProgressRecord, StoreError> {
        if let Some(existing) = self.record(key) {
            return Ok(existing.clone());
        }
        self.upsert(key, |record| record)
    }

    /// Replace one record with `transform(current)` and rewrite the root.
    /// The record's identity fields always follow `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be serialized or written; the store
    /// is unchanged in that case.
    pub fn upsert<F>(&mut self, key: &ProgressKey, transform: F) -> Result<ProgressRecord, StoreError>
    where
        F: FnOnce(ProgressRecord) -> ProgressRecord,
    {
        let storage_key = key.storage_key();
        let current = self
            .root
            .records
            .get(&storage_key)
            .cloned()
            .unwrap_or_else(|| ProgressRecord::empty(key));
        let mut next = transform(current);
        next.entity_id.clone_from(&key.entity_id);
        next.version = key.version;

        let mut root = self.root.clone();
        root.records.insert(storage_key.clone(), next.clone());
        self.commit(root)?;
        log::debug!("{LOG_STORE_WRITE}: {storage_key}");
        self.bus
            .publish(&ChangeEvent::RecordWritten { key: storage_key });
        Ok(next)
    }

    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_task(
        &mut self,
        key: &ProgressKey,
        task_id: &str,
        done: bool,
    ) -> Result<ProgressRecord, StoreError> {
        self.upsert(key, |record| record.with_task(task_id, done))
    }

    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_group_task(
        &mut self,
        key: &ProgressKey,
        group_id: &str,
        task_id: &str,
        done: bool,
    ) -> Result<ProgressRecord, StoreError> {
        self.upsert(key, |record| record.with_group_task(group_id, task_id, done))
    }

    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_purchase(
        &mut self,
        key: &ProgressKey,
        item_id: &str,
        quantity: u32,
    ) -> Result<ProgressRecord, StoreError> {
        self.upsert(key, |record| record.with_purchase(item_id, quantity))
    }

    fn commit(&mut self, root: ProgressRoot) -> Result<(), StoreError> {
        let text = serde_json::to_string(&root)?;
        self.backend
            .set(PROGRESS_ROOT_KEY, &text)
            .map_err(backend_error)?;
        self.root = root;
        Ok(())
    }

    /// The fishing undo log for `key`. An unreadable log is dropped with a
    /// warning rather than failing the tool.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn load_history(&self, key: &ProgressKey) -> Result<History, StoreError> {
        let history_key = key.history_key();
        let Some(text) = self.backend.get(&history_key).map_err(backend_error)? else {
            return Ok(History::new());
        };
        match serde_json::from_str::<Vec<HistoryEntry>>(&text) {
            Ok(entries) => Ok(History::from_entries(entries)),
            Err(err) => {
                log::warn!("{LOG_HISTORY_DISCARD}: {history_key}: {err}");
                Ok(History::new())
            }
        }
    }

    /// Persist the newest entries of `history` under the tool key.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be serialized or written.
    pub fn save_history(&mut self, key: &ProgressKey, history: &History) -> Result<(), StoreError> {
        let history_key = key.history_key();
        let text = serde_json::to_string(&history.persisted(HISTORY_PERSIST_LIMIT))?;
        self.backend
            .set(&history_key, &text)
            .map_err(backend_error)?;
        self.bus
            .publish(&ChangeEvent::HistoryWritten { key: history_key });
        Ok(())
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&ChangeEvent) + 'static,
    {
        self.bus.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Bumped by every successful write.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.bus.revision()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryEntry;
    use crate::inventory::PoolState;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Error)]
    #[error("disk full")]
    struct DiskFull;

    /// Accepts reads, refuses every write.
    #[derive(Debug, Default)]
    struct ReadOnlyStore;

    impl ByteStore for ReadOnlyStore {
        type Error = DiskFull;

        fn get(&self, _key: &str) -> Result<Option<String>, Self::Error> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), Self::Error> {
            Err(DiskFull)
        }

        fn remove(&self, _key: &str) -> Result<(), Self::Error> {
            Err(DiskFull)
        }
    }

    #[test]
    fn get_creates_and_persists_empty_record() {
        let backend = MemoryByteStore::new();
        let mut store = ProgressStore::open(backend.clone()).unwrap();
        let key = ProgressKey::new("hero", 1);
        let record = store.get(&key).unwrap();
        assert_eq!(record, ProgressRecord::empty(&key));
        assert!(backend.contains(PROGRESS_ROOT_KEY));

        let reopened = ProgressStore::open(backend).unwrap();
        assert_eq!(reopened.record(&key), Some(&record));
    }

    #[test]
    fn versions_are_disjoint_records() {
        let mut store = ProgressStore::open(MemoryByteStore::new()).unwrap();
        let v1 = ProgressKey::new("hero", 1);
        let v2 = ProgressKey::new("hero", 2);
        store.set_task(&v1, "bait", true).unwrap();
        let fresh = store.get(&v2).unwrap();
        assert!(fresh.tasks.is_empty());
        assert!(store.record(&v1).unwrap().task_done("bait"));
    }

    #[test]
    fn upsert_pins_identity_and_notifies() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut store = ProgressStore::open(MemoryByteStore::new()).unwrap();
        let sink = Rc::clone(&events);
        store.subscribe(move |event| sink.borrow_mut().push(event.clone()));

        let key = ProgressKey::new("hero", 1);
        let written = store
            .upsert(&key, |mut record| {
                record.entity_id = "someone-else".into();
                record.with_purchase("rod", 1)
            })
            .unwrap();
        assert_eq!(written.entity_id, "hero");
        assert_eq!(store.revision(), 1);
        assert_eq!(
            *events.borrow(),
            vec![ChangeEvent::RecordWritten {
                key: "hero::1".into()
            }]
        );
    }

    #[test]
    fn failed_write_leaves_store_untouched() {
        let mut store = ProgressStore::open(ReadOnlyStore).unwrap();
        let key = ProgressKey::new("hero", 1);
        let err = store.set_task(&key, "bait", true).unwrap_err();
        assert!(matches!(err, StoreError::Backend(ref msg) if msg == "disk full"));
        assert!(store.record(&key).is_none());
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn history_round_trips_through_tool_key() {
        let backend = MemoryByteStore::new();
        let mut store = ProgressStore::open(backend.clone()).unwrap();
        let key = ProgressKey::new("hero", 1);
        let mut history = History::new();
        for at in 0..60 {
            history.push(HistoryEntry::PoolClear {
                pool_id: "pond".into(),
                before: PoolState::default(),
                at,
            });
        }
        store.save_history(&key, &history).unwrap();
        let loaded = store.load_history(&key).unwrap();
        assert_eq!(loaded.len(), HISTORY_PERSIST_LIMIT);
        assert_eq!(loaded.entries()[0].at(), 10);

        backend.set(&key.history_key(), "not json").unwrap();
        assert!(store.load_history(&key).unwrap().is_empty());
    }

    #[test]
    fn corrupt_root_is_reported() {
        let backend = MemoryByteStore::new();
        backend.set(PROGRESS_ROOT_KEY, "{oops").unwrap();
        assert!(matches!(
            ProgressStore::open(backend),
            Err(StoreError::Serialization(_))
        ));
    }
}
