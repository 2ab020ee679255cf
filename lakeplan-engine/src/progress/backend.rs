//! Key/string byte stores backing the progress root.
use std::cell::RefCell;
use std::collections::HashMap;
use std::convert::Infallible;
use std::rc::Rc;

/// Trait for abstracting the persisted key/value store.
/// Platform-specific implementations should provide this
pub trait ByteStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, Self::Error>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    fn set(&self, key: &str, value: &str) -> Result<(), Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the backend rejects the removal.
    fn remove(&self, key: &str) -> Result<(), Self::Error>;
}

/// In-memory store. Clones share the same map, the way two tabs share one
/// browser storage area.
#[derive(Debug, Clone, Default)]
pub struct MemoryByteStore {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryByteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }
}

impl ByteStore for MemoryByteStore {
    type Error = Infallible;

    fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Self::Error> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_entries() {
        let store = MemoryByteStore::new();
        let other = store.clone();
        store.set("k", "v").unwrap();
        assert_eq!(other.get("k").unwrap().as_deref(), Some("v"));
        other.remove("k").unwrap();
        assert!(store.is_empty());
    }
}
