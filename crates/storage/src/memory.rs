//! MemoryBackend: in-process ordered map backend
//!
//! - `BTreeMap<String, Vec<u8>>` for ordered key storage
//! - `parking_lot::RwLock` for thread-safe access
//!
//! Scans clone the map under the read lock and iterate the clone, so a long
//! query never holds the lock while writers wait.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use docstore_core::Result;

use crate::backend::{Backend, ScanIter};

/// In-memory backend using BTreeMap with RwLock
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    /// Create a new empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// True if no key is stored
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Backend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.data.write().insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.data.write().remove(key).is_some())
    }

    fn scan(&self) -> Result<ScanIter> {
        let snapshot = self.data.read().clone();
        Ok(Box::new(snapshot.into_iter().map(Ok)))
    }
}
