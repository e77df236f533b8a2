// meridian/core/state/src/store.rs

use parking_lot::RwLock;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("State backend error: {0}")]
    Backend(String),

    #[error("Corrupted value at {key}: {reason}")]
    Corrupted { key: String, reason: String },
}

/// Pending writes. `None` deletes the key.
pub type WriteSet = BTreeMap<String, Option<Vec<u8>>>;

/// Committed key/value state shared by every execution context.
///
/// Implementations must make concurrent `get`/`apply` calls safe.
pub trait Store: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StateError>;

    /// Atomically apply a write-set.
    fn apply(&self, writes: WriteSet) -> Result<(), StateError>;
}

/// In-memory store, ordered so dumps are deterministic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Independent copy of the current contents.
    pub fn fork(&self) -> Self {
        Self {
            data: RwLock::new(self.data.read().clone()),
        }
    }

    /// Every key/value pair currently stored.
    pub fn dump(&self) -> BTreeMap<String, Vec<u8>> {
        self.data.read().clone()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StateError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn apply(&self, writes: WriteSet) -> Result<(), StateError> {
        let mut data = self.data.write();
        let count = writes.len();
        for (key, value) in writes {
            match value {
                Some(v) => {
                    data.insert(key, v);
                }
                None => {
                    data.remove(&key);
                }
            }
        }
        debug!("Applied {} writes", count);
        Ok(())
    }
}
