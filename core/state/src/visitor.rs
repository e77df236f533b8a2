// meridian/core/state/src/visitor.rs

use crate::access::AccessSet;
use crate::keys;
use crate::store::{StateError, Store, WriteSet};
use meridian_types::Contract;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Saved write-set, restorable with [`Visitor::restore`].
#[derive(Debug, Clone)]
pub struct Snapshot(WriteSet);

/// Write-set overlay over a [`Store`].
///
/// Reads fall through to the store and are recorded; writes stay in the
/// overlay until [`Visitor::commit`].
pub struct Visitor {
    store: Arc<dyn Store>,
    writes: WriteSet,
    reads: BTreeSet<String>,
}

impl fmt::Debug for Visitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Visitor")
            .field("writes", &self.writes.len())
            .field("reads", &self.reads.len())
            .finish()
    }
}

impl Visitor {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            writes: WriteSet::new(),
            reads: BTreeSet::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StateError> {
        if let Some(pending) = self.writes.get(key) {
            return Ok(pending.clone());
        }
        self.reads.insert(key.to_string());
        self.store.get(key)
    }

    pub fn put(&mut self, key: String, value: Vec<u8>) {
        self.writes.insert(key, Some(value));
    }

    pub fn del(&mut self, key: String) {
        self.writes.insert(key, None);
    }

    pub fn table_get(
        &mut self,
        contract: &str,
        table: &str,
        key: &str,
    ) -> Result<Option<String>, StateError> {
        let full = keys::table(contract, table, key);
        self.get(&full)?
            .map(|bytes| {
                String::from_utf8(bytes).map_err(|e| StateError::Corrupted {
                    key: full.clone(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    pub fn table_put(&mut self, contract: &str, table: &str, key: &str, value: &str) {
        self.put(keys::table(contract, table, key), value.as_bytes().to_vec());
    }

    pub fn table_del(&mut self, contract: &str, table: &str, key: &str) {
        self.del(keys::table(contract, table, key));
    }

    pub fn contract(&mut self, id: &str) -> Result<Option<Contract>, StateError> {
        let key = keys::contract(id);
        match self.get(&key)? {
            Some(bytes) => Contract::decode(&bytes)
                .map(Some)
                .map_err(|e| StateError::Corrupted {
                    key,
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    pub fn set_contract(&mut self, contract: &Contract) -> Result<(), StateError> {
        let bytes = contract.encode().map_err(|e| StateError::Corrupted {
            key: keys::contract(&contract.id),
            reason: e.to_string(),
        })?;
        self.put(keys::contract(&contract.id), bytes);
        Ok(())
    }

    /// Contract id a domain name points at, if it is a registered domain.
    pub fn domain(&mut self, name: &str) -> Result<Option<String>, StateError> {
        let key = keys::domain(name);
        self.get(&key)?
            .map(|bytes| {
                String::from_utf8(bytes).map_err(|e| StateError::Corrupted {
                    key: key.clone(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    pub fn set_domain(&mut self, name: &str, contract_id: &str) {
        self.put(keys::domain(name), contract_id.as_bytes().to_vec());
    }

    /// Raw balance in units of the token's smallest decimal.
    pub fn token_balance(&mut self, token: &str, account: &str) -> Result<i64, StateError> {
        let key = keys::balance(token, account);
        match self.get(&key)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.try_into().map_err(|_| StateError::Corrupted {
                    key,
                    reason: "balance must be 8 bytes".to_string(),
                })?;
                Ok(i64::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }

    pub fn set_token_balance(&mut self, token: &str, account: &str, value: i64) {
        self.put(keys::balance(token, account), value.to_be_bytes().to_vec());
    }

    /// Decimal precision of a token; `None` if the token does not exist.
    pub fn decimal(&mut self, token: &str) -> Result<Option<u32>, StateError> {
        let key = keys::decimal(token);
        match self.get(&key)? {
            Some(bytes) => {
                let raw: [u8; 4] = bytes.try_into().map_err(|_| StateError::Corrupted {
                    key,
                    reason: "decimal must be 4 bytes".to_string(),
                })?;
                Ok(Some(u32::from_be_bytes(raw)))
            }
            None => Ok(None),
        }
    }

    pub fn set_decimal(&mut self, token: &str, decimal: u32) {
        self.put(keys::decimal(token), decimal.to_be_bytes().to_vec());
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot(self.writes.clone())
    }

    /// Drop every write made after `snapshot` was taken.
    pub fn restore(&mut self, snapshot: Snapshot) {
        self.writes = snapshot.0;
    }

    pub fn has_pending(&self) -> bool {
        !self.writes.is_empty()
    }

    /// Keys read from the store and keys written since the last reset.
    pub fn access_set(&self) -> AccessSet {
        AccessSet {
            reads: self.reads.clone(),
            writes: self.writes.keys().cloned().collect(),
        }
    }

    /// Push pending writes into the store.
    pub fn commit(&mut self) -> Result<(), StateError> {
        let writes = std::mem::take(&mut self.writes);
        debug!("Committing {} writes", writes.len());
        self.reads.clear();
        self.store.apply(writes)
    }

    /// Discard pending writes. Recorded reads are kept: they still shaped
    /// the outcome that caused the rollback.
    pub fn rollback(&mut self) {
        self.writes.clear();
    }

    /// Discard pending writes and recorded reads.
    pub fn reset(&mut self) {
        self.writes.clear();
        self.reads.clear();
    }
}
