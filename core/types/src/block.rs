// meridian/core/types/src/block.rs

use crate::crypto::sha3;
use crate::encoding::Notation;
use crate::receipt::Receipt;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// Block header. `info` carries the execution metadata written during
/// generation and read back during verification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHead {
    pub version: u32,
    pub parent_hash: Vec<u8>,
    pub number: u64,
    pub witness: String,
    /// Unix nanoseconds
    pub time: i64,
    pub info: Vec<u8>,
}

impl BlockHead {
    pub fn hash(&self) -> [u8; 32] {
        let mut n = Notation::new();
        n.write_i64(i64::from(self.version));
        n.write_bytes(&self.parent_hash);
        n.write_i64(self.number as i64);
        n.write_string(&self.witness);
        n.write_i64(self.time);
        n.write_bytes(&self.info);
        sha3(&n.into_bytes())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Block {
    pub head: BlockHead,
    pub txs: Vec<Transaction>,
    pub receipts: Vec<Receipt>,
}

impl Block {
    pub fn new(head: BlockHead) -> Self {
        Self {
            head,
            txs: Vec::new(),
            receipts: Vec::new(),
        }
    }

    /// Total gas consumed by the block's receipts.
    pub fn gas_used(&self) -> u64 {
        self.receipts.iter().map(|r| r.gas_usage).sum()
    }
}
