// meridian/core/verifier/src/error.rs

use meridian_state::StateError;
use meridian_types::TxError;
use meridian_vm::IsolatorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Invalid block info: {0}")]
    Info(String),

    #[error("Unknown generation mode {0}")]
    UnknownMode(u8),

    #[error("Batch sizes sum to {sum}, block holds {txs} transactions")]
    BatchMismatch { sum: usize, txs: usize },

    #[error("Batch of {size} transactions exceeds width {thread}")]
    BatchOversized { size: usize, thread: usize },

    #[error("Block holds {txs} transactions but {receipts} receipts")]
    ReceiptCount { txs: usize, receipts: usize },

    #[error("Receipt mismatch: expected {expected}, got {got}")]
    ReceiptMismatch { expected: String, got: String },

    #[error("Invalid transaction {hash}: {source}")]
    Tx { hash: String, source: TxError },

    #[error(transparent)]
    Isolator(#[from] IsolatorError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("Batch worker failed: {0}")]
    Worker(String),
}

impl VerifyError {
    /// Whether the error comes from a broken runtime or state backend rather
    /// than from the transaction or block being checked.
    pub fn is_fatal(&self) -> bool {
        match self {
            VerifyError::Isolator(e) => e.is_fatal(),
            VerifyError::State(_) | VerifyError::Worker(_) => true,
            _ => false,
        }
    }
}
