// meridian/core/types/src/receipt.rs

use serde::{Deserialize, Serialize};
use std::fmt;

/// Receipt status codes. Values are part of consensus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    Success = 0,
    GasRunOut = 1,
    BalanceNotEnough = 2,
    Parameter = 3,
    Runtime = 4,
    Timeout = 5,
    TxFormat = 6,
    Unknown = 8,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
}

impl Status {
    pub fn success() -> Self {
        Self {
            code: StatusCode::Success,
            message: String::new(),
        }
    }

    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == StatusCode::Success
    }

    pub fn is_timeout(&self) -> bool {
        self.code == StatusCode::Timeout
    }
}

/// Deterministic outcome of executing one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: [u8; 32],
    pub status: Status,
    pub gas_usage: u64,
    pub succ_action_num: u32,
    pub returns: Vec<String>,
}

impl Receipt {
    pub fn new(tx_hash: [u8; 32]) -> Self {
        Self {
            tx_hash,
            status: Status::success(),
            gas_usage: 0,
            succ_action_num: 0,
            returns: Vec::new(),
        }
    }

    /// Consensus equality: status, gas usage and successful action count.
    pub fn matches(&self, other: &Receipt) -> bool {
        self.status == other.status
            && self.gas_usage == other.gas_usage
            && self.succ_action_num == other.succ_action_num
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Receipt{{tx: {}, status: {:?}({}), gas: {}, succ: {}}}",
            &hex::encode(self.tx_hash)[..8],
            self.status.code,
            self.status.message,
            self.gas_usage,
            self.succ_action_num
        )
    }
}
