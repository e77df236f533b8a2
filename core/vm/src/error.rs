// meridian/core/vm/src/error.rs

use meridian_state::StateError;
use meridian_types::{Lang, StatusCode};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("Contract not found: {0}")]
    ContractNotFound(String),

    #[error("Abi not found: {contract}.{api}")]
    AbiNotFound { contract: String, api: String },

    #[error("Args length unmatched to abi {abi}: need {need}, got {got}")]
    ArgsArity { abi: String, need: usize, got: usize },

    #[error("Invalid argument: {0}")]
    ArgDecode(String),

    #[error("Vm unsupported: {0}")]
    VmUnsupported(String),

    #[error("{lang} vm failed to initialize: {reason}")]
    VmInit { lang: Lang, reason: String },

    #[error("Amount limit exceeded for {token}: limit {limit}, spent {spent}")]
    AmountLimitExceeded {
        token: String,
        limit: String,
        spent: String,
    },

    #[error("Execution killed: deadline exceeded")]
    Timeout,

    #[error("Gas run out: limit {limit}")]
    GasRunOut { limit: u64 },

    #[error("Reentrance: {0}")]
    Reentrance(String),

    #[error("Permission denied: {0}")]
    Unauthorized(String),

    #[error("Balance not enough: {account} holds {have} {token}, need {need}")]
    InsufficientBalance {
        token: String,
        account: String,
        have: String,
        need: String,
    },

    #[error("Compile error: {0}")]
    Compile(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("State error: {0}")]
    State(#[from] StateError),
}

impl VmError {
    /// Errors that indicate a broken runtime rather than a failing
    /// transaction. These abort the run instead of producing a receipt.
    pub fn is_fatal(&self) -> bool {
        matches!(self, VmError::VmInit { .. } | VmError::State(_))
    }

    /// Receipt status recorded for a transaction that failed with this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            VmError::Timeout => StatusCode::Timeout,
            VmError::GasRunOut { .. } => StatusCode::GasRunOut,
            VmError::InsufficientBalance { .. } => StatusCode::BalanceNotEnough,
            VmError::ArgsArity { .. } | VmError::ArgDecode(_) => StatusCode::Parameter,
            VmError::VmInit { .. } | VmError::State(_) => StatusCode::Unknown,
            _ => StatusCode::Runtime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(VmError::Timeout.status_code(), StatusCode::Timeout);
        assert_eq!(
            VmError::GasRunOut { limit: 10 }.status_code(),
            StatusCode::GasRunOut
        );
        assert_eq!(
            VmError::ArgDecode("x".into()).status_code(),
            StatusCode::Parameter
        );
        assert_eq!(
            VmError::ContractNotFound("c".into()).status_code(),
            StatusCode::Runtime
        );
    }

    #[test]
    fn test_fatal_errors() {
        let init = VmError::VmInit {
            lang: Lang::Script,
            reason: "boom".into(),
        };
        assert!(init.is_fatal());
        assert!(!VmError::Timeout.is_fatal());
        assert!(VmError::State(StateError::Backend("down".into())).is_fatal());
    }
}
