// meridian/core/vm/src/context.rs

use meridian_types::{Amount, BlockHead, Transaction};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// One entry of the call-context stack.
///
/// Nested frames start as a clone of the enclosing frame and override the
/// fields that change. Signers and limits are shared across the stack.
#[derive(Debug, Clone, Default)]
pub struct CallFrame {
    pub contract: String,
    pub api: String,
    /// Contract that issued this call; empty for a transaction action
    pub caller: String,
    /// 1 for a transaction action, +1 per nested inter-contract call
    pub stack_height: usize,
    /// Accounts that authorised the transaction, sorted
    pub signers: Arc<BTreeSet<String>>,
    /// Caller-supplied amount limits
    pub amount_limit: Arc<Vec<Amount>>,
    pub publisher: String,
    pub gas_price: i64,
    pub tx_hash: String,
    pub time: i64,
    pub witness: String,
    /// Open-ended metadata set by host calls
    pub extensions: BTreeMap<String, String>,
}

impl CallFrame {
    /// Root frame for executing `tx` in the block headed by `head`.
    pub fn for_tx(tx: &Transaction, head: &BlockHead) -> Self {
        let mut signers: BTreeSet<String> = tx
            .signers()
            .iter()
            .map(|s| account_of(s).to_string())
            .collect();
        if !tx.publisher().is_empty() {
            signers.insert(tx.publisher().to_string());
        }

        Self {
            signers: Arc::new(signers),
            amount_limit: Arc::new(tx.amount_limit().to_vec()),
            publisher: tx.publisher().to_string(),
            gas_price: tx.gas_price(),
            tx_hash: tx.hash_hex(),
            time: head.time,
            witness: head.witness.clone(),
            ..Self::default()
        }
    }

    pub fn is_signer(&self, account: &str) -> bool {
        self.signers.contains(account)
    }

    /// An account may be debited by a signer or by the contract it names
    /// when that contract is the direct caller.
    pub fn is_authorized(&self, account: &str) -> bool {
        self.is_signer(account) || (!self.caller.is_empty() && self.caller == account)
    }
}

/// Signer entries may carry a permission suffix, `account@perm`.
fn account_of(signer: &str) -> &str {
    signer.split('@').next().unwrap_or(signer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_types::Action;

    #[test]
    fn test_root_frame_from_tx() {
        let mut tx = Transaction::new(
            vec![Action::new("c", "f", "[]")],
            vec!["alice@active".into(), "bob".into()],
            1000,
            100,
            1,
            2,
            0,
        )
        .with_amount_limit(vec![Amount::new("coin", "10")]);
        tx.sign_publish("carol", &[], vec![]);
        let head = BlockHead {
            witness: "w".into(),
            time: 5,
            ..BlockHead::default()
        };

        let frame = CallFrame::for_tx(&tx, &head);
        let signers: Vec<&str> = frame.signers.iter().map(String::as_str).collect();
        assert_eq!(signers, vec!["alice", "bob", "carol"]);
        assert_eq!(frame.publisher, "carol");
        assert_eq!(frame.amount_limit.len(), 1);
        assert_eq!(frame.tx_hash, tx.hash_hex());
        assert_eq!(frame.time, 5);
        assert_eq!(frame.stack_height, 0);
    }

    #[test]
    fn test_caller_authority() {
        let mut frame = CallFrame::default();
        assert!(!frame.is_authorized("Contract1"));
        frame.caller = "Contract1".into();
        assert!(frame.is_authorized("Contract1"));
        assert!(!frame.is_authorized("alice"));
    }
}
