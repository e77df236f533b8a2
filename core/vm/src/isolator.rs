// meridian/core/vm/src/isolator.rs

// Per-transaction execution context bound to one block and one state view
use crate::context::CallFrame;
use crate::costs;
use crate::error::VmError;
use crate::host::Host;
use crate::metrics::{TX_EXECUTIONS_TOTAL, TX_GAS_USED};
use crate::monitor::Monitor;
use meridian_state::{AccessSet, StateError, Visitor};
use meridian_types::{BlockHead, Cost, Receipt, Status, StatusCode, Transaction, TxError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Token transaction fees are paid in.
pub const GAS_TOKEN: &str = "gas";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolatorState {
    Uninitialized,
    Prepared,
    TxBound,
    Executed,
    Committed,
}

#[derive(Error, Debug)]
pub enum IsolatorError {
    #[error("Isolator is {actual:?}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: IsolatorState,
    },

    #[error("Invalid block head: {0}")]
    InvalidBlockHead(String),

    #[error("State view carries uncommitted writes")]
    DirtyVisitor,

    #[error("Invalid transaction: {0}")]
    Tx(#[from] TxError),

    #[error("Transaction expired at block time {0}")]
    Expired(i64),

    #[error("Insufficient balance: {publisher} holds {have} gas, need {need}")]
    InsufficientBalance {
        publisher: String,
        have: i64,
        need: i64,
    },

    #[error("Vm error: {0}")]
    Vm(#[from] VmError),

    #[error("State error: {0}")]
    State(#[from] StateError),
}

impl IsolatorError {
    /// Errors that mean the runtime or the state backend is broken, as
    /// opposed to the transaction being unacceptable.
    pub fn is_fatal(&self) -> bool {
        match self {
            IsolatorError::Vm(e) => e.is_fatal(),
            IsolatorError::State(_) | IsolatorError::InvalidState { .. } => true,
            _ => false,
        }
    }
}

/// Fee for `gas` units at `gas_price`, in raw units of the gas token.
pub fn fee(gas: u64, gas_price: i64) -> i64 {
    let fee = i128::from(gas).saturating_mul(i128::from(gas_price)) / 100;
    i64::try_from(fee.max(0)).unwrap_or(i64::MAX)
}

/// Executes transactions one at a time against a state view.
///
/// Lifecycle: `prepare` binds a block, then per transaction `prepare_tx`,
/// `run`, optionally `pay_cost`, then `commit` or `clear_tx`.
pub struct Isolator {
    monitor: Arc<Monitor>,
    state: IsolatorState,
    head: BlockHead,
    visitor: Option<Visitor>,
    tx: Option<Transaction>,
    receipt: Option<Receipt>,
    deadline: Instant,
    base_cost: Cost,
    paid: bool,
}

impl Isolator {
    pub fn new(monitor: Arc<Monitor>) -> Self {
        Self {
            monitor,
            state: IsolatorState::Uninitialized,
            head: BlockHead::default(),
            visitor: None,
            tx: None,
            receipt: None,
            deadline: Instant::now(),
            base_cost: Cost::zero(),
            paid: false,
        }
    }

    pub fn state(&self) -> IsolatorState {
        self.state
    }

    pub fn head(&self) -> &BlockHead {
        &self.head
    }

    /// Bind a block context and a clean state view.
    pub fn prepare(&mut self, head: BlockHead, visitor: Visitor) -> Result<(), IsolatorError> {
        if head.witness.is_empty() {
            return Err(IsolatorError::InvalidBlockHead("missing witness".to_string()));
        }
        if visitor.has_pending() {
            return Err(IsolatorError::DirtyVisitor);
        }
        debug!("Isolator bound to block {} at {}", head.number, head.time);
        self.head = head;
        self.visitor = Some(visitor);
        self.tx = None;
        self.receipt = None;
        self.state = IsolatorState::Prepared;
        Ok(())
    }

    /// Load a transaction and bound its execution to `limit` from now.
    pub fn prepare_tx(&mut self, tx: Transaction, limit: Duration) -> Result<(), IsolatorError> {
        self.expect(IsolatorState::Prepared, "prepared")?;
        if tx.delay() > 0 && tx.is_defer() {
            return Err(TxError::DelayWithReferredTx.into());
        }
        tx.check_gas()?;
        if tx.is_expired(self.head.time) {
            return Err(IsolatorError::Expired(self.head.time));
        }

        let need = fee(u64::try_from(tx.gas_limit()).unwrap_or(0), tx.gas_price());
        let visitor = self.visitor_mut()?;
        let have = visitor.token_balance(GAS_TOKEN, tx.publisher())?;
        if have < need {
            return Err(IsolatorError::InsufficientBalance {
                publisher: tx.publisher().to_string(),
                have,
                need,
            });
        }

        self.base_cost = costs::net(tx.encode().len());
        self.deadline = Instant::now() + limit;
        self.tx = Some(tx);
        self.receipt = None;
        self.paid = false;
        self.state = IsolatorState::TxBound;
        Ok(())
    }

    /// Execute every action of the bound transaction.
    ///
    /// Failing actions end the transaction with a failure status and discard
    /// its writes; only a broken runtime or state backend is an `Err`.
    pub fn run(&mut self) -> Result<&Receipt, IsolatorError> {
        self.expect(IsolatorState::TxBound, "tx-bound")?;
        let state = self.state;
        let (tx, visitor) = match (self.tx.as_ref(), self.visitor.as_mut()) {
            (Some(tx), Some(visitor)) => (tx, visitor),
            _ => {
                return Err(IsolatorError::InvalidState {
                    expected: "tx-bound",
                    actual: state,
                })
            }
        };

        let gas_limit = u64::try_from(tx.gas_limit()).unwrap_or(0);
        let frame = CallFrame::for_tx(tx, &self.head);
        let mut receipt = Receipt::new(tx.hash());
        let mut host = Host::new(visitor, &self.monitor, frame, self.deadline, gas_limit);

        let mut failure = host.charge(self.base_cost).err();
        if failure.is_none() {
            for action in tx.actions() {
                match host.call_action(action) {
                    Ok(returns) => {
                        receipt.succ_action_num += 1;
                        receipt.returns.extend(returns);
                    }
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
        }
        let used = host.gas_used().min(gas_limit);
        drop(host);

        match failure {
            None => receipt.gas_usage = used,
            Some(e) if e.is_fatal() => {
                visitor.rollback();
                return Err(e.into());
            }
            Some(e) => {
                debug!("Transaction {} failed: {}", tx.hash_hex(), e);
                visitor.rollback();
                receipt.returns.clear();
                receipt.status = Status::new(e.status_code(), e.to_string());
                // Time- and gas-exhausted runs stop at a point that depends
                // on the host, so they are charged the whole limit.
                receipt.gas_usage = match e {
                    VmError::Timeout | VmError::GasRunOut { .. } => gas_limit,
                    _ => used,
                };
            }
        }

        TX_EXECUTIONS_TOTAL
            .with_label_values(&[&format!("{:?}", receipt.status.code)])
            .inc();
        TX_GAS_USED.observe(receipt.gas_usage as f64);

        self.state = IsolatorState::Executed;
        Ok(self.receipt.insert(receipt))
    }

    /// Debit the fee for the executed transaction from its publisher.
    pub fn pay_cost(&mut self) -> Result<(), IsolatorError> {
        self.expect(IsolatorState::Executed, "executed")?;
        if self.paid {
            return Err(self.invalid("executed and unpaid"));
        }
        let state = self.state;
        let (tx, receipt, visitor) =
            match (self.tx.as_ref(), self.receipt.as_ref(), self.visitor.as_mut()) {
                (Some(tx), Some(receipt), Some(visitor)) => (tx, receipt, visitor),
                _ => {
                    return Err(IsolatorError::InvalidState {
                        expected: "executed",
                        actual: state,
                    })
                }
            };

        let need = fee(receipt.gas_usage, tx.gas_price());
        let have = visitor.token_balance(GAS_TOKEN, tx.publisher())?;
        if have < need {
            warn!(
                "Publisher {} cannot pay {} for {}",
                tx.publisher(),
                need,
                tx.hash_hex()
            );
            return Err(IsolatorError::InsufficientBalance {
                publisher: tx.publisher().to_string(),
                have,
                need,
            });
        }
        visitor.set_token_balance(GAS_TOKEN, tx.publisher(), have - need);
        self.paid = true;
        Ok(())
    }

    /// Apply the transaction's writes to the store.
    pub fn commit(&mut self) -> Result<(), IsolatorError> {
        self.expect(IsolatorState::Executed, "executed")?;
        self.visitor_mut()?.commit()?;
        self.state = IsolatorState::Committed;
        Ok(())
    }

    /// Drop the bound transaction and any uncommitted writes.
    pub fn clear_tx(&mut self) {
        if let Some(visitor) = self.visitor.as_mut() {
            visitor.reset();
        }
        self.tx = None;
        self.receipt = None;
        self.paid = false;
        if self.state != IsolatorState::Uninitialized {
            self.state = IsolatorState::Prepared;
        }
    }

    pub fn tx(&self) -> Option<&Transaction> {
        self.tx.as_ref()
    }

    pub fn receipt(&self) -> Option<&Receipt> {
        self.receipt.as_ref()
    }

    /// Keys the current transaction read and wrote so far.
    pub fn access_set(&self) -> AccessSet {
        self.visitor
            .as_ref()
            .map(Visitor::access_set)
            .unwrap_or_default()
    }

    /// Whether the executed transaction ran out of time.
    pub fn timed_out(&self) -> bool {
        self.receipt
            .as_ref()
            .map_or(false, |r| r.status.code == StatusCode::Timeout)
    }

    fn expect(&self, state: IsolatorState, name: &'static str) -> Result<(), IsolatorError> {
        if self.state == state {
            Ok(())
        } else {
            Err(self.invalid(name))
        }
    }

    fn invalid(&self, expected: &'static str) -> IsolatorError {
        IsolatorError::InvalidState {
            expected,
            actual: self.state,
        }
    }

    fn visitor_mut(&mut self) -> Result<&mut Visitor, IsolatorError> {
        let state = self.state;
        self.visitor.as_mut().ok_or(IsolatorError::InvalidState {
            expected: "prepared",
            actual: state,
        })
    }
}
