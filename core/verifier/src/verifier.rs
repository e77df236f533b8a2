// meridian/core/verifier/src/verifier.rs

// Block generation and verification controller
use crate::batcher::Batcher;
use crate::config::{Config, Mode};
use crate::error::VerifyError;
use crate::info::Info;
use crate::metrics::{
    BLOCKS_GENERATED_TOTAL, BLOCK_PHASE_SECONDS, BLOCK_VERIFICATIONS_TOTAL, TXS_DROPPED_TOTAL,
    TXS_RETURNED_TOTAL,
};
use crate::provider::Provider;
use meridian_state::{Store, Visitor};
use meridian_types::{Block, BlockHead, Receipt, Transaction};
use meridian_vm::{install_system_contracts, Isolator, Monitor};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Re-execute `tx` on `isolator` and require the result to match `claimed`,
/// then pay its cost. The caller commits.
///
/// A claimed timeout is replayed with half the nominal budget, anything else
/// with double, so honest generation jitter does not flip the outcome.
pub fn verify(
    isolator: &mut Isolator,
    tx: &Transaction,
    claimed: &Receipt,
    nominal: Duration,
) -> Result<(), VerifyError> {
    let limit = if claimed.status.is_timeout() {
        nominal / 2
    } else {
        nominal * 2
    };
    isolator.prepare_tx(tx.clone(), limit)?;
    let receipt = isolator.run()?;
    if !receipt.matches(claimed) {
        return Err(VerifyError::ReceiptMismatch {
            expected: claimed.to_string(),
            got: receipt.to_string(),
        });
    }
    isolator.pay_cost()?;
    Ok(())
}

fn check_signatures(tx: &Transaction) -> Result<(), VerifyError> {
    tx.verify_self().map_err(|source| VerifyError::Tx {
        hash: tx.hash_hex(),
        source,
    })
}

/// Produces and checks blocks against a shared store.
pub struct Verifier {
    monitor: Arc<Monitor>,
    batcher: Batcher,
}

impl Verifier {
    /// Build a verifier, installing the built-in contracts into `store` if
    /// they are missing.
    pub fn new(monitor: Arc<Monitor>, store: &Arc<dyn Store>) -> Result<Self, VerifyError> {
        let mut visitor = Visitor::new(store.clone());
        if install_system_contracts(&mut visitor)? > 0 {
            visitor.commit()?;
        }
        Ok(Self {
            batcher: Batcher::new(monitor.clone()),
            monitor,
        })
    }

    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    /// Fill `block` with transactions from `provider`, committing their
    /// effects to `store`, and record the strategy in the block head.
    ///
    /// A fatal error hands every transaction taken for this block back to
    /// `provider` and leaves `block` without them.
    pub async fn gen(
        &self,
        block: &mut Block,
        store: Arc<dyn Store>,
        provider: &dyn Provider,
        config: &Config,
    ) -> Result<(), VerifyError> {
        config.validate().map_err(VerifyError::Config)?;
        let started = Instant::now();
        let base = block.txs.len();
        let result = match config.mode {
            Mode::Serial => self.gen_serial(block, store, provider, config),
            Mode::Batch => self.gen_batch(block, store, provider, config).await,
        };
        let info = match result {
            Ok(info) => info,
            Err(e) => {
                block.txs.truncate(base);
                block.receipts.truncate(base);
                return Err(e);
            }
        };
        block.head.info = info.encode()?;

        let mode = info.mode.to_string();
        BLOCKS_GENERATED_TOTAL
            .with_label_values(&[mode.as_str()])
            .inc();
        BLOCK_PHASE_SECONDS
            .with_label_values(&["gen"])
            .observe(started.elapsed().as_secs_f64());
        info!(
            "Generated block {} with {} transactions in {:?}",
            block.head.number,
            block.txs.len(),
            started.elapsed()
        );
        Ok(())
    }

    fn gen_serial(
        &self,
        block: &mut Block,
        store: Arc<dyn Store>,
        provider: &dyn Provider,
        config: &Config,
    ) -> Result<Info, VerifyError> {
        let deadline = Instant::now() + config.timeout();
        let full_limit = config.tx_time_limit();
        let mut isolator = Isolator::new(self.monitor.clone());
        isolator.prepare(block.head.clone(), Visitor::new(store))?;

        let mut included = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let Some(tx) = provider.next() else {
                break;
            };
            let limit = remaining.min(full_limit);

            let receipt = match execute(&mut isolator, &tx, limit) {
                Ok(receipt) => receipt,
                Err(e) if e.is_fatal() => {
                    isolator.clear_tx();
                    included.push(tx);
                    return Err(abort(provider, included, e));
                }
                Err(e) => {
                    isolator.clear_tx();
                    reject(provider, &tx, e);
                    continue;
                }
            };
            if receipt.status.is_timeout() && limit < full_limit {
                isolator.clear_tx();
                debug!("Returning {} with {:?} left", tx.hash_hex(), limit);
                TXS_RETURNED_TOTAL.inc();
                provider.ret(tx);
                break;
            }
            let paid = isolator
                .pay_cost()
                .and_then(|_| isolator.commit())
                .map_err(VerifyError::from);
            isolator.clear_tx();
            match paid {
                Ok(()) => {}
                Err(e) if e.is_fatal() => {
                    included.push(tx);
                    return Err(abort(provider, included, e));
                }
                Err(e) => {
                    reject(provider, &tx, e);
                    continue;
                }
            }

            block.txs.push(tx.clone());
            block.receipts.push(receipt);
            included.push(tx);
        }

        for tx in &included {
            provider.drop(tx, None);
        }
        Ok(Info::serial())
    }

    async fn gen_batch(
        &self,
        block: &mut Block,
        store: Arc<dyn Store>,
        provider: &dyn Provider,
        config: &Config,
    ) -> Result<Info, VerifyError> {
        // Fail on a bad head before any transaction is pulled.
        Isolator::new(self.monitor.clone())
            .prepare(block.head.clone(), Visitor::new(store.clone()))?;

        let deadline = Instant::now() + config.timeout();
        let full_limit = config.tx_time_limit();
        let source = Checked(provider);
        let mut sizes = Vec::new();
        let mut included = Vec::new();
        loop {
            if Instant::now() >= deadline {
                break;
            }
            let batch = match self
                .batcher
                .batch(&block.head, store.clone(), &source, deadline, full_limit, config.thread)
                .await
            {
                Ok(batch) => batch,
                Err(e) => return Err(abort(provider, included, e)),
            };
            if batch.is_empty() {
                break;
            }

            for (tx, err) in &batch.rejected {
                TXS_DROPPED_TOTAL.inc();
                provider.drop(tx, Some(err.clone()));
            }
            let starved = !batch.returned.is_empty();
            for tx in batch.returned {
                TXS_RETURNED_TOTAL.inc();
                provider.ret(tx);
            }
            if !batch.txs.is_empty() {
                sizes.push(batch.txs.len());
                included.extend(batch.txs.iter().cloned());
                block.txs.extend(batch.txs);
                block.receipts.extend(batch.receipts);
            }
            if starved {
                break;
            }
        }

        for tx in &included {
            provider.drop(tx, None);
        }
        Ok(Info::batched(config.thread, sizes))
    }

    /// Check that replaying `block` on `store` reproduces its receipts,
    /// committing each verified transaction.
    pub async fn verify(
        &self,
        block: &Block,
        store: Arc<dyn Store>,
        config: &Config,
    ) -> Result<(), VerifyError> {
        config.validate().map_err(VerifyError::Config)?;
        let started = Instant::now();
        let info = Info::decode(&block.head.info)?;
        let result = self.verify_with(block, store, config, &info).await;

        let mode = info.mode.to_string();
        let outcome = if result.is_ok() { "ok" } else { "fail" };
        BLOCK_VERIFICATIONS_TOTAL
            .with_label_values(&[mode.as_str(), outcome])
            .inc();
        BLOCK_PHASE_SECONDS
            .with_label_values(&["verify"])
            .observe(started.elapsed().as_secs_f64());
        if let Err(e) = &result {
            warn!("Block {} failed verification: {}", block.head.number, e);
        }
        result
    }

    async fn verify_with(
        &self,
        block: &Block,
        store: Arc<dyn Store>,
        config: &Config,
        info: &Info,
    ) -> Result<(), VerifyError> {
        if block.txs.len() != block.receipts.len() {
            return Err(VerifyError::ReceiptCount {
                txs: block.txs.len(),
                receipts: block.receipts.len(),
            });
        }
        for tx in &block.txs {
            check_signatures(tx)?;
        }
        let nominal = config.tx_time_limit();

        match Mode::from_code(info.mode) {
            Some(Mode::Serial) => {
                let mut isolator = Isolator::new(self.monitor.clone());
                isolator.prepare(block.head.clone(), Visitor::new(store))?;
                for (tx, receipt) in block.txs.iter().zip(&block.receipts) {
                    verify(&mut isolator, tx, receipt, nominal)?;
                    isolator.commit()?;
                    isolator.clear_tx();
                }
                Ok(())
            }
            Some(Mode::Batch) => {
                for (start, end) in info.batch_ranges(block.txs.len())? {
                    self.batcher
                        .verify(
                            &block.head,
                            store.clone(),
                            move |isolator, tx, receipt| verify(isolator, tx, receipt, nominal),
                            &block.txs[start..end],
                            &block.receipts[start..end],
                            info.thread,
                        )
                        .await?;
                }
                Ok(())
            }
            None => Err(VerifyError::UnknownMode(info.mode)),
        }
    }

    /// Execute one transaction against `store` outside any block and commit
    /// it. Pass a forked store for a dry run.
    pub fn exec(
        &self,
        head: &BlockHead,
        store: Arc<dyn Store>,
        tx: Transaction,
        limit: Duration,
    ) -> Result<Receipt, VerifyError> {
        let mut isolator = Isolator::new(self.monitor.clone());
        isolator.prepare(head.clone(), Visitor::new(store))?;
        let receipt = execute(&mut isolator, &tx, limit)?;
        isolator.pay_cost()?;
        isolator.commit()?;
        Ok(receipt)
    }
}

/// Bind and run `tx`, leaving it executed but unpaid.
fn execute(
    isolator: &mut Isolator,
    tx: &Transaction,
    limit: Duration,
) -> Result<Receipt, VerifyError> {
    check_signatures(tx)?;
    isolator.prepare_tx(tx.clone(), limit)?;
    Ok(isolator.run()?.clone())
}

/// Hand `pending` back to `provider` after a fatal error.
fn abort(provider: &dyn Provider, pending: Vec<Transaction>, err: VerifyError) -> VerifyError {
    warn!(
        "Generation aborted, returning {} transactions: {}",
        pending.len(),
        err
    );
    for tx in pending {
        TXS_RETURNED_TOTAL.inc();
        provider.ret(tx);
    }
    err
}

fn reject(provider: &dyn Provider, tx: &Transaction, err: VerifyError) {
    debug!("Rejecting {}: {}", tx.hash_hex(), err);
    TXS_DROPPED_TOTAL.inc();
    provider.drop(tx, Some(err.to_string()));
}

/// Provider view that drops transactions with bad signatures before they
/// reach a batch.
struct Checked<'a>(&'a dyn Provider);

impl Provider for Checked<'_> {
    fn next(&self) -> Option<Transaction> {
        loop {
            let tx = self.0.next()?;
            match check_signatures(&tx) {
                Ok(()) => return Some(tx),
                Err(e) => reject(self.0, &tx, e),
            }
        }
    }

    fn drop(&self, tx: &Transaction, err: Option<String>) {
        self.0.drop(tx, err)
    }

    fn ret(&self, tx: Transaction) {
        self.0.ret(tx)
    }

    fn list(&self) -> Vec<(Transaction, String)> {
        self.0.list()
    }
}
