// meridian/core/verifier/src/batcher.rs

// Parallel batch execution with ordered validation.
//
// Every transaction of a batch first runs on its own state overlay against
// the pre-batch state, one blocking worker each. The batch is then settled
// in order: a transaction whose read or write keys overlap the writes of an
// already committed predecessor is run again on the updated state, every
// other one keeps its speculative result. Receipts therefore match a serial
// run in batch order regardless of how many workers were used.
use crate::error::VerifyError;
use crate::metrics::BATCH_REEXECUTIONS_TOTAL;
use crate::provider::Provider;
use futures::future::join_all;
use meridian_state::{AccessSet, Store, Visitor};
use meridian_types::{BlockHead, Receipt, Transaction};
use meridian_vm::{Isolator, Monitor};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

type Work<T> =
    Arc<dyn Fn(&mut Isolator, &T, Duration) -> Result<(), VerifyError> + Send + Sync>;

/// Outcome of one batch pulled during generation.
#[derive(Debug, Default)]
pub struct Batch {
    /// Committed transactions, in order
    pub txs: Vec<Transaction>,
    pub receipts: Vec<Receipt>,
    /// Transactions that could not be included, with the reason
    pub rejected: Vec<(Transaction, String)>,
    /// Timed-out transactions that never had the full budget
    pub returned: Vec<Transaction>,
}

impl Batch {
    /// True when the provider had nothing to offer.
    pub fn is_empty(&self) -> bool {
        self.txs.is_empty() && self.rejected.is_empty() && self.returned.is_empty()
    }
}

/// One isolated execution of an item.
struct Attempt<T> {
    item: T,
    isolator: Isolator,
    result: Result<(), VerifyError>,
    access: AccessSet,
    /// Time budget the item ran with
    limit: Duration,
}

pub struct Batcher {
    monitor: Arc<Monitor>,
}

impl Batcher {
    pub fn new(monitor: Arc<Monitor>) -> Self {
        Self { monitor }
    }

    /// Pull up to `thread` transactions from `provider`, execute them in
    /// parallel and commit the includable ones to `store`.
    ///
    /// Every execution, re-runs included, gets what is left until `deadline`
    /// capped at `full_limit`. A timeout under a shorter budget is not the
    /// transaction's fault, so it is returned rather than included.
    ///
    /// On a fatal error every pulled transaction is handed back to
    /// `provider` before the error is returned.
    pub async fn batch(
        &self,
        head: &BlockHead,
        store: Arc<dyn Store>,
        provider: &dyn Provider,
        deadline: Instant,
        full_limit: Duration,
        thread: usize,
    ) -> Result<Batch, VerifyError> {
        let mut pulled = Vec::with_capacity(thread);
        while pulled.len() < thread.max(1) {
            match provider.next() {
                Some(tx) => pulled.push(tx),
                None => break,
            }
        }
        if pulled.is_empty() {
            return Ok(Batch::default());
        }

        match self
            .run_batch(head, store, pulled.clone(), deadline, full_limit, thread)
            .await
        {
            Ok(batch) => Ok(batch),
            Err(e) => {
                warn!("Batch aborted, returning {} transactions: {}", pulled.len(), e);
                for tx in pulled {
                    provider.ret(tx);
                }
                Err(e)
            }
        }
    }

    async fn run_batch(
        &self,
        head: &BlockHead,
        store: Arc<dyn Store>,
        pulled: Vec<Transaction>,
        deadline: Instant,
        full_limit: Duration,
        thread: usize,
    ) -> Result<Batch, VerifyError> {
        let budget = || {
            deadline
                .saturating_duration_since(Instant::now())
                .min(full_limit)
        };
        let work: Work<Transaction> = Arc::new(
            |isolator: &mut Isolator, tx: &Transaction, limit: Duration| {
                isolator.prepare_tx(tx.clone(), limit)?;
                isolator.run()?;
                isolator.pay_cost()?;
                Ok(())
            },
        );
        let attempts = self
            .speculate(head, &store, pulled, &work, thread, budget())
            .await?;

        let mut batch = Batch::default();
        self.settle(head, &store, attempts, &work, budget, |attempt| {
            let tx = attempt.item.clone();
            match std::mem::replace(&mut attempt.result, Ok(())) {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    batch.rejected.push((tx, e.to_string()));
                    return Ok(false);
                }
            }
            if attempt.limit < full_limit && attempt.isolator.timed_out() {
                debug!(
                    "Returning starved transaction {} with {:?} left",
                    tx.hash_hex(),
                    attempt.limit
                );
                batch.returned.push(tx);
                return Ok(false);
            }
            let receipt = attempt.isolator.receipt().cloned().ok_or_else(|| {
                VerifyError::Worker(format!("no receipt for {}", tx.hash_hex()))
            })?;
            batch.txs.push(tx);
            batch.receipts.push(receipt);
            Ok(true)
        })?;

        debug!(
            "Batch settled: {} included, {} rejected, {} returned",
            batch.txs.len(),
            batch.rejected.len(),
            batch.returned.len()
        );
        Ok(batch)
    }

    /// Re-run a recorded batch with `verify_fn` applied to every
    /// (transaction, receipt) pair, committing each verified transaction.
    /// At most `width` pairs run at once.
    pub async fn verify<F>(
        &self,
        head: &BlockHead,
        store: Arc<dyn Store>,
        verify_fn: F,
        txs: &[Transaction],
        receipts: &[Receipt],
        width: usize,
    ) -> Result<(), VerifyError>
    where
        F: Fn(&mut Isolator, &Transaction, &Receipt) -> Result<(), VerifyError>
            + Send
            + Sync
            + 'static,
    {
        if txs.len() != receipts.len() {
            return Err(VerifyError::ReceiptCount {
                txs: txs.len(),
                receipts: receipts.len(),
            });
        }
        let pairs: Vec<(Transaction, Receipt)> = txs
            .iter()
            .cloned()
            .zip(receipts.iter().cloned())
            .collect();
        // Verification derives its own budget from the claimed receipt.
        let work: Work<(Transaction, Receipt)> = Arc::new(
            move |isolator: &mut Isolator, (tx, receipt): &(Transaction, Receipt), _: Duration| {
                verify_fn(isolator, tx, receipt)
            },
        );

        let attempts = self
            .speculate(head, &store, pairs, &work, width, Duration::ZERO)
            .await?;
        self.settle(head, &store, attempts, &work, || Duration::ZERO, |attempt| {
            std::mem::replace(&mut attempt.result, Ok(())).map(|_| true)
        })
    }

    /// Run items on blocking workers against the current state, `width` at
    /// a time, each with `limit`.
    async fn speculate<T>(
        &self,
        head: &BlockHead,
        store: &Arc<dyn Store>,
        items: Vec<T>,
        work: &Work<T>,
        width: usize,
        limit: Duration,
    ) -> Result<Vec<Attempt<T>>, VerifyError>
    where
        T: Send + 'static,
    {
        let mut attempts = Vec::with_capacity(items.len());
        let mut items = items.into_iter().peekable();
        while items.peek().is_some() {
            let handles: Vec<_> = items
                .by_ref()
                .take(width.max(1))
                .map(|item| {
                    let monitor = self.monitor.clone();
                    let head = head.clone();
                    let store = store.clone();
                    let work = work.clone();
                    tokio::task::spawn_blocking(move || {
                        attempt(monitor, head, store, item, &work, limit)
                    })
                })
                .collect();

            for joined in join_all(handles).await {
                attempts.push(joined.map_err(|e| VerifyError::Worker(e.to_string()))?);
            }
        }
        Ok(attempts)
    }

    /// Walk attempts in order. `accept` decides whether an attempt commits;
    /// attempts that overlap committed writes are re-run first with
    /// `budget()`.
    fn settle<T, B, F>(
        &self,
        head: &BlockHead,
        store: &Arc<dyn Store>,
        attempts: Vec<Attempt<T>>,
        work: &Work<T>,
        budget: B,
        mut accept: F,
    ) -> Result<(), VerifyError>
    where
        B: Fn() -> Duration,
        F: FnMut(&mut Attempt<T>) -> Result<bool, VerifyError>,
    {
        let mut committed = AccessSet::default();
        for attempt in attempts {
            let mut attempt = if attempt.access.touches(&committed.writes) {
                BATCH_REEXECUTIONS_TOTAL.inc();
                self::attempt(
                    self.monitor.clone(),
                    head.clone(),
                    store.clone(),
                    attempt.item,
                    work,
                    budget(),
                )
            } else {
                attempt
            };

            if accept(&mut attempt)? {
                attempt.isolator.commit()?;
                committed.merge(&attempt.access);
            }
        }
        Ok(())
    }
}

fn attempt<T>(
    monitor: Arc<Monitor>,
    head: BlockHead,
    store: Arc<dyn Store>,
    item: T,
    work: &Work<T>,
    limit: Duration,
) -> Attempt<T> {
    let mut isolator = Isolator::new(monitor);
    let result = isolator
        .prepare(head, Visitor::new(store))
        .map_err(VerifyError::from)
        .and_then(|_| work(&mut isolator, &item, limit));
    if let Err(e) = &result {
        debug!("Isolated execution failed: {}", e);
    }
    let access = isolator.access_set();
    Attempt {
        item,
        isolator,
        result,
        access,
        limit,
    }
}
