// meridian/core/verifier/src/provider.rs

// Transaction source consulted during block generation
use meridian_types::Transaction;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Where generation pulls transactions from and reports their fate.
pub trait Provider: Send + Sync {
    /// Next candidate transaction, if any.
    fn next(&self) -> Option<Transaction>;

    /// Release `tx`. `err` is set when it was rejected.
    fn drop(&self, tx: &Transaction, err: Option<String>);

    /// Put `tx` back for a later block.
    fn ret(&self, tx: Transaction);

    /// Transactions rejected so far, with their errors.
    fn list(&self) -> Vec<(Transaction, String)>;
}

struct Inner<I> {
    source: I,
    returned: VecDeque<Transaction>,
    in_flight: HashMap<[u8; 32], Transaction>,
    dropped: Vec<(Transaction, String)>,
}

/// Provider over any transaction iterator. Returned transactions are served
/// again before the iterator is advanced.
pub struct IterProvider<I> {
    inner: Mutex<Inner<I>>,
}

impl<I> IterProvider<I>
where
    I: Iterator<Item = Transaction> + Send,
{
    pub fn new(source: I) -> Self {
        Self {
            inner: Mutex::new(Inner {
                source,
                returned: VecDeque::new(),
                in_flight: HashMap::new(),
                dropped: Vec::new(),
            }),
        }
    }

    /// Transactions handed out and not yet dropped or returned.
    pub fn in_flight(&self) -> usize {
        self.inner.lock().in_flight.len()
    }
}

impl<I> Provider for IterProvider<I>
where
    I: Iterator<Item = Transaction> + Send,
{
    fn next(&self) -> Option<Transaction> {
        let mut inner = self.inner.lock();
        let tx = match inner.returned.pop_front() {
            Some(tx) => tx,
            None => inner.source.next()?,
        };
        inner.in_flight.insert(tx.hash(), tx.clone());
        Some(tx)
    }

    fn drop(&self, tx: &Transaction, err: Option<String>) {
        let mut inner = self.inner.lock();
        inner.in_flight.remove(&tx.hash());
        if let Some(err) = err {
            debug!("Dropping transaction {}: {}", tx.hash_hex(), err);
            inner.dropped.push((tx.clone(), err));
        }
    }

    fn ret(&self, tx: Transaction) {
        let mut inner = self.inner.lock();
        inner.in_flight.remove(&tx.hash());
        inner.returned.push_back(tx);
    }

    fn list(&self) -> Vec<(Transaction, String)> {
        self.inner.lock().dropped.clone()
    }
}
