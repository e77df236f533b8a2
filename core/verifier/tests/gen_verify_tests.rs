// meridian/core/verifier/tests/gen_verify_tests.rs

use meridian_state::{MemoryStore, Store, Visitor};
use meridian_types::{Action, Block, BlockHead, Contract, KeyPair, Lang, StatusCode, Transaction};
use meridian_verifier::{Config, Info, IterProvider, Provider, Verifier, VerifyError};
use meridian_vm::native::system::contract_id;
use meridian_vm::{Arg, Host, IsolatorError, Monitor, Vm, VmError};
use meridian_vm::{GAS_TOKEN, SYSTEM_CONTRACT, TOKEN_CONTRACT};
use std::sync::Arc;
use std::time::{Duration, Instant};

type TxSource = IterProvider<std::vec::IntoIter<Transaction>>;

const NOW: i64 = 1_700_000_000_000_000_000;

const SPINNER: &str = r#"{
    "info": {"lang": "script", "version": "1.0", "abi": [{"name": "spin", "args": []}]},
    "code": "{\"spin\":[{\"op\":\"burn\",\"steps\":100000000000000}]}"
}"#;

fn key() -> KeyPair {
    KeyPair::from_seed([7; 32])
}

fn head() -> BlockHead {
    BlockHead {
        number: 1,
        witness: "w".into(),
        time: NOW,
        ..BlockHead::default()
    }
}

fn signed(actions: Vec<Action>, publisher: &str, gas_limit: i64, nonce: i64) -> Transaction {
    let mut tx = Transaction::new(
        actions,
        vec![publisher.to_string()],
        gas_limit,
        100,
        NOW - nonce,
        NOW + 30_000_000_000,
        0,
    );
    tx.sign_publish(publisher, &[key()], vec![]);
    tx
}

fn transfer(from: &str, to: &str, amount: &str, nonce: i64) -> Transaction {
    let data = format!(r#"["{}", "{}", "{}", "{}"]"#, GAS_TOKEN, from, to, amount);
    signed(
        vec![Action::new(TOKEN_CONTRACT, "transfer", data)],
        from,
        100_000,
        nonce,
    )
}

struct Node {
    store: Arc<MemoryStore>,
    verifier: Verifier,
}

impl Node {
    fn new(accounts: &[&str]) -> Self {
        let store = Arc::new(MemoryStore::new());
        let shared: Arc<dyn Store> = store.clone();
        let verifier = Verifier::new(Arc::new(Monitor::new()), &shared).unwrap();

        let mut v = Visitor::new(shared);
        v.set_decimal(GAS_TOKEN, 0);
        v.set_token_balance(GAS_TOKEN, "deployer", 1_000_000_000_000);
        for account in accounts {
            v.set_token_balance(GAS_TOKEN, account, 1_000_000_000_000);
        }
        v.commit().unwrap();
        Self { store, verifier }
    }

    fn shared(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    /// Independent copy of the current state.
    fn fork(&self) -> Arc<MemoryStore> {
        Arc::new(self.store.fork())
    }

    fn balance(&self, account: &str) -> i64 {
        Visitor::new(self.shared())
            .token_balance(GAS_TOKEN, account)
            .unwrap()
    }

    fn deploy_spinner(&self) -> String {
        let tx = signed(
            vec![Action::new(SYSTEM_CONTRACT, "set_code", format!("[{}]", SPINNER))],
            "deployer",
            100_000,
            1_000,
        );
        let id = contract_id(&tx.hash_hex());
        let receipt = self
            .verifier
            .exec(&head(), self.shared(), tx, Duration::from_secs(2))
            .unwrap();
        assert!(receipt.status.is_success(), "{}", receipt);
        id
    }

    async fn gen(&self, txs: Vec<Transaction>, config: &Config) -> (Block, TxSource) {
        let provider = IterProvider::new(txs.into_iter());
        let block = gen_with(&self.verifier, self.shared(), &provider, config)
            .await
            .unwrap();
        (block, provider)
    }
}

async fn gen_with(
    verifier: &Verifier,
    store: Arc<dyn Store>,
    provider: &TxSource,
    config: &Config,
) -> Result<Block, VerifyError> {
    let mut block = Block::new(head());
    verifier.gen(&mut block, store, provider, config).await?;
    Ok(block)
}

/// Script runtime that cannot start.
struct BrokenVm;

impl Vm for BrokenVm {
    fn init(&self) -> Result<(), VmError> {
        Err(VmError::VmInit {
            lang: Lang::Script,
            reason: "no interpreter".into(),
        })
    }

    fn load_and_call(
        &self,
        _host: &mut Host<'_>,
        _contract: &Contract,
        _api: &str,
        _args: &[Arg],
    ) -> Result<Vec<String>, VmError> {
        Ok(vec![])
    }

    fn compile(&self, contract: &Contract) -> Result<String, VmError> {
        Ok(contract.code.clone())
    }
}

fn spin(contract: &str, nonce: i64) -> Transaction {
    signed(
        vec![Action::new(contract, "spin", "[]")],
        "spinner",
        1_000_000_000,
        nonce,
    )
}

fn users(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("u{}", i)).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn serial_block_replays_on_pre_state() {
    let node = Node::new(&["u0", "u1"]);
    let pre = node.fork();
    let config = Config::serial(Duration::from_secs(5), Duration::from_millis(500));

    let txs = vec![
        transfer("u0", "r0", "10", 1),
        transfer("u1", "r1", "20", 2),
        transfer("u0", "r1", "5", 3),
    ];
    let (block, provider) = node.gen(txs, &config).await;

    assert_eq!(block.txs.len(), 3);
    assert_eq!(Info::decode(&block.head.info).unwrap(), Info::serial());
    assert!(block.receipts.iter().all(|r| r.status.is_success()));
    assert_eq!(provider.in_flight(), 0);
    assert!(provider.list().is_empty());
    assert_eq!(node.balance("r1"), 25);

    node.verifier.verify(&block, pre.clone(), &config).await.unwrap();
    assert_eq!(pre.dump(), node.store.dump());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn batched_block_of_independent_transfers() {
    let names = users(10);
    let accounts: Vec<&str> = names.iter().map(String::as_str).collect();
    let node = Node::new(&accounts);
    let pre = node.fork();
    let config = Config::batch(Duration::from_secs(5), Duration::from_millis(500), 4);

    let txs = names
        .iter()
        .enumerate()
        .map(|(i, name)| transfer(name, &format!("r{}", i), "7", i as i64))
        .collect();
    let (block, _) = node.gen(txs, &config).await;

    let info = Info::decode(&block.head.info).unwrap();
    assert_eq!(info.mode, 1);
    assert_eq!(info.thread, 4);
    assert_eq!(info.batch.iter().sum::<usize>(), 10);
    assert!(info.batch.iter().all(|&size| size > 0 && size <= 4));
    assert_eq!(block.receipts.len(), 10);
    for i in 0..10 {
        assert_eq!(node.balance(&format!("r{}", i)), 7);
    }

    node.verifier.verify(&block, pre.clone(), &config).await.unwrap();
    assert_eq!(pre.dump(), node.store.dump());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn batched_conflicts_match_serial_order() {
    let node = Node::new(&["u0"]);
    let pre = node.fork();
    let config = Config::batch(Duration::from_secs(5), Duration::from_millis(500), 3);

    let txs = (0..6).map(|i| transfer("u0", "r0", "3", i)).collect();
    let (block, _) = node.gen(txs, &config).await;

    assert_eq!(block.txs.len(), 6);
    assert!(block.receipts.iter().all(|r| r.status.is_success()));
    assert_eq!(node.balance("r0"), 18);

    node.verifier.verify(&block, pre.clone(), &config).await.unwrap();
    assert_eq!(pre.dump(), node.store.dump());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_transactions_are_included_and_pay() {
    let node = Node::new(&["u0"]);
    let pre = node.fork();
    let config = Config::serial(Duration::from_secs(5), Duration::from_millis(500));

    let (block, _) = node
        .gen(vec![transfer("u0", "r0", "99999999999999", 1)], &config)
        .await;

    assert_eq!(block.txs.len(), 1);
    assert_eq!(block.receipts[0].status.code, StatusCode::BalanceNotEnough);
    assert_eq!(node.balance("r0"), 0);
    assert!(node.balance("u0") < 1_000_000_000_000);

    node.verifier.verify(&block, pre, &config).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rejected_transactions_are_dropped_with_reason() {
    let node = Node::new(&["u0"]);
    let config = Config::serial(Duration::from_secs(5), Duration::from_millis(500));

    let mut forged = transfer("u0", "r0", "1", 1);
    forged.set_actions(vec![Action::new(TOKEN_CONTRACT, "transfer", "[]")]);
    let broke = transfer("nobody", "r0", "1", 2);
    let good = transfer("u0", "r0", "1", 3);

    let (block, provider) = node.gen(vec![forged, broke, good.clone()], &config).await;

    assert_eq!(block.txs, vec![good]);
    let dropped = provider.list();
    assert_eq!(dropped.len(), 2);
    assert!(dropped[1].1.contains("nobody"), "{}", dropped[1].1);
    assert_eq!(provider.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn starved_timeout_is_returned() {
    let node = Node::new(&["u0", "spinner"]);
    let spinner = node.deploy_spinner();
    let config = Config::serial(Duration::from_millis(80), Duration::from_secs(10));

    let stuck = spin(&spinner, 1);
    let (block, provider) = node.gen(vec![stuck.clone()], &config).await;

    assert!(block.txs.is_empty());
    assert!(provider.list().is_empty());
    assert_eq!(provider.next(), Some(stuck));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn batched_starved_timeout_is_returned() {
    let node = Node::new(&["u0", "u1", "spinner"]);
    let spinner = node.deploy_spinner();
    let config = Config::batch(Duration::from_millis(200), Duration::from_secs(10), 3);

    let stuck = spin(&spinner, 1);
    let txs = vec![
        transfer("u0", "r0", "1", 2),
        stuck.clone(),
        transfer("u1", "r1", "1", 3),
    ];
    let (block, provider) = node.gen(txs, &config).await;

    assert_eq!(block.txs.len(), 2);
    assert!(!block.txs.contains(&stuck));
    assert_eq!(Info::decode(&block.head.info).unwrap().batch, vec![2]);
    assert_eq!(provider.next(), Some(stuck));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn full_budget_timeout_is_included_and_verifies() {
    let node = Node::new(&["spinner"]);
    let spinner = node.deploy_spinner();
    let pre = node.fork();
    let config = Config::serial(Duration::from_secs(10), Duration::from_millis(40));

    let (block, _) = node.gen(vec![spin(&spinner, 1)], &config).await;

    assert_eq!(block.txs.len(), 1);
    let receipt = &block.receipts[0];
    assert_eq!(receipt.status.code, StatusCode::Timeout);
    assert_eq!(receipt.gas_usage, 1_000_000_000);
    assert_eq!(node.balance("spinner"), 1_000_000_000_000 - 1_000_000_000);

    node.verifier.verify(&block, pre, &config).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn tampered_receipt_fails() {
    let node = Node::new(&["u0", "u1"]);
    let pre = node.fork();
    let config = Config::batch(Duration::from_secs(5), Duration::from_millis(500), 2);

    let txs = vec![transfer("u0", "r0", "1", 1), transfer("u1", "r1", "1", 2)];
    let (mut block, _) = node.gen(txs, &config).await;
    block.receipts[1].gas_usage += 1;

    let err = node.verifier.verify(&block, pre, &config).await.unwrap_err();
    assert!(matches!(err, VerifyError::ReceiptMismatch { .. }), "{}", err);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn malformed_blocks_are_rejected() {
    let node = Node::new(&["u0", "u1"]);
    let config = Config::serial(Duration::from_secs(5), Duration::from_millis(500));
    let txs = vec![transfer("u0", "r0", "1", 1), transfer("u1", "r1", "1", 2)];
    let (block, _) = node.gen(txs, &config).await;

    let mut bad = block.clone();
    bad.head.info = b"not json".to_vec();
    let err = node.verifier.verify(&bad, node.fork(), &config).await.unwrap_err();
    assert!(matches!(err, VerifyError::Info(_)));

    let mut bad = block.clone();
    bad.head.info = Info::batched(2, vec![1]).encode().unwrap();
    let err = node.verifier.verify(&bad, node.fork(), &config).await.unwrap_err();
    assert!(matches!(err, VerifyError::BatchMismatch { sum: 1, txs: 2 }));

    let mut bad = block.clone();
    bad.head.info = br#"{"mode":7}"#.to_vec();
    let err = node.verifier.verify(&bad, node.fork(), &config).await.unwrap_err();
    assert!(matches!(err, VerifyError::UnknownMode(7)));

    let mut bad = block.clone();
    bad.receipts.pop();
    let err = node.verifier.verify(&bad, node.fork(), &config).await.unwrap_err();
    assert!(matches!(err, VerifyError::ReceiptCount { txs: 2, receipts: 1 }));

    let mut bad = block;
    bad.txs[0].set_actions(vec![]);
    let err = node.verifier.verify(&bad, node.fork(), &config).await.unwrap_err();
    assert!(matches!(err, VerifyError::Tx { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn batch_of_one_round_trips() {
    let node = Node::new(&["u0"]);
    let pre = node.fork();
    let config = Config::batch(Duration::from_secs(5), Duration::from_millis(500), 1);

    let txs = (0..3).map(|i| transfer("u0", "r0", "2", i)).collect();
    let (block, _) = node.gen(txs, &config).await;

    assert_eq!(
        Info::decode(&block.head.info).unwrap(),
        Info::batched(1, vec![1, 1, 1])
    );
    assert_eq!(node.balance("r0"), 6);
    node.verifier.verify(&block, pre.clone(), &config).await.unwrap();
    assert_eq!(pre.dump(), node.store.dump());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn batches_wider_than_recorded_thread_fail() {
    let names = users(10);
    let accounts: Vec<&str> = names.iter().map(String::as_str).collect();
    let node = Node::new(&accounts);
    let config = Config::batch(Duration::from_secs(5), Duration::from_millis(500), 4);

    let txs = names
        .iter()
        .enumerate()
        .map(|(i, name)| transfer(name, "r0", "1", i as i64))
        .collect();
    let (block, _) = node.gen(txs, &config).await;
    assert_eq!(block.txs.len(), 10);

    let mut bad = block.clone();
    bad.head.info = Info::batched(1, vec![10]).encode().unwrap();
    let err = node.verifier.verify(&bad, node.fork(), &config).await.unwrap_err();
    assert!(
        matches!(err, VerifyError::BatchOversized { size: 10, thread: 1 }),
        "{}",
        err
    );

    let mut bad = block;
    bad.head.info = Info::batched(0, vec![4, 4, 2]).encode().unwrap();
    let err = node.verifier.verify(&bad, node.fork(), &config).await.unwrap_err();
    assert!(matches!(err, VerifyError::BatchOversized { thread: 0, .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn conflicting_reruns_respect_block_deadline() {
    let node = Node::new(&["spinner"]);
    let spinner = node.deploy_spinner();
    let pre = node.fork();
    let config = Config::batch(Duration::from_millis(400), Duration::from_millis(200), 4);

    let txs: Vec<Transaction> = (0..4).map(|i| spin(&spinner, i)).collect();
    let started = Instant::now();
    let (block, provider) = node.gen(txs.clone(), &config).await;
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(650), "took {:?}", elapsed);
    assert_eq!(block.txs, vec![txs[0].clone()]);
    assert_eq!(block.receipts[0].status.code, StatusCode::Timeout);
    for tx in &txs[1..] {
        assert_eq!(provider.next().as_ref(), Some(tx));
    }
    assert!(provider.list().is_empty());

    node.verifier.verify(&block, pre, &config).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fatal_errors_return_transactions() {
    let node = Node::new(&["u0", "spinner"]);
    let spinner = node.deploy_spinner();
    let monitor = Monitor::new().with_vm(Lang::Script, Arc::new(BrokenVm));
    let broken = Verifier::new(Arc::new(monitor), &node.shared()).unwrap();

    let txs = vec![transfer("u0", "r0", "1", 1), spin(&spinner, 2)];
    for config in [
        Config::serial(Duration::from_secs(5), Duration::from_millis(500)),
        Config::batch(Duration::from_secs(5), Duration::from_millis(500), 2),
    ] {
        let store = node.fork();
        let provider = IterProvider::new(txs.clone().into_iter());
        let err = gen_with(&broken, store, &provider, &config)
            .await
            .unwrap_err();

        assert!(err.is_fatal(), "{}", err);
        assert!(matches!(
            err,
            VerifyError::Isolator(IsolatorError::Vm(VmError::VmInit { .. }))
        ));
        assert!(provider.list().is_empty());
        assert_eq!(provider.in_flight(), 0);
        assert_eq!(provider.next(), Some(txs[0].clone()));
        assert_eq!(provider.next(), Some(txs[1].clone()));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn invalid_config_is_refused() {
    let node = Node::new(&["u0"]);
    let config = Config::batch(Duration::from_secs(5), Duration::from_millis(500), 0);
    let provider = IterProvider::new(vec![transfer("u0", "r0", "1", 1)].into_iter());

    let err = gen_with(&node.verifier, node.shared(), &provider, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, VerifyError::Config(_)), "{}", err);
    assert_eq!(provider.in_flight(), 0);

    let block = Block::new(head());
    let err = node.verifier.verify(&block, node.fork(), &config).await.unwrap_err();
    assert!(matches!(err, VerifyError::Config(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn extreme_tx_times_are_rejected() {
    let node = Node::new(&["u0"]);
    let mut ancient = transfer("u0", "r0", "1", 1);
    ancient.set_time(i64::MIN, i64::MAX);
    ancient.sign_publish("u0", &[key()], vec![]);

    let err = node
        .verifier
        .exec(&head(), node.shared(), ancient.clone(), Duration::from_secs(1))
        .unwrap_err();
    assert!(matches!(err, VerifyError::Isolator(IsolatorError::Expired(NOW))));

    let config = Config::serial(Duration::from_secs(5), Duration::from_millis(500));
    let (block, provider) = node.gen(vec![ancient], &config).await;
    assert!(block.txs.is_empty());
    assert_eq!(provider.list().len(), 1);
}
