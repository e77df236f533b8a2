// meridian/core/types/src/transaction.rs

use crate::contract::Amount;
use crate::crypto::{sha3, KeyPair, Signature};
use crate::encoding::Notation;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const MIN_GAS_PRICE: i64 = 100;
pub const MAX_GAS_PRICE: i64 = 10_000;
pub const MIN_GAS_LIMIT: i64 = 500;

/// Longest a transaction may wait for inclusion, in nanoseconds.
pub const MAX_EXPIRATION: i64 = 90 * 1_000_000_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxError {
    #[error("account {0} not included in signer list of this transaction")]
    SignerNotIncluded(String),

    #[error("signer signature verification failed")]
    SignerVerification,

    #[error("publisher signature missing")]
    PublisherEmpty,

    #[error("publisher signature verification failed")]
    PublisherVerification,

    #[error("gas price illegal, should be in [{min}, {max}], got {got}")]
    GasPriceIllegal { min: i64, max: i64, got: i64 },

    #[error("gas limit illegal, should be >= {min}, got {got}")]
    GasLimitIllegal { min: i64, got: i64 },

    #[error("invalid tx: includes both delay and referred tx")]
    DelayWithReferredTx,

    #[error("unmatched referred tx publisher")]
    DeferPublisherMismatch,

    #[error("unmatched referred tx delay time")]
    DeferTimeMismatch,

    #[error("unmatched referred tx expiration time")]
    DeferExpirationMismatch,

    #[error("unmatched referred tx actions")]
    DeferActionsMismatch,

    #[error("decode tx: {0}")]
    Decode(String),
}

/// Which fields of a transaction take part in its canonical bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ToBytesLevel {
    /// Content fields; what signers sign
    Base,
    /// Base plus signer signatures; what the publisher signs
    Publish,
    /// Everything; what the hash covers
    Full,
}

/// One contract invocation inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action {
    pub contract: String,
    pub action_name: String,
    /// JSON array of arguments
    pub data: String,
}

impl Action {
    pub fn new(
        contract: impl Into<String>,
        action_name: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            contract: contract.into(),
            action_name: action_name.into(),
            data: data.into(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut n = Notation::new();
        n.write_string(&self.contract);
        n.write_string(&self.action_name);
        n.write_string(&self.data);
        n.into_bytes()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}({})", self.contract, self.action_name, self.data)
    }
}

/// Signed transaction.
///
/// Fields are only reachable through accessors so that every mutation of a
/// signable field goes through a setter that drops the cached hash.
#[derive(Debug, Clone)]
pub struct Transaction {
    hash: OnceCell<[u8; 32]>,
    time: i64,
    expiration: i64,
    gas_price: i64,
    gas_limit: i64,
    delay: i64,
    actions: Vec<Action>,
    signers: Vec<String>,
    signs: Vec<Signature>,
    publisher: String,
    publish_signs: Vec<Signature>,
    referred_tx: Vec<u8>,
    amount_limit: Vec<Amount>,
}

/// Wire form used by `encode` / `decode`.
#[derive(Serialize, Deserialize)]
struct TxWire {
    time: i64,
    expiration: i64,
    gas_price: i64,
    gas_limit: i64,
    delay: i64,
    actions: Vec<Action>,
    signers: Vec<String>,
    signs: Vec<Signature>,
    publisher: String,
    publish_signs: Vec<Signature>,
    referred_tx: Vec<u8>,
    amount_limit: Vec<Amount>,
}

impl Transaction {
    pub fn new(
        actions: Vec<Action>,
        signers: Vec<String>,
        gas_limit: i64,
        gas_price: i64,
        time: i64,
        expiration: i64,
        delay: i64,
    ) -> Self {
        Self {
            hash: OnceCell::new(),
            time,
            expiration,
            gas_price,
            gas_limit,
            delay,
            actions,
            signers,
            signs: Vec::new(),
            publisher: String::new(),
            publish_signs: Vec::new(),
            referred_tx: Vec::new(),
            amount_limit: Vec::new(),
        }
    }

    pub fn with_amount_limit(mut self, limits: Vec<Amount>) -> Self {
        self.amount_limit = limits;
        self.hash = OnceCell::new();
        self
    }

    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn expiration(&self) -> i64 {
        self.expiration
    }

    pub fn gas_price(&self) -> i64 {
        self.gas_price
    }

    pub fn gas_limit(&self) -> i64 {
        self.gas_limit
    }

    pub fn delay(&self) -> i64 {
        self.delay
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn signers(&self) -> &[String] {
        &self.signers
    }

    pub fn signs(&self) -> &[Signature] {
        &self.signs
    }

    pub fn publisher(&self) -> &str {
        &self.publisher
    }

    pub fn publish_signs(&self) -> &[Signature] {
        &self.publish_signs
    }

    pub fn referred_tx(&self) -> &[u8] {
        &self.referred_tx
    }

    pub fn amount_limit(&self) -> &[Amount] {
        &self.amount_limit
    }

    /// Replace the time window; invalidates the cached hash.
    pub fn set_time(&mut self, time: i64, expiration: i64) {
        self.time = time;
        self.expiration = expiration;
        self.hash = OnceCell::new();
    }

    /// Replace the gas bounds; invalidates the cached hash.
    pub fn set_gas(&mut self, gas_limit: i64, gas_price: i64) {
        self.gas_limit = gas_limit;
        self.gas_price = gas_price;
        self.hash = OnceCell::new();
    }

    /// Replace the actions; invalidates the cached hash.
    pub fn set_actions(&mut self, actions: Vec<Action>) {
        self.actions = actions;
        self.hash = OnceCell::new();
    }

    /// Canonical bytes at the given inclusion level.
    pub fn to_bytes(&self, level: ToBytesLevel) -> Vec<u8> {
        let mut n = Notation::new();
        n.write_i64(self.time);
        n.write_i64(self.expiration);
        n.write_i64(self.gas_price);
        n.write_i64(self.gas_limit);
        n.write_i64(self.delay);
        n.write_string_slice(&self.signers);
        let actions: Vec<Vec<u8>> = self.actions.iter().map(Action::to_bytes).collect();
        n.write_bytes_slice(&actions);
        let limits: Vec<String> = self.amount_limit.iter().map(|a| a.to_string()).collect();
        n.write_string_slice(&limits);

        if level > ToBytesLevel::Base {
            let signs: Vec<Vec<u8>> = self.signs.iter().map(Signature::to_bytes).collect();
            n.write_bytes_slice(&signs);
        }

        if level > ToBytesLevel::Publish {
            n.write_bytes(&self.referred_tx);
            n.write_string(&self.publisher);
            let signs: Vec<Vec<u8>> = self.publish_signs.iter().map(Signature::to_bytes).collect();
            n.write_bytes_slice(&signs);
        }

        n.into_bytes()
    }

    /// Hash over the Full encoding, computed once and cached.
    pub fn hash(&self) -> [u8; 32] {
        *self
            .hash
            .get_or_init(|| sha3(&self.to_bytes(ToBytesLevel::Full)))
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }

    fn base_hash(&self) -> [u8; 32] {
        sha3(&self.to_bytes(ToBytesLevel::Base))
    }

    fn publish_hash(&self) -> [u8; 32] {
        sha3(&self.to_bytes(ToBytesLevel::Publish))
    }

    fn contains_signer(&self, id: &str) -> bool {
        self.signers.iter().any(|signer| signer.starts_with(id))
    }

    /// Produce a content signature. Only declared signers may do this.
    pub fn sign_content(&self, id: &str, key: &KeyPair) -> Result<Signature, TxError> {
        if !self.contains_signer(id) {
            return Err(TxError::SignerNotIncluded(id.to_string()));
        }
        Ok(key.sign(&self.base_hash()))
    }

    /// Attach content signatures and sign as publisher `id`.
    pub fn sign_publish(&mut self, id: &str, keys: &[KeyPair], signs: Vec<Signature>) {
        self.signs.extend(signs);
        self.publisher = id.to_string();
        let publish_hash = self.publish_hash();
        self.publish_signs = keys.iter().map(|kp| kp.sign(&publish_hash)).collect();
        self.hash = OnceCell::new();
    }

    /// Whether this transaction was generated by another one's delay.
    pub fn is_defer(&self) -> bool {
        !self.referred_tx.is_empty()
    }

    /// Deferred transaction produced by this transaction's delay.
    pub fn defer_tx(&self) -> Transaction {
        Transaction {
            hash: OnceCell::new(),
            time: self.time.saturating_add(self.delay),
            expiration: self.expiration.saturating_add(self.delay),
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
            delay: 0,
            actions: self.actions.clone(),
            signers: self.signers.clone(),
            signs: Vec::new(),
            publisher: self.publisher.clone(),
            publish_signs: Vec::new(),
            referred_tx: self.hash().to_vec(),
            amount_limit: self.amount_limit.clone(),
        }
    }

    /// Check that this deferred transaction matches the one that referred it.
    pub fn verify_defer(&self, referred: &Transaction) -> Result<(), TxError> {
        if referred.publisher != self.publisher {
            return Err(TxError::DeferPublisherMismatch);
        }
        if referred.time.checked_add(referred.delay) != Some(self.time) {
            return Err(TxError::DeferTimeMismatch);
        }
        if referred.expiration.checked_add(referred.delay) != Some(self.expiration) {
            return Err(TxError::DeferExpirationMismatch);
        }
        if referred.actions != self.actions {
            return Err(TxError::DeferActionsMismatch);
        }
        Ok(())
    }

    /// Check every signature carried by the transaction.
    pub fn verify_self(&self) -> Result<(), TxError> {
        if self.delay > 0 && self.is_defer() {
            return Err(TxError::DelayWithReferredTx);
        }
        // Deferred transactions carry no signatures of their own.
        if self.is_defer() {
            return Ok(());
        }
        let base_hash = self.base_hash();
        if !self.signs.iter().all(|sig| sig.verify(&base_hash)) {
            return Err(TxError::SignerVerification);
        }
        if self.publish_signs.is_empty() {
            return Err(TxError::PublisherEmpty);
        }
        let publish_hash = self.publish_hash();
        if !self.publish_signs.iter().all(|sig| sig.verify(&publish_hash)) {
            return Err(TxError::PublisherVerification);
        }
        Ok(())
    }

    /// Check one signer signature against the content hash.
    pub fn verify_signer(&self, sig: &Signature) -> bool {
        sig.verify(&self.base_hash())
    }

    pub fn is_expired(&self, ct: i64) -> bool {
        self.expiration <= ct
            || ct
                .checked_sub(self.time)
                .map_or(true, |age| age > MAX_EXPIRATION)
    }

    /// `ct` is either wall-clock now or the block head time, in nanoseconds.
    pub fn is_time_valid(&self, ct: i64) -> bool {
        self.time <= ct && !self.is_expired(ct)
    }

    pub fn check_gas(&self) -> Result<(), TxError> {
        if self.gas_price < MIN_GAS_PRICE || self.gas_price > MAX_GAS_PRICE {
            return Err(TxError::GasPriceIllegal {
                min: MIN_GAS_PRICE,
                max: MAX_GAS_PRICE,
                got: self.gas_price,
            });
        }
        if self.gas_limit < MIN_GAS_LIMIT {
            return Err(TxError::GasLimitIllegal {
                min: MIN_GAS_LIMIT,
                got: self.gas_limit,
            });
        }
        Ok(())
    }

    /// Wire encoding.
    pub fn encode(&self) -> Vec<u8> {
        let wire = TxWire {
            time: self.time,
            expiration: self.expiration,
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
            delay: self.delay,
            actions: self.actions.clone(),
            signers: self.signers.clone(),
            signs: self.signs.clone(),
            publisher: self.publisher.clone(),
            publish_signs: self.publish_signs.clone(),
            referred_tx: self.referred_tx.clone(),
            amount_limit: self.amount_limit.clone(),
        };
        // Serializing plain owned data into a Vec cannot fail.
        bincode::serialize(&wire).unwrap_or_default()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TxError> {
        let wire: TxWire =
            bincode::deserialize(bytes).map_err(|e| TxError::Decode(e.to_string()))?;
        Ok(Self {
            hash: OnceCell::new(),
            time: wire.time,
            expiration: wire.expiration,
            gas_price: wire.gas_price,
            gas_limit: wire.gas_limit,
            delay: wire.delay,
            actions: wire.actions,
            signers: wire.signers,
            signs: wire.signs,
            publisher: wire.publisher,
            publish_signs: wire.publish_signs,
            referred_tx: wire.referred_tx,
            amount_limit: wire.amount_limit,
        })
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes(ToBytesLevel::Full) == other.to_bytes(ToBytesLevel::Full)
    }
}

impl Eq for Transaction {}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tx{{")?;
        writeln!(f, "    Time: {},", self.time)?;
        writeln!(f, "    Publisher: {},", self.publisher)?;
        writeln!(f, "    Actions:")?;
        for action in &self.actions {
            writeln!(f, "        {}", action)?;
        }
        writeln!(f, "    AmountLimit: {:?},", self.amount_limit)?;
        write!(f, "}}")
    }
}

impl Serialize for Transaction {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Transaction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = <Vec<u8>>::deserialize(deserializer)?;
        Transaction::decode(&bytes).map_err(serde::de::Error::custom)
    }
}
