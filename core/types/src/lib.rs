// meridian/core/types/src/lib.rs

pub mod block;
pub mod contract;
pub mod crypto;
pub mod encoding;
pub mod receipt;
pub mod transaction;

pub use block::{Block, BlockHead};
pub use contract::{Abi, Amount, ArgType, Contract, ContractInfo, Cost, Fixed, FixedError, Lang};
pub use crypto::{sha3, KeyPair, Signature};
pub use receipt::{Receipt, Status, StatusCode};
pub use transaction::{
    Action, ToBytesLevel, Transaction, TxError, MAX_EXPIRATION, MAX_GAS_PRICE, MIN_GAS_LIMIT,
    MIN_GAS_PRICE,
};
