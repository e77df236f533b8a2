// meridian/core/vm/src/costs.rs

// Resource charges applied by the host and the built-in VMs
use meridian_types::Cost;

/// Contract lookup and argument decoding.
pub const PREPARE: Cost = Cost::new(0, 0, 10);

/// Entering a nested contract call.
pub const NESTED_CALL: Cost = Cost::new(0, 0, 20);

/// One script op.
pub const SCRIPT_OP: Cost = Cost::new(0, 0, 2);

/// Every `BURN_CHUNK` iterations of a burn op.
pub const BURN: Cost = Cost::new(0, 0, 1);
pub const BURN_CHUNK: u64 = 64;

/// Native token and system operations.
pub const NATIVE_OP: Cost = Cost::new(0, 0, 5);

/// Bookkeeping over `n` (signer, token) pairs.
pub fn common_op(n: usize) -> Cost {
    Cost::new(0, 0, 2 * n as u64)
}

/// Storing `len` bytes.
pub fn data(len: usize) -> Cost {
    Cost::new(len as u64, 0, 0)
}

/// Transaction bytes carried over the network.
pub fn net(len: usize) -> Cost {
    Cost::new(0, len as u64, 0)
}
