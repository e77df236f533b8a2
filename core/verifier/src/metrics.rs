// meridian/core/verifier/src/metrics.rs

// Metrics for block generation and verification
use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    HistogramVec,
};

pub static BLOCKS_GENERATED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "meridian_blocks_generated_total",
        "Blocks produced by the generator",
        &["mode"]
    )
    .expect("register meridian_blocks_generated_total")
});

pub static BLOCK_VERIFICATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "meridian_block_verifications_total",
        "Block verification runs",
        &["mode", "result"]
    )
    .expect("register meridian_block_verifications_total")
});

pub static BLOCK_PHASE_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "meridian_block_phase_seconds",
        "Wall time spent generating or verifying a block",
        &["phase"]
    )
    .expect("register meridian_block_phase_seconds")
});

pub static TXS_RETURNED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "meridian_txs_returned_total",
        "Timed-out transactions handed back to the provider"
    )
    .expect("register meridian_txs_returned_total")
});

pub static TXS_DROPPED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "meridian_txs_dropped_total",
        "Transactions rejected during generation"
    )
    .expect("register meridian_txs_dropped_total")
});

pub static BATCH_REEXECUTIONS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "meridian_batch_reexecutions_total",
        "Batched transactions re-run because of a conflict"
    )
    .expect("register meridian_batch_reexecutions_total")
});
