// meridian/core/vm/src/metrics.rs

// Metrics for dispatched contract calls and executed transactions
use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_histogram, CounterVec, Histogram};

pub static MONITOR_CALLS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "meridian_monitor_calls_total",
        "Contract calls dispatched by the monitor",
        &["lang", "status"]
    )
    .expect("register meridian_monitor_calls_total")
});

pub static TX_EXECUTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "meridian_tx_executions_total",
        "Transactions run by an isolator, by receipt status",
        &["status"]
    )
    .expect("register meridian_tx_executions_total")
});

pub static TX_GAS_USED: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!("meridian_tx_gas_used", "Gas used per executed transaction")
        .expect("register meridian_tx_gas_used")
});
