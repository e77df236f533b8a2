// meridian/core/verifier/src/lib.rs

// Block generation and verification on top of the isolator
pub mod batcher;
pub mod config;
pub mod error;
pub mod info;
pub mod logging;
pub mod metrics;
pub mod provider;
pub mod verifier;

pub use batcher::{Batch, Batcher};
pub use config::{Config, Mode};
pub use error::VerifyError;
pub use info::Info;
pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
pub use provider::{IterProvider, Provider};
pub use verifier::{verify, Verifier};
