// meridian/core/vm/src/lib.rs

// Contract execution: call frames, the host interface handed to VMs, the
// language-keyed dispatcher and the per-transaction isolator
pub mod args;
pub mod context;
pub mod costs;
pub mod error;
pub mod host;
pub mod isolator;
pub mod metrics;
pub mod monitor;
pub mod native;
pub mod script;
pub mod vm;

pub use args::{unmarshal_args, Arg};
pub use context::CallFrame;
pub use error::VmError;
pub use host::Host;
pub use isolator::{fee, Isolator, IsolatorError, IsolatorState, GAS_TOKEN};
pub use monitor::Monitor;
pub use native::{install_system_contracts, NativeVm, SYSTEM_CONTRACT, TOKEN_CONTRACT};
pub use script::{Op, Script, ScriptVm};
pub use vm::Vm;
