// meridian/core/vm/src/vm.rs

use crate::args::Arg;
use crate::error::VmError;
use crate::host::Host;
use meridian_types::Contract;

/// Capability every contract runtime provides to the monitor.
///
/// One instance serves every contract of its language, so implementations
/// keep per-call state on the host and not on `self`.
pub trait Vm: Send + Sync {
    /// One-time setup, run on first use of the language.
    fn init(&self) -> Result<(), VmError>;

    /// Load `contract` and invoke `api` with decoded arguments.
    fn load_and_call(
        &self,
        host: &mut Host<'_>,
        contract: &Contract,
        api: &str,
        args: &[Arg],
    ) -> Result<Vec<String>, VmError>;

    /// Validate contract code and return the form to store on chain.
    fn compile(&self, contract: &Contract) -> Result<String, VmError>;
}
