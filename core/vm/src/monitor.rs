// meridian/core/vm/src/monitor.rs

// Contract dispatcher: resolves contracts, decodes arguments, routes calls to
// the VM for the contract's language and enforces outermost amount limits
use crate::args::{unmarshal_args, Arg};
use crate::costs;
use crate::error::VmError;
use crate::host::Host;
use crate::metrics::MONITOR_CALLS_TOTAL;
use crate::native::NativeVm;
use crate::script::ScriptVm;
use crate::vm::Vm;
use meridian_state::Snapshot;
use meridian_types::{Abi, Contract, Fixed, Lang};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

type VmFactory = Box<dyn Fn() -> Arc<dyn Vm> + Send + Sync>;

/// Registry entry. The VM is built and initialised on first use; the
/// outcome, failure included, is kept for the life of the monitor.
struct VmSlot {
    factory: VmFactory,
    instance: OnceCell<Result<Arc<dyn Vm>, String>>,
}

impl VmSlot {
    fn new(factory: VmFactory) -> Self {
        Self {
            factory,
            instance: OnceCell::new(),
        }
    }
}

/// Runtime dispatcher. Constructed once and shared by every isolator.
pub struct Monitor {
    vms: HashMap<Lang, VmSlot>,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut langs: Vec<_> = self.vms.keys().collect();
        langs.sort();
        f.debug_struct("Monitor").field("langs", &langs).finish()
    }
}

impl Monitor {
    /// Monitor with the native and script runtimes registered.
    pub fn new() -> Self {
        Self::empty()
            .register(Lang::Native, || Arc::new(NativeVm::new()))
            .register(Lang::Script, || Arc::new(ScriptVm::new()))
    }

    /// Monitor with no runtime registered.
    pub fn empty() -> Self {
        Self {
            vms: HashMap::new(),
        }
    }

    /// Register a lazily built runtime for `lang`.
    pub fn register<F>(mut self, lang: Lang, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Vm> + Send + Sync + 'static,
    {
        self.vms.insert(lang, VmSlot::new(Box::new(factory)));
        self
    }

    /// Serve `lang` with an existing runtime instance.
    pub fn with_vm(self, lang: Lang, vm: Arc<dyn Vm>) -> Self {
        self.register(lang, move || vm.clone())
    }

    fn vm(&self, lang: Lang) -> Result<Arc<dyn Vm>, VmError> {
        let slot = self
            .vms
            .get(&lang)
            .ok_or_else(|| VmError::VmUnsupported(lang.to_string()))?;
        let instance = slot.instance.get_or_init(|| {
            let vm = (slot.factory)();
            match vm.init() {
                Ok(()) => {
                    debug!("Initialized {} vm", lang);
                    Ok(vm)
                }
                Err(e) => {
                    error!("Failed to initialize {} vm: {}", lang, e);
                    Err(e.to_string())
                }
            }
        });
        instance.clone().map_err(|reason| VmError::VmInit { lang, reason })
    }

    /// Validate contract code for deployment. Native contracts have no
    /// compile step.
    pub fn compile(&self, contract: &Contract) -> Result<String, VmError> {
        match contract.lang() {
            Lang::Native => Ok(String::new()),
            lang => self.vm(lang)?.compile(contract),
        }
    }

    /// Invoke `api` of `contract_name` with a JSON argument array.
    pub fn call(
        &self,
        host: &mut Host<'_>,
        contract_name: &str,
        api: &str,
        json_args: &str,
    ) -> Result<Vec<String>, VmError> {
        host.charge(costs::PREPARE)?;
        let contract = resolve(host, contract_name)?;
        let abi = contract
            .abi(api)
            .ok_or_else(|| VmError::AbiNotFound {
                contract: contract.id.clone(),
                api: api.to_string(),
            })?
            .clone();
        let args = unmarshal_args(&abi, json_args)?;
        let vm = self.vm(contract.lang())?;

        host.push_frame();
        {
            let frame = host.frame_mut();
            frame.caller = std::mem::replace(&mut frame.contract, contract.id.clone());
            frame.api = api.to_string();
            frame.stack_height += 1;
        }
        let result = dispatch(host, vm.as_ref(), &contract, &abi, &args);
        host.pop_frame();

        let status = if result.is_ok() { "ok" } else { "error" };
        MONITOR_CALLS_TOTAL
            .with_label_values(&[&contract.lang().to_string(), status])
            .inc();
        result
    }
}

/// Look up a contract by id, falling back to one level of domain indirection.
fn resolve(host: &mut Host<'_>, name: &str) -> Result<Contract, VmError> {
    if let Some(contract) = host.visitor().contract(name)? {
        return Ok(contract);
    }
    if let Some(id) = host.visitor().domain(name)? {
        if let Some(contract) = host.visitor().contract(&id)? {
            return Ok(contract);
        }
    }
    Err(VmError::ContractNotFound(name.to_string()))
}

fn dispatch(
    host: &mut Host<'_>,
    vm: &dyn Vm,
    contract: &Contract,
    abi: &Abi,
    args: &[Arg],
) -> Result<Vec<String>, VmError> {
    if host.frame().stack_height != 1 {
        return vm.load_and_call(host, contract, &abi.name, args);
    }

    let guard = AmountGuard::capture(host, abi)?;
    let result = vm
        .load_and_call(host, contract, &abi.name, args)
        .and_then(|returns| guard.check(host).map(|_| returns));
    if result.is_err() {
        host.visitor().restore(guard.snapshot);
    }
    result
}

/// Pre-call balances of every signer for every limited token.
struct AmountGuard {
    snapshot: Snapshot,
    signers: Vec<String>,
    limits: Vec<(String, Fixed)>,
    before: Vec<Vec<i64>>,
}

impl AmountGuard {
    fn capture(host: &mut Host<'_>, abi: &Abi) -> Result<Self, VmError> {
        let snapshot = host.visitor().snapshot();
        let frame = host.frame();
        let signers: Vec<String> = frame.signers.iter().cloned().collect();
        let requested: Vec<_> = abi
            .amount_limit
            .iter()
            .chain(frame.amount_limit.iter())
            .cloned()
            .collect();

        let mut limits = Vec::with_capacity(requested.len());
        for amount in requested {
            if amount.is_unlimited() {
                continue;
            }
            let decimal = match host.visitor().decimal(&amount.token)? {
                Some(decimal) => decimal,
                None => {
                    debug!("Skipping amount limit on unknown token {}", amount.token);
                    continue;
                }
            };
            match Fixed::parse(&amount.val, decimal) {
                Ok(limit) => limits.push((amount.token, limit)),
                Err(e) => warn!("Skipping invalid amount limit {}: {}", amount, e),
            }
        }

        host.charge(costs::common_op(signers.len() * limits.len()))?;
        let mut before = Vec::with_capacity(limits.len());
        for (token, _) in &limits {
            let mut row = Vec::with_capacity(signers.len());
            for signer in &signers {
                row.push(host.visitor().token_balance(token, signer)?);
            }
            before.push(row);
        }

        Ok(Self {
            snapshot,
            signers,
            limits,
            before,
        })
    }

    fn check(&self, host: &mut Host<'_>) -> Result<(), VmError> {
        host.charge(costs::common_op(self.signers.len() * self.limits.len()))?;
        for ((token, limit), row) in self.limits.iter().zip(&self.before) {
            for (signer, before) in self.signers.iter().zip(row) {
                let after = host.visitor().token_balance(token, signer)?;
                let spent = before.saturating_sub(after);
                if spent > limit.value {
                    return Err(VmError::AmountLimitExceeded {
                        token: token.clone(),
                        limit: limit.to_string(),
                        spent: Fixed::new(spent, limit.decimal).to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
