// meridian/core/vm/src/native/mod.rs

// Built-in system contracts implemented in Rust
pub mod system;
pub mod token;

use crate::args::Arg;
use crate::error::VmError;
use crate::host::Host;
use crate::vm::Vm;
use meridian_state::{StateError, Visitor};
use meridian_types::{Contract, ContractInfo, Lang};
use tracing::info;

pub const TOKEN_CONTRACT: &str = "token.sys";
pub const SYSTEM_CONTRACT: &str = "system.sys";

/// Runtime for contracts with `Lang::Native`.
#[derive(Debug, Default)]
pub struct NativeVm;

impl NativeVm {
    pub fn new() -> Self {
        Self
    }
}

impl Vm for NativeVm {
    fn init(&self) -> Result<(), VmError> {
        Ok(())
    }

    fn load_and_call(
        &self,
        host: &mut Host<'_>,
        contract: &Contract,
        api: &str,
        args: &[Arg],
    ) -> Result<Vec<String>, VmError> {
        match contract.id.as_str() {
            TOKEN_CONTRACT => token::call(host, api, args),
            SYSTEM_CONTRACT => system::call(host, api, args),
            other => Err(VmError::ContractNotFound(other.to_string())),
        }
    }

    fn compile(&self, _contract: &Contract) -> Result<String, VmError> {
        Ok(String::new())
    }
}

/// Contract records for every built-in contract.
pub fn system_contracts() -> Vec<Contract> {
    vec![
        native_contract(TOKEN_CONTRACT, token::abis()),
        native_contract(SYSTEM_CONTRACT, system::abis()),
    ]
}

fn native_contract(id: &str, abi: Vec<meridian_types::Abi>) -> Contract {
    Contract {
        id: id.to_string(),
        code: String::new(),
        info: ContractInfo {
            lang: Lang::Native,
            version: "1.0.0".to_string(),
            abi,
        },
    }
}

/// Write missing built-in contracts into `visitor`. Returns how many were
/// written; the caller commits.
pub fn install_system_contracts(visitor: &mut Visitor) -> Result<usize, StateError> {
    let mut installed = 0;
    for contract in system_contracts() {
        if visitor.contract(&contract.id)?.is_none() {
            visitor.set_contract(&contract)?;
            info!("Installed system contract {}", contract.id);
            installed += 1;
        }
    }
    Ok(installed)
}

/// Fail unless `account` authorised the current call.
pub(crate) fn require_auth(host: &Host<'_>, account: &str) -> Result<(), VmError> {
    if host.frame().is_authorized(account) {
        Ok(())
    } else {
        Err(VmError::Unauthorized(format!("{} did not sign", account)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_state::MemoryStore;
    use std::sync::Arc;

    #[test]
    fn test_install_is_idempotent() {
        let mut visitor = Visitor::new(Arc::new(MemoryStore::new()));
        assert_eq!(install_system_contracts(&mut visitor).unwrap(), 2);
        visitor.commit().unwrap();
        assert_eq!(install_system_contracts(&mut visitor).unwrap(), 0);

        let token = visitor.contract(TOKEN_CONTRACT).unwrap().unwrap();
        assert_eq!(token.lang(), Lang::Native);
        assert!(token.abi("transfer").is_some());
    }
}
