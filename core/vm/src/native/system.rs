// meridian/core/vm/src/native/system.rs

// system.sys: contract deployment and domain names
use crate::args::{arg_str, Arg};
use crate::costs;
use crate::error::VmError;
use crate::host::Host;
use meridian_types::{Abi, ArgType, Contract, ContractInfo, Lang};
use serde::Deserialize;
use tracing::info;

pub(crate) fn abis() -> Vec<Abi> {
    vec![
        Abi::new("set_code", vec![ArgType::Json]),
        Abi::new("link_domain", vec![ArgType::String, ArgType::String]),
    ]
}

/// Deployment payload: everything but the id, which is derived from the
/// deploying transaction.
#[derive(Debug, Deserialize)]
struct Deploy {
    info: ContractInfo,
    code: String,
}

pub(crate) fn call(host: &mut Host<'_>, api: &str, args: &[Arg]) -> Result<Vec<String>, VmError> {
    host.check_deadline()?;
    host.charge(costs::NATIVE_OP)?;
    match api {
        "set_code" => set_code(host, arg_str(args, 0)?),
        "link_domain" => link_domain(host, arg_str(args, 0)?, arg_str(args, 1)?),
        other => Err(VmError::AbiNotFound {
            contract: super::SYSTEM_CONTRACT.to_string(),
            api: other.to_string(),
        }),
    }
}

/// Id of the contract deployed by the transaction with hash `tx_hash`.
pub fn contract_id(tx_hash: &str) -> String {
    format!("Contract{}", tx_hash)
}

fn set_code(host: &mut Host<'_>, payload: &str) -> Result<Vec<String>, VmError> {
    let deploy: Deploy =
        serde_json::from_str(payload).map_err(|e| VmError::Compile(e.to_string()))?;
    if deploy.info.lang == Lang::Native {
        return Err(VmError::Unauthorized(
            "native contracts cannot be deployed".to_string(),
        ));
    }

    let id = contract_id(&host.frame().tx_hash);
    if host.visitor().contract(&id)?.is_some() {
        return Err(VmError::Runtime(format!("contract {} exists", id)));
    }

    let mut contract = Contract {
        id: id.clone(),
        code: deploy.code,
        info: deploy.info,
    };
    contract.code = host.monitor().compile(&contract)?;
    host.charge(costs::data(contract.code.len()))?;
    host.visitor().set_contract(&contract)?;
    info!("Deployed {} contract {}", contract.lang(), id);
    Ok(vec![id])
}

fn link_domain(
    host: &mut Host<'_>,
    domain: &str,
    contract_id: &str,
) -> Result<Vec<String>, VmError> {
    if let Some(existing) = host.visitor().domain(domain)? {
        return Err(VmError::Runtime(format!(
            "domain {} already links to {}",
            domain, existing
        )));
    }
    if host.visitor().contract(contract_id)?.is_none() {
        return Err(VmError::ContractNotFound(contract_id.to_string()));
    }
    host.charge(costs::data(domain.len() + contract_id.len()))?;
    host.visitor().set_domain(domain, contract_id);
    Ok(Vec::new())
}
