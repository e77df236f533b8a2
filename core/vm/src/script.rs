// meridian/core/vm/src/script.rs

// Script runtime: contract code is a JSON map from api name to a list of ops
use crate::args::Arg;
use crate::costs;
use crate::error::VmError;
use crate::host::Host;
use crate::native::TOKEN_CONTRACT;
use crate::vm::Vm;
use dashmap::DashMap;
use meridian_types::{sha3, Contract};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Table scripts read and write through `put`, `get` and `del`.
pub const DATA_TABLE: &str = "data";

/// One script instruction. String fields may reference call arguments as
/// `$0`, `$1`, ..., the running contract as `$self` and the transaction
/// publisher as `$publisher`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Put { key: String, value: String },
    Get { key: String },
    Del { key: String },
    Transfer {
        token: String,
        from: String,
        to: String,
        amount: String,
    },
    Call {
        contract: String,
        api: String,
        #[serde(default = "empty_args")]
        args: String,
    },
    Ret { value: String },
    Fail { message: String },
    /// Spin for `steps` iterations, metering CPU as it goes
    Burn { steps: u64 },
}

fn empty_args() -> String {
    "[]".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Script {
    pub apis: BTreeMap<String, Vec<Op>>,
}

impl Script {
    pub fn parse(code: &str) -> Result<Self, VmError> {
        serde_json::from_str(code).map_err(|e| VmError::Compile(e.to_string()))
    }
}

/// Runtime for `Lang::Script` contracts. Parsed scripts are cached by code
/// hash.
#[derive(Debug, Default)]
pub struct ScriptVm {
    cache: DashMap<[u8; 32], Arc<Script>>,
}

impl ScriptVm {
    pub fn new() -> Self {
        Self::default()
    }

    fn load(&self, contract: &Contract) -> Result<Arc<Script>, VmError> {
        let key = sha3(contract.code.as_bytes());
        if let Some(script) = self.cache.get(&key) {
            return Ok(script.clone());
        }
        let script = Arc::new(Script::parse(&contract.code)?);
        self.cache.insert(key, script.clone());
        debug!("Loaded script for {}", contract.id);
        Ok(script)
    }
}

impl Vm for ScriptVm {
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
        let script = self.load(contract)?;
        let ops = script.apis.get(api).ok_or_else(|| VmError::AbiNotFound {
            contract: contract.id.clone(),
            api: api.to_string(),
        })?;

        let publisher = host.frame().publisher.clone();
        let expand = |s: &str| substitute(s, args, &contract.id, &publisher);

        let mut returns = Vec::new();
        for op in ops {
            host.check_deadline()?;
            host.charge(costs::SCRIPT_OP)?;
            match op {
                Op::Put { key, value } => {
                    let key = expand(key);
                    let value = expand(value);
                    host.charge(costs::data(key.len() + value.len()))?;
                    host.visitor().table_put(&contract.id, DATA_TABLE, &key, &value);
                }
                Op::Get { key } => {
                    let key = expand(key);
                    let value = host.visitor().table_get(&contract.id, DATA_TABLE, &key)?;
                    returns.push(value.unwrap_or_default());
                }
                Op::Del { key } => {
                    let key = expand(key);
                    host.visitor().table_del(&contract.id, DATA_TABLE, &key);
                }
                Op::Transfer {
                    token,
                    from,
                    to,
                    amount,
                } => {
                    let data = serde_json::json!([
                        expand(token),
                        expand(from),
                        expand(to),
                        expand(amount),
                    ])
                    .to_string();
                    host.call(TOKEN_CONTRACT, "transfer", &data)?;
                }
                Op::Call {
                    contract: callee,
                    api,
                    args: call_args,
                } => {
                    let callee = expand(callee);
                    let call_args = expand(call_args);
                    returns.extend(host.call(&callee, api, &call_args)?);
                }
                Op::Ret { value } => returns.push(expand(value)),
                Op::Fail { message } => return Err(VmError::Runtime(expand(message))),
                Op::Burn { steps } => burn(host, *steps)?,
            }
        }
        Ok(returns)
    }

    /// Parse the code, require a body for every declared ABI and return the
    /// canonical JSON form.
    fn compile(&self, contract: &Contract) -> Result<String, VmError> {
        let script = Script::parse(&contract.code)?;
        for abi in &contract.info.abi {
            if !script.apis.contains_key(&abi.name) {
                return Err(VmError::Compile(format!("abi {} has no body", abi.name)));
            }
        }
        serde_json::to_string(&script).map_err(|e| VmError::Compile(e.to_string()))
    }
}

fn burn(host: &mut Host<'_>, steps: u64) -> Result<(), VmError> {
    let mut acc = 0u64;
    for i in 0..steps {
        if i % costs::BURN_CHUNK == 0 {
            host.check_deadline()?;
            host.charge(costs::BURN)?;
        }
        acc = std::hint::black_box(acc.wrapping_add(i));
    }
    Ok(())
}

/// Expand `$self`, `$publisher` and `$n` in one left-to-right pass, so
/// substituted values are never expanded again. `$n` takes the longest run
/// of digits that names an argument.
fn substitute(template: &str, args: &[Arg], contract: &str, publisher: &str) -> String {
    if !template.contains('$') {
        return template.to_string();
    }
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];
        if let Some(after) = tail.strip_prefix("self") {
            out.push_str(contract);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("publisher") {
            out.push_str(publisher);
            rest = after;
        } else {
            let digits = tail.len() - tail.trim_start_matches(|c: char| c.is_ascii_digit()).len();
            let arg = (1..=digits).rev().find_map(|n| {
                let index: usize = tail[..n].parse().ok()?;
                args.get(index).map(|arg| (n, arg))
            });
            match arg {
                Some((n, arg)) => {
                    out.push_str(&arg.to_string());
                    rest = &tail[n..];
                }
                None => {
                    out.push('$');
                    rest = tail;
                }
            }
        }
    }
    out.push_str(rest);
    out
}
