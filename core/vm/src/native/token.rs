// meridian/core/vm/src/native/token.rs

// token.sys: fungible tokens with fixed-point balances
use super::require_auth;
use crate::args::{arg_i64, arg_str, Arg};
use crate::costs;
use crate::error::VmError;
use crate::host::Host;
use meridian_state::keys;
use meridian_types::{Abi, ArgType, Fixed};
use tracing::debug;

const MAX_DECIMAL: i64 = 18;

pub(crate) fn abis() -> Vec<Abi> {
    use ArgType::{Number, String};
    vec![
        Abi::new("create", vec![String, String, Number]),
        Abi::new("issue", vec![String, String, String]),
        Abi::new("transfer", vec![String, String, String, String]),
        Abi::new("balance_of", vec![String, String]),
    ]
}

pub(crate) fn call(host: &mut Host<'_>, api: &str, args: &[Arg]) -> Result<Vec<String>, VmError> {
    host.check_deadline()?;
    host.charge(costs::NATIVE_OP)?;
    match api {
        "create" => create(host, arg_str(args, 0)?, arg_str(args, 1)?, arg_i64(args, 2)?),
        "issue" => issue(host, arg_str(args, 0)?, arg_str(args, 1)?, arg_str(args, 2)?),
        "transfer" => transfer(
            host,
            arg_str(args, 0)?,
            arg_str(args, 1)?,
            arg_str(args, 2)?,
            arg_str(args, 3)?,
        ),
        "balance_of" => balance_of(host, arg_str(args, 0)?, arg_str(args, 1)?),
        other => Err(VmError::AbiNotFound {
            contract: super::TOKEN_CONTRACT.to_string(),
            api: other.to_string(),
        }),
    }
}

fn create(
    host: &mut Host<'_>,
    token: &str,
    issuer: &str,
    decimal: i64,
) -> Result<Vec<String>, VmError> {
    require_auth(host, issuer)?;
    if !(0..=MAX_DECIMAL).contains(&decimal) {
        return Err(VmError::Runtime(format!("invalid decimal {}", decimal)));
    }
    if host.visitor().decimal(token)?.is_some() {
        return Err(VmError::Runtime(format!("token {} exists", token)));
    }

    host.charge(costs::data(token.len() + issuer.len() + 4))?;
    let visitor = host.visitor();
    visitor.set_decimal(token, decimal as u32);
    visitor.put(keys::issuer(token), issuer.as_bytes().to_vec());
    debug!("Created token {} issued by {}", token, issuer);
    Ok(Vec::new())
}

fn issue(host: &mut Host<'_>, token: &str, to: &str, amount: &str) -> Result<Vec<String>, VmError> {
    let issuer = match host.visitor().get(&keys::issuer(token))? {
        Some(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        None => return Err(VmError::Runtime(format!("token {} not found", token))),
    };
    require_auth(host, &issuer)?;
    let amount = parse_amount(host, token, amount)?;

    let balance = host.visitor().token_balance(token, to)?;
    let updated = balance
        .checked_add(amount.value)
        .ok_or_else(|| VmError::Runtime(format!("balance overflow for {}", to)))?;
    host.charge(costs::data(8))?;
    host.visitor().set_token_balance(token, to, updated);
    Ok(Vec::new())
}

fn transfer(
    host: &mut Host<'_>,
    token: &str,
    from: &str,
    to: &str,
    amount: &str,
) -> Result<Vec<String>, VmError> {
    require_auth(host, from)?;
    let amount = parse_amount(host, token, amount)?;

    let from_balance = host.visitor().token_balance(token, from)?;
    if from_balance < amount.value {
        return Err(VmError::InsufficientBalance {
            token: token.to_string(),
            account: from.to_string(),
            have: Fixed::new(from_balance, amount.decimal).to_string(),
            need: amount.to_string(),
        });
    }
    if from == to {
        return Ok(Vec::new());
    }

    let to_balance = host.visitor().token_balance(token, to)?;
    let credited = to_balance
        .checked_add(amount.value)
        .ok_or_else(|| VmError::Runtime(format!("balance overflow for {}", to)))?;
    host.charge(costs::data(16))?;
    let visitor = host.visitor();
    visitor.set_token_balance(token, from, from_balance - amount.value);
    visitor.set_token_balance(token, to, credited);
    Ok(Vec::new())
}

fn balance_of(host: &mut Host<'_>, token: &str, account: &str) -> Result<Vec<String>, VmError> {
    let decimal = token_decimal(host, token)?;
    let balance = host.visitor().token_balance(token, account)?;
    Ok(vec![Fixed::new(balance, decimal).to_string()])
}

fn token_decimal(host: &mut Host<'_>, token: &str) -> Result<u32, VmError> {
    host.visitor()
        .decimal(token)?
        .ok_or_else(|| VmError::Runtime(format!("token {} not found", token)))
}

/// Strictly positive amount at the token's precision.
fn parse_amount(host: &mut Host<'_>, token: &str, amount: &str) -> Result<Fixed, VmError> {
    let decimal = token_decimal(host, token)?;
    let fixed = Fixed::parse(amount, decimal).map_err(|e| VmError::ArgDecode(e.to_string()))?;
    if fixed.value <= 0 {
        return Err(VmError::ArgDecode(format!("amount must be positive: {}", amount)));
    }
    Ok(fixed)
}
