// meridian/core/types/src/contract.rs

// Contract, ABI and resource-cost types
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};
use thiserror::Error;

/// Implementation language of a contract. Each variant maps to one VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    /// Built-in system contracts implemented in Rust
    Native,
    /// JSON-described op-list contracts
    Script,
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lang::Native => write!(f, "native"),
            Lang::Script => write!(f, "script"),
        }
    }
}

/// Declared type of one ABI argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    String,
    Bool,
    Number,
    Json,
}

/// Three-dimensional resource charge. Costs add component-wise.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cost {
    pub data: u64,
    pub net: u64,
    pub cpu: u64,
}

impl Cost {
    pub const fn new(data: u64, net: u64, cpu: u64) -> Self {
        Self { data, net, cpu }
    }

    pub const fn zero() -> Self {
        Self::new(0, 0, 0)
    }

    /// Total gas this cost is worth.
    pub fn to_gas(&self) -> u64 {
        self.data
            .saturating_add(self.net)
            .saturating_add(self.cpu)
    }
}

impl AddAssign for Cost {
    fn add_assign(&mut self, other: Cost) {
        self.data = self.data.saturating_add(other.data);
        self.net = self.net.saturating_add(other.net);
        self.cpu = self.cpu.saturating_add(other.cpu);
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(mut self, other: Cost) -> Cost {
        self += other;
        self
    }
}

/// Token ceiling, as declared by an ABI or attached to a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    pub token: String,
    /// Decimal string, or `"*"` for no ceiling
    pub val: String,
}

impl Amount {
    pub fn new(token: impl Into<String>, val: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            val: val.into(),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.val == "*"
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.token, self.val)
    }
}

/// One callable method of a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Abi {
    pub name: String,
    pub args: Vec<ArgType>,
    #[serde(default)]
    pub payment: u32,
    #[serde(default)]
    pub gas_price: i64,
    #[serde(default)]
    pub limit: Cost,
    #[serde(default)]
    pub amount_limit: Vec<Amount>,
}

impl Abi {
    pub fn new(name: impl Into<String>, args: Vec<ArgType>) -> Self {
        Self {
            name: name.into(),
            args,
            payment: 0,
            gas_price: 0,
            limit: Cost::zero(),
            amount_limit: Vec::new(),
        }
    }

    pub fn with_amount_limit(mut self, limits: Vec<Amount>) -> Self {
        self.amount_limit = limits;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractInfo {
    pub lang: Lang,
    pub version: String,
    pub abi: Vec<Abi>,
}

/// Deployed contract: code plus its language tag and ABI table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub id: String,
    pub code: String,
    pub info: ContractInfo,
}

impl Contract {
    pub fn abi(&self, name: &str) -> Option<&Abi> {
        self.info.abi.iter().find(|abi| abi.name == name)
    }

    pub fn lang(&self) -> Lang {
        self.info.lang
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FixedError {
    #[error("invalid decimal amount: {0}")]
    Malformed(String),

    #[error("amount {amount} has more than {decimal} fractional digits")]
    PrecisionLoss { amount: String, decimal: u32 },

    #[error("amount overflow")]
    Overflow,
}

/// Fixed-point decimal. `value` counts units of `10^-decimal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed {
    pub value: i64,
    pub decimal: u32,
}

impl Fixed {
    pub fn new(value: i64, decimal: u32) -> Self {
        Self { value, decimal }
    }

    /// Parse a non-negative decimal string at the given precision.
    pub fn parse(amount: &str, decimal: u32) -> Result<Self, FixedError> {
        let malformed = || FixedError::Malformed(amount.to_string());
        let (int_part, frac_part) = match amount.split_once('.') {
            Some((i, f)) => (i, f),
            None => (amount, ""),
        };
        if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        if !frac_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        if amount.contains('.') && frac_part.is_empty() {
            return Err(malformed());
        }

        let frac_trimmed = frac_part.trim_end_matches('0');
        if frac_trimmed.len() > decimal as usize {
            return Err(FixedError::PrecisionLoss {
                amount: amount.to_string(),
                decimal,
            });
        }

        let scale = 10i64.checked_pow(decimal).ok_or(FixedError::Overflow)?;
        let int_value: i64 = int_part.parse().map_err(|_| FixedError::Overflow)?;
        let mut frac_value: i64 = 0;
        for digit in frac_trimmed.bytes() {
            frac_value = frac_value * 10 + i64::from(digit - b'0');
        }
        let pad = 10i64
            .checked_pow(decimal - frac_trimmed.len() as u32)
            .ok_or(FixedError::Overflow)?;

        let value = int_value
            .checked_mul(scale)
            .and_then(|v| v.checked_add(frac_value * pad))
            .ok_or(FixedError::Overflow)?;
        Ok(Self { value, decimal })
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.value < 0 { "-" } else { "" };
        let abs = self.value.unsigned_abs();
        if self.decimal == 0 {
            return write!(f, "{}{}", sign, abs);
        }
        let scale = 10u64.pow(self.decimal);
        let int = abs / scale;
        let frac = format!("{:0width$}", abs % scale, width = self.decimal as usize);
        let frac = frac.trim_end_matches('0');
        if frac.is_empty() {
            write!(f, "{}{}", sign, int)
        } else {
            write!(f, "{}{}.{}", sign, int, frac)
        }
    }
}
