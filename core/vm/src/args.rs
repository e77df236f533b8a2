// meridian/core/vm/src/args.rs

// Decoding of JSON argument arrays against an ABI declaration
use crate::error::VmError;
use meridian_types::{Abi, ArgType};
use serde_json::Value;
use std::fmt;

/// One decoded call argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Str(String),
    Bool(bool),
    Number(i64),
    /// Well-formed JSON text
    Json(String),
}

impl Arg {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(s) | Arg::Json(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Arg::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Arg::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Str(s) | Arg::Json(s) => f.write_str(s),
            Arg::Bool(b) => write!(f, "{}", b),
            Arg::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Decode `data`, a JSON array, against the argument types of `abi`.
///
/// A trailing comma before the closing bracket is tolerated.
pub fn unmarshal_args(abi: &Abi, data: &str) -> Result<Vec<Arg>, VmError> {
    let data = match data.strip_suffix(",]") {
        Some(head) => format!("{}]", head),
        None => data.to_string(),
    };
    let value: Value = serde_json::from_str(&data)
        .map_err(|e| VmError::ArgDecode(format!("error in data {}: {}", data, e)))?;
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(VmError::ArgDecode(format!(
                "expected an argument array, got {}",
                other
            )))
        }
    };

    if items.len() != abi.args.len() {
        return Err(VmError::ArgsArity {
            abi: abi.name.clone(),
            need: abi.args.len(),
            got: items.len(),
        });
    }

    items
        .into_iter()
        .zip(&abi.args)
        .enumerate()
        .map(|(i, (item, ty))| decode_arg(i, item, *ty))
        .collect()
}

fn decode_arg(index: usize, item: Value, ty: ArgType) -> Result<Arg, VmError> {
    let mismatch = |item: &Value| {
        VmError::ArgDecode(format!("argument {} is not a {:?}: {}", index, ty, item))
    };
    match ty {
        ArgType::String => match item {
            Value::String(s) => Ok(Arg::Str(s)),
            other => Err(mismatch(&other)),
        },
        ArgType::Bool => item.as_bool().map(Arg::Bool).ok_or_else(|| mismatch(&item)),
        ArgType::Number => item.as_i64().map(Arg::Number).ok_or_else(|| mismatch(&item)),
        ArgType::Json => match item {
            // Embedded JSON text must itself parse.
            Value::String(text) => {
                let parsed: Value = serde_json::from_str(&text).map_err(|e| {
                    VmError::ArgDecode(format!("argument {} is not valid json: {}", index, e))
                })?;
                Ok(Arg::Json(parsed.to_string()))
            }
            other => Ok(Arg::Json(other.to_string())),
        },
    }
}

/// String argument at `index`.
pub fn arg_str(args: &[Arg], index: usize) -> Result<&str, VmError> {
    args.get(index)
        .and_then(Arg::as_str)
        .ok_or_else(|| VmError::ArgDecode(format!("argument {} must be a string", index)))
}

/// Integer argument at `index`.
pub fn arg_i64(args: &[Arg], index: usize) -> Result<i64, VmError> {
    args.get(index)
        .and_then(Arg::as_i64)
        .ok_or_else(|| VmError::ArgDecode(format!("argument {} must be a number", index)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abi(args: Vec<ArgType>) -> Abi {
        Abi::new("f", args)
    }

    #[test]
    fn test_decode_all_types() {
        let abi = abi(vec![
            ArgType::String,
            ArgType::Bool,
            ArgType::Number,
            ArgType::Json,
        ]);
        let args = unmarshal_args(&abi, r#"["alice", true, 42, {"a": [1, 2]}]"#).unwrap();
        assert_eq!(args[0], Arg::Str("alice".into()));
        assert_eq!(args[1], Arg::Bool(true));
        assert_eq!(args[2], Arg::Number(42));
        assert_eq!(args[3], Arg::Json(r#"{"a":[1,2]}"#.into()));
    }

    #[test]
    fn test_trailing_comma_tolerated() {
        let abi = abi(vec![ArgType::String, ArgType::Number]);
        let args = unmarshal_args(&abi, r#"["x", 7,]"#).unwrap();
        assert_eq!(args, vec![Arg::Str("x".into()), Arg::Number(7)]);
    }

    #[test]
    fn test_arity_mismatch() {
        let abi = abi(vec![ArgType::String]);
        let err = unmarshal_args(&abi, r#"["a", "b"]"#).unwrap_err();
        assert_eq!(
            err,
            VmError::ArgsArity {
                abi: "f".into(),
                need: 1,
                got: 2
            }
        );
    }

    #[test]
    fn test_type_mismatch() {
        let abi = abi(vec![ArgType::Number]);
        assert!(matches!(
            unmarshal_args(&abi, r#"["12"]"#),
            Err(VmError::ArgDecode(_))
        ));
        let abi = self::abi(vec![ArgType::Bool]);
        assert!(unmarshal_args(&abi, "[1]").is_err());
    }

    #[test]
    fn test_embedded_json_must_parse() {
        let abi = abi(vec![ArgType::Json]);
        let ok = unmarshal_args(&abi, r#"["{\"k\": 1}"]"#).unwrap();
        assert_eq!(ok, vec![Arg::Json(r#"{"k":1}"#.into())]);
        assert!(unmarshal_args(&abi, r#"["{not json"]"#).is_err());
    }

    #[test]
    fn test_not_an_array() {
        let abi = abi(vec![]);
        assert!(unmarshal_args(&abi, r#"{"a": 1}"#).is_err());
        assert!(unmarshal_args(&abi, "[").is_err());
        assert!(unmarshal_args(&abi, "[]").unwrap().is_empty());
    }
}
