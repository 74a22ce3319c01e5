//! JSON ABI helpers for contract reads.
//!
//! Agents describe calls in JSON, so arguments arrive as [`serde_json::Value`]s
//! and results leave the same way. Integers are returned as decimal strings to
//! preserve precision; byte strings and addresses as `0x` hex.

use alloy::dyn_abi::{DynSolType, DynSolValue, FunctionExt, JsonAbiExt};
use alloy::json_abi::{Function, JsonAbi};
use alloy::primitives::hex;
use serde_json::Value;

use super::WalletError;

/// Find the overload of `name` in `abi` that takes `arg_count` arguments.
///
/// # Errors
///
/// Returns [`WalletError::InvalidArgument`] if the ABI does not parse or has
/// no matching function.
pub fn find_function(abi: &Value, name: &str, arg_count: usize) -> Result<Function, WalletError> {
    let abi: JsonAbi = serde_json::from_value(abi.clone())
        .map_err(|e| WalletError::invalid_argument(format!("invalid ABI: {e}")))?;
    let overloads = abi
        .function(name)
        .ok_or_else(|| WalletError::invalid_argument(format!("function '{name}' not in ABI")))?;
    overloads
        .iter()
        .find(|f| f.inputs.len() == arg_count)
        .cloned()
        .ok_or_else(|| {
            WalletError::invalid_argument(format!(
                "function '{name}' has no overload taking {arg_count} argument(s)"
            ))
        })
}

/// ABI-encode a call to `function`, selector included.
///
/// # Errors
///
/// Returns [`WalletError::InvalidArgument`] if an argument does not fit its parameter type.
pub fn encode_call(function: &Function, args: &[Value]) -> Result<Vec<u8>, WalletError> {
    if args.len() != function.inputs.len() {
        return Err(WalletError::invalid_argument(format!(
            "'{}' expects {} argument(s), got {}",
            function.name,
            function.inputs.len(),
            args.len()
        )));
    }
    let values = function
        .inputs
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            let ty = DynSolType::parse(&param.selector_type()).map_err(|e| {
                WalletError::invalid_argument(format!("bad parameter type '{}': {e}", param.ty))
            })?;
            json_to_value(&ty, arg)
        })
        .collect::<Result<Vec<_>, _>>()?;

    function
        .abi_encode_input(&values)
        .map_err(|e| WalletError::invalid_argument(format!("failed to encode arguments: {e}")))
}

/// Decode the return data of `function` into JSON.
///
/// A single return value is unwrapped; several are returned as an array.
///
/// # Errors
///
/// Returns [`WalletError::Provider`] if the data does not match the outputs.
pub fn decode_output(function: &Function, data: &[u8]) -> Result<Value, WalletError> {
    let mut values = function
        .abi_decode_output(data)
        .map_err(|e| WalletError::provider(format!("failed to decode '{}' output: {e}", function.name)))?;
    Ok(match values.len() {
        0 => Value::Null,
        1 => value_to_json(&values.remove(0)),
        _ => Value::Array(values.iter().map(value_to_json).collect()),
    })
}

fn json_to_value(ty: &DynSolType, arg: &Value) -> Result<DynSolValue, WalletError> {
    let mismatch = || WalletError::invalid_argument(format!("cannot use {arg} as {ty}"));
    match (ty, arg) {
        (DynSolType::Array(inner), Value::Array(items)) => items
            .iter()
            .map(|item| json_to_value(inner, item))
            .collect::<Result<_, _>>()
            .map(DynSolValue::Array),
        (DynSolType::FixedArray(inner, len), Value::Array(items)) => {
            if items.len() != *len {
                return Err(mismatch());
            }
            items
                .iter()
                .map(|item| json_to_value(inner, item))
                .collect::<Result<_, _>>()
                .map(DynSolValue::FixedArray)
        }
        (DynSolType::Tuple(types), Value::Array(items)) => {
            if items.len() != types.len() {
                return Err(mismatch());
            }
            types
                .iter()
                .zip(items)
                .map(|(ty, item)| json_to_value(ty, item))
                .collect::<Result<_, _>>()
                .map(DynSolValue::Tuple)
        }
        (_, Value::String(s)) => coerce(ty, s),
        (_, Value::Number(n)) => coerce(ty, &n.to_string()),
        (_, Value::Bool(b)) => coerce(ty, if *b { "true" } else { "false" }),
        _ => Err(mismatch()),
    }
}

fn coerce(ty: &DynSolType, text: &str) -> Result<DynSolValue, WalletError> {
    ty.coerce_str(text)
        .map_err(|e| WalletError::invalid_argument(format!("cannot use '{text}' as {ty}: {e}")))
}

/// Convert a decoded ABI value to JSON.
#[must_use]
pub fn value_to_json(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::Int(i, _) => Value::String(i.to_string()),
        DynSolValue::Uint(u, _) => Value::String(u.to_string()),
        DynSolValue::FixedBytes(word, size) => Value::String(hex::encode_prefixed(&word[..*size])),
        DynSolValue::Address(address) => Value::String(address.to_checksum(None)),
        DynSolValue::Function(function) => Value::String(function.to_string()),
        DynSolValue::Bytes(bytes) => Value::String(hex::encode_prefixed(bytes)),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            Value::Array(items.iter().map(value_to_json).collect())
        }
        DynSolValue::CustomStruct {
            prop_names, tuple, ..
        } => Value::Object(
            prop_names
                .iter()
                .cloned()
                .zip(tuple.iter().map(value_to_json))
                .collect(),
        ),
    }
}
