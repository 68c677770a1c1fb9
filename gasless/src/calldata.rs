//! Call batches and calldata normalization.
//!
//! The service only accepts flat arrays of hex words. A [`Call`] may carry its
//! arguments either already compiled to words ([`Calldata::Compiled`]) or as
//! structured values ([`Calldata::Structured`]); [`format_call`] compiles and
//! hex-formats both into a [`FormattedCall`].
//!
//! Compilation follows the Cairo serialization rules:
//!
//! - a felt, bool or short string is one word,
//! - a `u256` is two words, low 128 bits first,
//! - tuples and structs are flattened member by member,
//! - arrays are prefixed with their length, then flattened.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use starknet_core::types::Felt;
use starknet_core::utils::cairo_short_string_to_felt;

use crate::proto::encoding::{felt_to_hex, parse_felt};

/// Errors raised while compiling calldata.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalldataError {
    /// A precompiled word is neither decimal nor `0x` hex, or exceeds the field.
    #[error("invalid calldata word: {0}")]
    InvalidWord(String),
    /// A short string is longer than 31 bytes or not ASCII.
    #[error("invalid short string `{value}`: {reason}")]
    ShortString {
        /// The offending string.
        value: String,
        /// Why it cannot be encoded.
        reason: String,
    },
}

/// A structured calldata argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallArg {
    /// A single field element.
    Felt(Felt),
    /// A boolean, encoded as `0` or `1`.
    Bool(bool),
    /// A `u256`, encoded as `(low, high)`.
    Uint256(U256),
    /// A Cairo short string (at most 31 ASCII bytes).
    ShortString(String),
    /// A tuple; members are flattened without a length prefix.
    Tuple(Vec<CallArg>),
    /// A struct; fields are flattened in declaration order.
    Struct(Vec<(String, CallArg)>),
    /// An array; the length is emitted first.
    Array(Vec<CallArg>),
}

impl From<Felt> for CallArg {
    fn from(value: Felt) -> Self {
        Self::Felt(value)
    }
}

impl From<u64> for CallArg {
    fn from(value: u64) -> Self {
        Self::Felt(Felt::from(value))
    }
}

impl From<bool> for CallArg {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Arguments of a call, compiled or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Calldata {
    /// Already-compiled words, as decimal or `0x` hex strings.
    Compiled(Vec<String>),
    /// Structured arguments to compile.
    Structured(Vec<CallArg>),
}

impl Default for Calldata {
    fn default() -> Self {
        Self::Compiled(Vec::new())
    }
}

/// A single contract call of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Target contract.
    pub contract_address: Felt,
    /// Entrypoint name.
    pub entrypoint: String,
    /// Arguments.
    pub calldata: Calldata,
}

impl Call {
    /// Creates a call from precompiled words.
    pub fn compiled<I, S>(contract_address: Felt, entrypoint: impl Into<String>, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            contract_address,
            entrypoint: entrypoint.into(),
            calldata: Calldata::Compiled(words.into_iter().map(Into::into).collect()),
        }
    }

    /// Creates a call from structured arguments.
    pub fn structured(
        contract_address: Felt,
        entrypoint: impl Into<String>,
        args: Vec<CallArg>,
    ) -> Self {
        Self {
            contract_address,
            entrypoint: entrypoint.into(),
            calldata: Calldata::Structured(args),
        }
    }
}

/// A call in the flat form the service accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedCall {
    /// Target contract as even-length hex.
    pub contract_address: String,
    /// Entrypoint name.
    pub entrypoint: String,
    /// Calldata words as even-length lowercase hex.
    pub calldata: Vec<String>,
}

/// Compiles a call's arguments and formats every word as even-length `0x` hex.
///
/// # Errors
///
/// Returns [`CalldataError`] if a precompiled word cannot be parsed or a
/// short string cannot be encoded.
pub fn format_call(call: &Call) -> Result<FormattedCall, CalldataError> {
    let words = match &call.calldata {
        Calldata::Compiled(words) => words
            .iter()
            .map(|word| parse_felt(word).map_err(CalldataError::InvalidWord))
            .collect::<Result<Vec<_>, _>>()?,
        Calldata::Structured(args) => compile(args)?,
    };
    Ok(FormattedCall {
        contract_address: felt_to_hex(&call.contract_address),
        entrypoint: call.entrypoint.clone(),
        calldata: words.iter().map(felt_to_hex).collect(),
    })
}

/// Compiles structured arguments into a flat word list.
///
/// # Errors
///
/// Returns [`CalldataError::ShortString`] if a short string cannot be encoded.
pub fn compile(args: &[CallArg]) -> Result<Vec<Felt>, CalldataError> {
    let mut words = Vec::with_capacity(args.len());
    for arg in args {
        push_arg(arg, &mut words)?;
    }
    Ok(words)
}

fn push_arg(arg: &CallArg, words: &mut Vec<Felt>) -> Result<(), CalldataError> {
    match arg {
        CallArg::Felt(felt) => words.push(*felt),
        CallArg::Bool(flag) => words.push(if *flag { Felt::ONE } else { Felt::ZERO }),
        CallArg::Uint256(value) => {
            let limbs = value.as_limbs();
            let low = u128::from(limbs[0]) | (u128::from(limbs[1]) << 64);
            let high = u128::from(limbs[2]) | (u128::from(limbs[3]) << 64);
            words.push(Felt::from(low));
            words.push(Felt::from(high));
        }
        CallArg::ShortString(text) => {
            let felt = cairo_short_string_to_felt(text).map_err(|e| CalldataError::ShortString {
                value: text.clone(),
                reason: e.to_string(),
            })?;
            words.push(felt);
        }
        CallArg::Tuple(members) => {
            for member in members {
                push_arg(member, words)?;
            }
        }
        CallArg::Struct(fields) => {
            for (_, field) in fields {
                push_arg(field, words)?;
            }
        }
        CallArg::Array(items) => {
            words.push(Felt::from(items.len() as u64));
            for item in items {
                push_arg(item, words)?;
            }
        }
    }
    Ok(())
}
