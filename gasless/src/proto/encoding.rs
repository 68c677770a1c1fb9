//! Number encodings used on the paymaster wire.
//!
//! Large integers cross the boundary as strings, either base-10 or `0x`-prefixed
//! base-16, and are decoded into exact integers on receipt. Outbound words are
//! rendered as lowercase hex with an even number of digits (`0x02`, `0x0100`).

use alloy_primitives::U256;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};
use serde_with::{DeserializeAs, SerializeAs};
use starknet_core::types::Felt;

/// Parses a base-10 or `0x`-prefixed base-16 string into a [`U256`].
///
/// # Errors
///
/// Returns a description of the problem if the string is empty, contains
/// invalid digits or does not fit in 256 bits.
pub fn parse_uint(value: &str) -> Result<U256, String> {
    let value = value.trim();
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(digits) if !digits.is_empty() => U256::from_str_radix(digits, 16),
        Some(_) => return Err(format!("empty hex integer `{value}`")),
        None if value.is_empty() => return Err("empty integer".to_owned()),
        None => U256::from_str_radix(value, 10),
    };
    parsed.map_err(|e| format!("invalid integer `{value}`: {e}"))
}

/// Parses a base-10 or `0x`-prefixed base-16 string into a [`Felt`].
///
/// Values at or above the field modulus are rejected, never reduced.
///
/// # Errors
///
/// Returns a description of the problem if the string is not a valid field element.
pub fn parse_felt(value: &str) -> Result<Felt, String> {
    let parsed = parse_uint(value)?;
    if parsed > U256::from_be_bytes(Felt::MAX.to_bytes_be()) {
        return Err(format!(
            "field element `{}` is not below the field modulus",
            value.trim()
        ));
    }
    Ok(Felt::from_bytes_be(&parsed.to_be_bytes::<32>()))
}

/// Prefixes bare hex digits with `0x`, left-padding to an even digit count.
fn even_hex(digits: &str) -> String {
    if digits.len() % 2 == 1 {
        format!("0x0{digits}")
    } else {
        format!("0x{digits}")
    }
}

/// Renders a [`U256`] as even-length lowercase hex (`0` → `0x00`).
#[must_use]
pub fn uint_to_hex(value: U256) -> String {
    even_hex(&format!("{value:x}"))
}

/// Renders a [`Felt`] as even-length lowercase hex (`0` → `0x00`).
#[must_use]
pub fn felt_to_hex(value: &Felt) -> String {
    let minimal = value.to_hex_string();
    let digits = minimal.strip_prefix("0x").unwrap_or(&minimal);
    even_hex(digits)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawUint {
    Text(String),
    Number(u64),
}

fn deserialize_uint<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    match RawUint::deserialize(deserializer)? {
        RawUint::Text(text) => parse_uint(&text).map_err(D::Error::custom),
        RawUint::Number(number) => Ok(U256::from(number)),
    }
}

/// `serde_with` adapter: accepts decimal or hex strings (or small JSON numbers),
/// serializes as a decimal string.
#[derive(Debug, Clone, Copy)]
pub struct DecimalOrHex;

impl SerializeAs<U256> for DecimalOrHex {
    fn serialize_as<S: Serializer>(source: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&source.to_string())
    }
}

impl<'de> DeserializeAs<'de, U256> for DecimalOrHex {
    fn deserialize_as<D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        deserialize_uint(deserializer)
    }
}

/// `serde_with` adapter: accepts decimal or hex strings, serializes as
/// even-length `0x` hex.
#[derive(Debug, Clone, Copy)]
pub struct EvenHex;

impl SerializeAs<U256> for EvenHex {
    fn serialize_as<S: Serializer>(source: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&uint_to_hex(*source))
    }
}

impl<'de> DeserializeAs<'de, U256> for EvenHex {
    fn deserialize_as<D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        deserialize_uint(deserializer)
    }
}

impl SerializeAs<Felt> for EvenHex {
    fn serialize_as<S: Serializer>(source: &Felt, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&felt_to_hex(source))
    }
}

impl<'de> DeserializeAs<'de, Felt> for EvenHex {
    fn deserialize_as<D: Deserializer<'de>>(deserializer: D) -> Result<Felt, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_felt(&text).map_err(D::Error::custom)
    }
}
