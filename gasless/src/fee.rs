//! Integer-only conversion of ETH-denominated fees into gas token units.
//!
//! Every function here is pure and deterministic. All arithmetic is checked
//! [`U256`] arithmetic: an overflow is an error, never a wrap, because the
//! result becomes a binding spend ceiling.
//!
//! There are two conversion paths:
//!
//! - the overhead-term path ([`add_validation_overhead`] then [`fees_in_gas_token`],
//!   combined in [`gas_fees_in_gas_token`]) for callers holding the account's
//!   compatibility data and a full fee estimate,
//! - the multiplier path ([`compute_max_gas_token_amount`]) for callers holding
//!   only an overall fee and a price list.
//!
//! Conversion truncates toward zero and therefore under-counts. The public
//! bound entry points ([`max_gas_token_amount`], [`compute_max_gas_token_amount`])
//! take an explicit [`SafetyMargin`] so the caller always decides how much
//! headroom to sign for.

use std::fmt;
use std::num::NonZeroU64;

use alloy_primitives::U256;
use starknet_core::types::Felt;

use crate::proto::encoding::felt_to_hex;
use crate::proto::{GasTokenPrice, GaslessCompatibility};

/// Errors raised by fee conversion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeeError {
    /// An intermediate value does not fit in 256 bits.
    #[error("arithmetic overflow while computing {0}")]
    Overflow(&'static str),
    /// The token price is zero and cannot be divided by.
    #[error("gas token price must be greater than zero")]
    ZeroPrice,
    /// The token is not in the price list.
    #[error("no price for gas token {0}")]
    UnknownGasToken(String),
    /// A safety margin of zero would authorize no spend at all.
    #[error("safety margin must be at least 1")]
    InvalidSafetyMargin,
}

/// Integer multiplier applied to a converted fee before it is used as a
/// maximum spend.
///
/// A margin of 1 signs exactly the truncated estimate; 2 doubles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SafetyMargin(NonZeroU64);

impl SafetyMargin {
    /// Signs for exactly the converted estimate.
    pub const EXACT: Self = Self(NonZeroU64::MIN);

    /// Doubles the converted estimate.
    pub const DOUBLE: Self = match NonZeroU64::new(2) {
        Some(value) => Self(value),
        None => unreachable!(),
    };

    /// Creates a margin from a raw multiplier.
    ///
    /// # Errors
    ///
    /// Returns [`FeeError::InvalidSafetyMargin`] if `multiplier` is zero.
    pub const fn new(multiplier: u64) -> Result<Self, FeeError> {
        match NonZeroU64::new(multiplier) {
            Some(value) => Ok(Self(value)),
            None => Err(FeeError::InvalidSafetyMargin),
        }
    }

    /// Returns the raw multiplier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }

    fn apply(self, amount: U256) -> Result<U256, FeeError> {
        amount
            .checked_mul(U256::from(self.get()))
            .ok_or(FeeError::Overflow("safety margin"))
    }
}

impl fmt::Display for SafetyMargin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// A network fee estimate, in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    /// Overall fee of the estimated transaction.
    pub overall_fee: U256,
    /// Current L2 gas price, if known.
    pub gas_price: Option<U256>,
    /// Current data gas price, if known. Treated as `1` when absent.
    pub data_gas_price: Option<U256>,
}

impl FeeEstimate {
    /// Creates an estimate with only an overall fee.
    #[must_use]
    pub const fn new(overall_fee: U256) -> Self {
        Self {
            overall_fee,
            gas_price: None,
            data_gas_price: None,
        }
    }

    /// Sets the gas price.
    #[must_use]
    pub const fn with_gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    /// Sets the data gas price.
    #[must_use]
    pub const fn with_data_gas_price(mut self, data_gas_price: U256) -> Self {
        self.data_gas_price = Some(data_gas_price);
        self
    }

    /// Data gas price to use in overhead computations (`1` when absent).
    #[must_use]
    pub fn effective_data_gas_price(&self) -> U256 {
        self.data_gas_price.unwrap_or(U256::from(1u64))
    }
}

/// Adds the account's validation overhead to an estimated fee.
///
/// Returns `estimated_fees` unchanged when either price is unknown or when both
/// overheads are zero. Otherwise returns
/// `estimated_fees + gas_price * gas_overhead + data_gas_price * data_gas_overhead`.
///
/// # Errors
///
/// Returns [`FeeError::Overflow`] if the sum does not fit in 256 bits.
pub fn add_validation_overhead(
    estimated_fees: U256,
    gas_price: Option<U256>,
    data_gas_price: Option<U256>,
    gas_overhead: U256,
    data_gas_overhead: U256,
) -> Result<U256, FeeError> {
    let (Some(gas_price), Some(data_gas_price)) = (gas_price, data_gas_price) else {
        return Ok(estimated_fees);
    };
    if gas_overhead.is_zero() && data_gas_overhead.is_zero() {
        return Ok(estimated_fees);
    }
    let gas_term = gas_price
        .checked_mul(gas_overhead)
        .ok_or(FeeError::Overflow("gas overhead"))?;
    let data_gas_term = data_gas_price
        .checked_mul(data_gas_overhead)
        .ok_or(FeeError::Overflow("data gas overhead"))?;
    estimated_fees
        .checked_add(gas_term)
        .and_then(|fees| fees.checked_add(data_gas_term))
        .ok_or(FeeError::Overflow("validation overhead"))
}

/// Converts a fee in wei into the smallest unit of a gas token.
///
/// Computes `floor(fees_wei * 10^decimals / price_in_eth)`, truncating toward zero.
///
/// # Errors
///
/// Returns [`FeeError::ZeroPrice`] if `price_in_eth` is zero, or
/// [`FeeError::Overflow`] if the scaled fee does not fit in 256 bits.
pub fn fees_in_gas_token(
    fees_wei: U256,
    price_in_eth: U256,
    decimals: u8,
) -> Result<U256, FeeError> {
    if price_in_eth.is_zero() {
        return Err(FeeError::ZeroPrice);
    }
    let scaled = fees_wei
        .checked_mul(decimal_scale(decimals)?)
        .ok_or(FeeError::Overflow("token scaling"))?;
    Ok(scaled / price_in_eth)
}

/// Adds the account's validation overhead to an estimate, then converts the
/// result into gas token units. No safety margin is applied.
///
/// # Errors
///
/// Returns [`FeeError`] on overflow or a zero price.
pub fn gas_fees_in_gas_token(
    estimate: &FeeEstimate,
    price: &GasTokenPrice,
    compatibility: &GaslessCompatibility,
) -> Result<U256, FeeError> {
    let fees_wei = add_validation_overhead(
        estimate.overall_fee,
        estimate.gas_price,
        Some(estimate.effective_data_gas_price()),
        compatibility.gas_consumed_overhead,
        compatibility.data_gas_consumed_overhead,
    )?;
    fees_in_gas_token(fees_wei, price.price_in_eth, price.decimals)
}

/// Maximum gas token amount to sign for, on the overhead-term path.
///
/// Equals [`gas_fees_in_gas_token`] multiplied by `margin`.
///
/// # Errors
///
/// Returns [`FeeError`] on overflow or a zero price.
pub fn max_gas_token_amount(
    estimate: &FeeEstimate,
    price: &GasTokenPrice,
    compatibility: &GaslessCompatibility,
    margin: SafetyMargin,
) -> Result<U256, FeeError> {
    margin.apply(gas_fees_in_gas_token(estimate, price, compatibility)?)
}

/// Maximum gas token amount to sign for, on the multiplier path.
///
/// Looks up `gas_token` in `prices` (first match) and returns
/// `floor(estimated_fees * 10^decimals * margin / price_in_eth)`.
///
/// # Errors
///
/// Returns [`FeeError::UnknownGasToken`] if the token has no price, and
/// [`FeeError`] on overflow or a zero price.
pub fn compute_max_gas_token_amount(
    gas_token: &Felt,
    estimated_fees: U256,
    prices: &[GasTokenPrice],
    margin: SafetyMargin,
) -> Result<U256, FeeError> {
    let price = find_gas_token_price(prices, gas_token)?;
    if price.price_in_eth.is_zero() {
        return Err(FeeError::ZeroPrice);
    }
    let scaled = estimated_fees
        .checked_mul(decimal_scale(price.decimals)?)
        .ok_or(FeeError::Overflow("token scaling"))?;
    Ok(margin.apply(scaled)? / price.price_in_eth)
}

/// Returns the first price entry for `gas_token`.
///
/// # Errors
///
/// Returns [`FeeError::UnknownGasToken`] if no entry matches.
pub fn find_gas_token_price<'a>(
    prices: &'a [GasTokenPrice],
    gas_token: &Felt,
) -> Result<&'a GasTokenPrice, FeeError> {
    prices
        .iter()
        .find(|price| price.token_address == *gas_token)
        .ok_or_else(|| FeeError::UnknownGasToken(felt_to_hex(gas_token)))
}

fn decimal_scale(decimals: u8) -> Result<U256, FeeError> {
    U256::from(10u64)
        .checked_pow(U256::from(decimals))
        .ok_or(FeeError::Overflow("decimal scale"))
}
