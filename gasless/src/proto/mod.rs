//! Wire format types of the paymaster service.
//!
//! All request and response bodies are JSON with camelCase field names, except
//! [`AccountDeploymentData`] which keeps the snake_case shape of Starknet deploy
//! data. Large integers are carried as strings (see [`encoding`]).
//!
//! # Key Types
//!
//! - [`GaslessStatus`] - `GET /status`
//! - [`GaslessCompatibility`] - `GET /accounts/{address}/compatible`
//! - [`PaymasterReward`] / [`RewardsFilter`] - `GET /accounts/{address}/rewards`
//! - [`GasTokenPrice`] - `GET /gas-token-prices`
//! - [`BuildTypedDataRequest`] / [`TypedData`] - `POST /build-typed-data`
//! - [`ExecuteRequest`] / [`InvokeResult`] - `POST /execute`
//! - [`ErrorBody`] - structured 4xx/5xx body

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_with::serde_as;
use starknet_core::types::Felt;

use crate::calldata::FormattedCall;

pub mod encoding;

pub use encoding::{DecimalOrHex, EvenHex};

/// Availability of the paymaster service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GaslessStatus {
    /// Whether the service currently relays transactions.
    pub status: bool,
    /// When the service last checked its own health, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<String>,
}

/// Whether an account can use the gasless path, and the validation overhead
/// its account contract adds to every relayed transaction.
///
/// Overheads default to zero; zero means no validation overhead is added.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GaslessCompatibility {
    /// Whether the account contract supports outside execution.
    pub is_compatible: bool,
    /// Extra L2 gas consumed by the account's validation logic.
    #[serde_as(as = "DecimalOrHex")]
    #[serde(default)]
    pub gas_consumed_overhead: U256,
    /// Extra data gas consumed by the account's validation logic.
    #[serde_as(as = "DecimalOrHex")]
    #[serde(default)]
    pub data_gas_consumed_overhead: U256,
}

/// Price of one gas token, as quoted by the service.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasTokenPrice {
    /// Address of the gas token contract.
    pub token_address: Felt,
    /// Wei per one whole token.
    #[serde(rename = "priceInETH")]
    #[serde_as(as = "DecimalOrHex")]
    pub price_in_eth: U256,
    /// Display-only USD price. Never used in fee computations.
    #[serde(rename = "priceInUSD", default)]
    pub price_in_usd: f64,
    /// Number of decimals of the token.
    pub decimals: u8,
}

/// A call the sponsor of a reward agreed to pay for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhitelistedCall {
    /// Target contract.
    pub contract_address: Felt,
    /// Entrypoint name, or `*` for every entrypoint.
    pub entrypoint: String,
}

/// A sponsor-funded allowance held by an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymasterReward {
    /// Creation date (ISO-8601).
    #[serde(default)]
    pub date: String,
    /// Rewarded account.
    pub address: Felt,
    /// Sponsor paying the fees.
    pub sponsor: String,
    /// Sponsor campaign.
    pub campaign: String,
    /// Protocol the reward is scoped to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Number of free transactions granted.
    #[serde(default)]
    pub free_tx: u64,
    /// Number of free transactions left, if tracked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_tx: Option<u64>,
    /// Expiration date (ISO-8601), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
    /// Calls the reward covers.
    #[serde(default)]
    pub whitelisted_calls: Vec<WhitelistedCall>,
}

/// Server-side filter for the rewards lookup.
///
/// Every value is sent as a repeated query key (`sponsor=a&sponsor=b`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RewardsFilter {
    /// Only rewards from these sponsors.
    pub sponsor: Vec<String>,
    /// Only rewards from these campaigns.
    pub campaign: Vec<String>,
    /// Only rewards scoped to these protocols.
    pub protocol: Vec<String>,
}

impl RewardsFilter {
    /// Adds a sponsor to the filter.
    #[must_use]
    pub fn with_sponsor(mut self, sponsor: impl Into<String>) -> Self {
        self.sponsor.push(sponsor.into());
        self
    }

    /// Adds a campaign to the filter.
    #[must_use]
    pub fn with_campaign(mut self, campaign: impl Into<String>) -> Self {
        self.campaign.push(campaign.into());
        self
    }

    /// Adds a protocol to the filter.
    #[must_use]
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol.push(protocol.into());
        self
    }

    /// Query pairs in sponsor, campaign, protocol order.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let sponsors = self.sponsor.iter().map(|v| ("sponsor", v.as_str()));
        let campaigns = self.campaign.iter().map(|v| ("campaign", v.as_str()));
        let protocols = self.protocol.iter().map(|v| ("protocol", v.as_str()));
        sponsors.chain(campaigns).chain(protocols).collect()
    }

    /// Returns `true` if no constraint is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sponsor.is_empty() && self.campaign.is_empty() && self.protocol.is_empty()
    }
}

/// Deployment data for an account that is not deployed yet. The service deploys
/// it in the same relayed transaction.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDeploymentData {
    /// Class hash of the account contract.
    #[serde_as(as = "EvenHex")]
    pub class_hash: Felt,
    /// Address salt.
    #[serde_as(as = "EvenHex")]
    pub salt: Felt,
    /// Whether the deployment is unique (`0x00` or `0x01`).
    #[serde_as(as = "EvenHex")]
    pub unique: Felt,
    /// Constructor calldata.
    #[serde_as(as = "Vec<EvenHex>")]
    pub calldata: Vec<Felt>,
    /// Optional signature data for the deployment.
    #[serde_as(as = "Option<Vec<EvenHex>>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sigdata: Option<Vec<Felt>>,
}

/// Body of `POST /build-typed-data`.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTypedDataRequest {
    /// Account that will sign and execute.
    #[serde_as(as = "EvenHex")]
    pub user_address: Felt,
    /// Normalized call batch.
    pub calls: Vec<FormattedCall>,
    /// Token the fees are paid in. Absent when sponsored or billed.
    #[serde_as(as = "Option<EvenHex>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_token_address: Option<Felt>,
    /// Maximum amount of gas token the account agrees to spend.
    #[serde_as(as = "Option<EvenHex>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_gas_token_amount: Option<U256>,
    /// Class hash of a not-yet-deployed account.
    #[serde_as(as = "Option<EvenHex>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_class_hash: Option<Felt>,
}

/// Typed data returned by the service for the account to sign.
///
/// The payload is opaque to this crate and kept as the exact JSON text the
/// service sent. It is signed as received and sent back to `POST /execute`
/// byte for byte, so key order and large number literals survive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypedData(Box<RawValue>);

impl TypedData {
    /// Wraps raw JSON text.
    #[must_use]
    pub const fn new(raw: Box<RawValue>) -> Self {
        Self(raw)
    }

    /// Parses `json`, keeping its text unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if `json` is not a single JSON value.
    pub fn from_json(json: String) -> Result<Self, serde_json::Error> {
        RawValue::from_string(json).map(Self::new)
    }

    /// The JSON text, exactly as received.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.get()
    }
}

impl PartialEq for TypedData {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for TypedData {}

/// Body of `POST /execute`.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    /// Account that signed the typed data.
    #[serde_as(as = "EvenHex")]
    pub user_address: Felt,
    /// The signed typed data, serialized.
    pub typed_data: String,
    /// Account signature as even-length hex words.
    pub signature: Vec<String>,
    /// Deployment data when the account must be deployed first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_data: Option<AccountDeploymentData>,
}

/// Outcome of a relayed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeResult {
    /// Hash of the submitted transaction.
    pub transaction_hash: Felt,
}

/// Structured error body returned with 4xx and 5xx statuses.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Human-readable messages. The first one is surfaced to callers.
    #[serde(default)]
    pub messages: Vec<String>,
    /// Raw revert payload when contract execution failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_error: Option<String>,
}
