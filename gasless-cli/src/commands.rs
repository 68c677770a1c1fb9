//! Subcommands of the `gasless` binary.
//!
//! Every command talks to the service through [`PaymasterClient`] and returns
//! a JSON document; `main` prints it.

use std::path::PathBuf;

use alloy_primitives::U256;
use clap::{Args, Parser, Subcommand};
use gasless::fee::{find_gas_token_price, gas_fees_in_gas_token, max_gas_token_amount};
use gasless::proto::encoding::{felt_to_hex, parse_felt, parse_uint, uint_to_hex};
use gasless::{Felt, FeeEstimate, GaslessCompatibility, RewardsFilter, SafetyMargin};
use gasless_http::PaymasterClient;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::error::CliError;

/// Query a gasless paymaster service.
#[derive(Debug, Parser)]
#[command(name = "gasless", version, about)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "CONFIG", default_value = "gasless.toml", global = true)]
    pub config: PathBuf,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that the service is up.
    Status,
    /// Check whether an account can use the service.
    Compatibility {
        /// Account address.
        #[arg(value_parser = parse_felt)]
        account: Felt,
    },
    /// List sponsor rewards available to an account.
    Rewards(RewardsArgs),
    /// List accepted gas tokens and their prices.
    Prices,
    /// Convert a fee estimate into a gas token bound.
    Quote(QuoteArgs),
}

/// Arguments of `gasless rewards`.
#[derive(Debug, Args)]
pub struct RewardsArgs {
    /// Account address.
    #[arg(value_parser = parse_felt)]
    pub account: Felt,
    /// Only rewards of this sponsor (repeatable).
    #[arg(long)]
    pub sponsor: Vec<String>,
    /// Only rewards of this campaign (repeatable).
    #[arg(long)]
    pub campaign: Vec<String>,
    /// Only rewards of this protocol (repeatable).
    #[arg(long)]
    pub protocol: Vec<String>,
}

impl RewardsArgs {
    fn filter(&self) -> RewardsFilter {
        RewardsFilter {
            sponsor: self.sponsor.clone(),
            campaign: self.campaign.clone(),
            protocol: self.protocol.clone(),
        }
    }
}

/// Arguments of `gasless quote`.
#[derive(Debug, Args)]
pub struct QuoteArgs {
    /// Gas token address.
    #[arg(long, value_parser = parse_felt)]
    pub token: Felt,
    /// Overall fee estimate, in wei.
    #[arg(long, value_parser = parse_uint)]
    pub fee_wei: U256,
    /// L2 gas price, in wei. Required for the validation overhead to apply.
    #[arg(long, value_parser = parse_uint)]
    pub gas_price: Option<U256>,
    /// Data gas price, in wei (default: 1).
    #[arg(long, value_parser = parse_uint)]
    pub data_gas_price: Option<U256>,
    /// Account whose validation overhead to include.
    #[arg(long, value_parser = parse_felt)]
    pub account: Option<Felt>,
    /// Safety margin multiplier.
    #[arg(long, default_value_t = 2)]
    pub margin: u64,
}

impl QuoteArgs {
    fn estimate(&self) -> FeeEstimate {
        FeeEstimate {
            overall_fee: self.fee_wei,
            gas_price: self.gas_price,
            data_gas_price: self.data_gas_price,
        }
    }
}

/// Runs `command` against `client`.
///
/// # Errors
///
/// Returns [`CliError`] if a request or a conversion fails.
pub async fn execute(
    command: &Command,
    client: &PaymasterClient,
    cancel: &CancellationToken,
) -> Result<Value, CliError> {
    let output = match command {
        Command::Status => serde_json::to_value(client.status(cancel).await?)?,
        Command::Compatibility { account } => {
            serde_json::to_value(client.account_compatibility(account, cancel).await?)?
        }
        Command::Rewards(args) => serde_json::to_value(
            client
                .account_rewards(&args.account, &args.filter(), cancel)
                .await?,
        )?,
        Command::Prices => serde_json::to_value(client.gas_token_prices(cancel).await?)?,
        Command::Quote(args) => quote(args, client, cancel).await?,
    };
    Ok(output)
}

async fn quote(
    args: &QuoteArgs,
    client: &PaymasterClient,
    cancel: &CancellationToken,
) -> Result<Value, CliError> {
    let margin = SafetyMargin::new(args.margin)?;
    let compatibility = match &args.account {
        Some(account) => client.account_compatibility(account, cancel).await?,
        None => GaslessCompatibility::default(),
    };
    let prices = client.gas_token_prices(cancel).await?;
    let price = find_gas_token_price(&prices, &args.token)?;
    let estimate = args.estimate();
    let fees = gas_fees_in_gas_token(&estimate, price, &compatibility)?;
    let max_amount = max_gas_token_amount(&estimate, price, &compatibility, margin)?;
    tracing::debug!(%fees, %max_amount, %margin, "quote computed");
    Ok(json!({
        "gasTokenAddress": felt_to_hex(&args.token),
        "decimals": price.decimals,
        "priceInETH": price.price_in_eth.to_string(),
        "gasConsumedOverhead": compatibility.gas_consumed_overhead.to_string(),
        "dataGasConsumedOverhead": compatibility.data_gas_consumed_overhead.to_string(),
        "feesInGasToken": fees.to_string(),
        "safetyMargin": margin.get(),
        "maxGasTokenAmount": max_amount.to_string(),
        "maxGasTokenAmountHex": uint_to_hex(max_amount),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gasless_http::PaymasterConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const USDC: &str = "0x053c91253bc9682c04929ca02ed00b3e423f6710d2ee7e0d5ebb06f3ecf368a8";

    async fn server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gasless/v1/gas-token-prices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"tokenAddress": USDC, "priceInETH": "500000000000000", "priceInUSD": 1.0, "decimals": 6}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gasless/v1/accounts/0xacc0/compatible"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "isCompatible": true,
                "gasConsumedOverhead": "1000",
                "dataGasConsumedOverhead": "0"
            })))
            .mount(&server)
            .await;
        server
    }

    fn client(server: &MockServer) -> PaymasterClient {
        PaymasterClient::new(&PaymasterConfig::parse(&server.uri()).unwrap()).unwrap()
    }

    #[test]
    fn test_quote_arguments_parse() {
        let cli = Cli::try_parse_from([
            "gasless",
            "quote",
            "--token",
            USDC,
            "--fee-wei",
            "0x1c6bf52634000",
            "--gas-price",
            "23000000000",
            "--margin",
            "3",
        ])
        .unwrap();
        let Command::Quote(args) = cli.command else {
            panic!("expected quote");
        };
        assert_eq!(args.fee_wei, U256::from(500_000_000_000_000u64));
        assert_eq!(args.margin, 3);
        assert_eq!(args.account, None);
    }

    #[test]
    fn test_invalid_account_is_rejected_by_parser() {
        assert!(Cli::try_parse_from(["gasless", "compatibility", "0xnothex"]).is_err());
    }

    #[test]
    fn test_rewards_filter_from_flags() {
        let cli = Cli::try_parse_from([
            "gasless", "rewards", "0xacc", "--sponsor", "a", "--sponsor", "b",
        ])
        .unwrap();
        let Command::Rewards(args) = cli.command else {
            panic!("expected rewards");
        };
        assert_eq!(args.filter().sponsor, vec!["a", "b"]);
        assert!(args.filter().campaign.is_empty());
    }

    #[tokio::test]
    async fn test_quote_with_account_overhead() {
        let server = server().await;
        let command = Command::Quote(QuoteArgs {
            token: Felt::from_hex(USDC).unwrap(),
            fee_wei: U256::from(500_000_000_000_000u64),
            gas_price: Some(U256::from(23_000_000_000u64)),
            data_gas_price: None,
            account: Some(Felt::from(0xacc0u64)),
            margin: 2,
        });
        let output = execute(&command, &client(&server), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output["feesInGasToken"], "1046000");
        assert_eq!(output["maxGasTokenAmount"], "2092000");
        assert_eq!(output["maxGasTokenAmountHex"], "0x1febe0");
    }

    #[tokio::test]
    async fn test_quote_without_account() {
        let server = server().await;
        let command = Command::Quote(QuoteArgs {
            token: Felt::from_hex(USDC).unwrap(),
            fee_wei: U256::from(500_000_000_000_000u64),
            gas_price: Some(U256::from(23_000_000_000u64)),
            data_gas_price: None,
            account: None,
            margin: 1,
        });
        let output = execute(&command, &client(&server), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output["feesInGasToken"], "1000000");
        assert_eq!(output["maxGasTokenAmount"], "1000000");
    }

    #[tokio::test]
    async fn test_quote_rejects_zero_margin_and_unknown_token() {
        let server = server().await;
        let mut args = QuoteArgs {
            token: Felt::from_hex(USDC).unwrap(),
            fee_wei: U256::from(1u64),
            gas_price: None,
            data_gas_price: None,
            account: None,
            margin: 0,
        };
        let err = quote(&args, &client(&server), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Fee(gasless::FeeError::InvalidSafetyMargin)));

        args.margin = 2;
        args.token = Felt::from(0x1u64);
        let err = quote(&args, &client(&server), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Fee(gasless::FeeError::UnknownGasToken(_))));
    }
}
