//! `gasless` — query a paymaster service from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Service status (config from gasless.toml in the current directory)
//! gasless status
//!
//! # Account compatibility and sponsor rewards
//! gasless compatibility 0x0498e484...
//! gasless rewards 0x0498e484... --sponsor AVNU
//!
//! # Convert a fee estimate into a USDC bound, doubled
//! gasless quote --token 0x053c9125... --fee-wei 500000000000000 --gas-price 23000000000
//!
//! # Configure logging level
//! RUST_LOG=debug gasless prices
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` — Path to TOML configuration file (default: `gasless.toml`)
//! - `GASLESS_BASE_URL`, `GASLESS_API_KEY`, `GASLESS_PUBLIC_KEY` — Override file values
//! - `RUST_LOG` — Log level filter (default: `info`)

use clap::Parser;
use gasless_cli::commands::{Cli, execute};
use gasless_cli::config::CliConfig;
use gasless_cli::error::CliError;
use gasless_cli::util::SigDown;
use gasless_http::PaymasterClient;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // A missing .env file is not an error
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!("gasless failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = CliConfig::load_from(&cli.config)?;
    let paymaster_config = config.to_paymaster_config()?;
    tracing::debug!(config = ?paymaster_config, "Loaded configuration");

    let client = PaymasterClient::new(&paymaster_config)?;
    let sig_down = SigDown::try_new()?;
    let cancel = sig_down.cancellation_token();

    let result = execute(&cli.command, &client, &cancel).await;
    if sig_down.is_triggered() {
        tracing::info!("Interrupted, in-flight request abandoned");
    }
    print_json(&result?)
}

#[allow(clippy::print_stdout)]
fn print_json(value: &serde_json::Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
