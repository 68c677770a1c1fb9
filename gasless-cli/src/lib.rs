//! Command-line client for a gasless paymaster service.
//!
//! # Modules
//!
//! - [`commands`] — Subcommand definitions and their execution
//! - [`config`] — TOML configuration with environment variable expansion
//! - [`error`] — CLI error types
//! - [`util`] — Signal handling

pub mod commands;
pub mod config;
pub mod error;
pub mod util;

pub use commands::{Cli, Command};
pub use config::CliConfig;
pub use error::CliError;
