#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP client for the paymaster service.
//!
//! [`PaymasterClient`] speaks the service's JSON API over `reqwest`, verifies
//! signed responses when a public key is configured, and implements
//! [`gasless::PaymasterApi`] so it can drive a [`gasless::GaslessExecutor`].
//!
//! # Modules
//!
//! - [`client`] - The HTTP client and its endpoints
//! - [`config`] - Base URL, namespace and credentials
//! - [`constants`] - Header names, default URLs and endpoint paths
//! - [`error`] - Configuration errors
//! - [`response`] - Response classification and authentication
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing spans around every request

pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod response;

pub use client::PaymasterClient;
pub use config::PaymasterConfig;
pub use error::ConfigError;
