//! Error types of the command-line client.

use gasless::{FeeError, PaymasterError};
use gasless_http::ConfigError;

/// Errors that end a `gasless` invocation.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// The configuration file cannot be read.
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML.
    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// A configuration value is invalid.
    #[error("invalid configuration value `{field}`: {reason}")]
    InvalidValue {
        /// Offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// The HTTP client cannot be built.
    #[error(transparent)]
    Client(#[from] ConfigError),

    /// The service call failed.
    #[error(transparent)]
    Paymaster(#[from] PaymasterError),

    /// Fee conversion failed.
    #[error(transparent)]
    Fee(#[from] FeeError),

    /// Output could not be rendered.
    #[error("cannot render output: {0}")]
    Json(#[from] serde_json::Error),
}
