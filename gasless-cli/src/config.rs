//! CLI configuration.
//!
//! Loads configuration from a TOML file with support for environment variable
//! expansion in string values. Variables use `$VAR` or `${VAR}` syntax.
//!
//! # Example Configuration
//!
//! ```toml
//! base_url = "https://sepolia.api.avnu.fi"
//! namespace = "gasless"
//! api_key = "$AVNU_API_KEY"
//! public_key = "0x0229e5a9e4a7bc1d77fb3a63f7f9a8ba4e1e69a96b1f7c0f3a9b2a3ef3e8b1c4"
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` — Path to configuration file (default: `gasless.toml`)
//! - `GASLESS_BASE_URL` — Override the service URL
//! - `GASLESS_API_KEY` — Override the API key
//! - `GASLESS_PUBLIC_KEY` — Override the service public key

use std::path::Path;

use gasless::proto::encoding::parse_felt;
use gasless_http::PaymasterConfig;
use gasless_http::constants::{DEFAULT_NAMESPACE, MAINNET_BASE_URL};
use serde::{Deserialize, Serialize};

use crate::error::CliError;

/// Top-level CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Service URL (default: mainnet).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Endpoint namespace (default: `gasless`).
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Integrator API key.
    /// Supports `$VAR` / `${VAR}` for environment variable expansion.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Service public key (hex or decimal). When set, unsigned or badly signed
    /// responses are rejected.
    #[serde(default)]
    pub public_key: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            namespace: default_namespace(),
            api_key: None,
            public_key: None,
        }
    }
}

fn default_base_url() -> String {
    MAINNET_BASE_URL.to_owned()
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_owned()
}

impl CliConfig {
    /// Loads configuration from `path`, falling back to defaults when the file
    /// does not exist.
    ///
    /// After loading, all `$VAR` / `${VAR}` references are expanded from the
    /// process environment, then `GASLESS_*` variables override file values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, CliError> {
        let content = if path.exists() {
            std::fs::read_to_string(path)?
        } else {
            String::new()
        };
        let mut config = Self::parse(&content)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Parses configuration from TOML text, expanding environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML.
    pub fn parse(content: &str) -> Result<Self, CliError> {
        let expanded = expand_env_vars(content, |name| std::env::var(name).ok());
        Ok(toml::from_str(&expanded)?)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(base_url) = lookup("GASLESS_BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(api_key) = lookup("GASLESS_API_KEY") {
            self.api_key = Some(api_key);
        }
        if let Some(public_key) = lookup("GASLESS_PUBLIC_KEY") {
            self.public_key = Some(public_key);
        }
    }

    /// Builds the client configuration.
    ///
    /// An API key that is empty or still an unresolved `$VAR` reference is
    /// ignored with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or the public key is invalid.
    pub fn to_paymaster_config(&self) -> Result<PaymasterConfig, CliError> {
        let mut config =
            PaymasterConfig::parse(&self.base_url)?.with_namespace(self.namespace.as_str());
        if let Some(api_key) = self.api_key.as_deref().map(str::trim) {
            if api_key.is_empty() || api_key.starts_with('$') {
                tracing::warn!("Ignoring api_key: not resolved (missing env var?)");
            } else {
                config = config.with_api_key(api_key);
            }
        }
        if let Some(public_key) = &self.public_key {
            let felt = parse_felt(public_key).map_err(|reason| CliError::InvalidValue {
                field: "public_key",
                reason,
            })?;
            config = config.with_public_key(felt);
        }
        Ok(config)
    }
}

/// Expands `$VAR` and `${VAR}` patterns in a string using `lookup`.
///
/// Unresolved variables are left as-is.
fn expand_env_vars(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }
        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }

        let mut var_name = String::new();
        while let Some(&c) = chars.peek() {
            if braced {
                if c == '}' {
                    chars.next();
                    break;
                }
            } else if !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            var_name.push(c);
            chars.next();
        }

        match lookup(&var_name) {
            Some(value) if !var_name.is_empty() => result.push_str(&value),
            _ => {
                result.push('$');
                if braced {
                    result.push('{');
                }
                result.push_str(&var_name);
                if braced && !var_name.is_empty() {
                    result.push('}');
                }
            }
        }
    }

    result
}
