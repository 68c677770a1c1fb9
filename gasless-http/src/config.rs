//! Client configuration.
//!
//! Every setting is threaded explicitly into the client; there is no
//! process-wide default endpoint.

use std::fmt;

use gasless::Felt;
use url::Url;

use crate::constants::{DEFAULT_NAMESPACE, MAINNET_BASE_URL, SEPOLIA_BASE_URL};
use crate::error::ConfigError;

/// Where and how to reach the paymaster service.
#[derive(Clone, PartialEq, Eq)]
pub struct PaymasterConfig {
    /// Service root, e.g. `https://starknet.api.avnu.fi`.
    pub base_url: Url,
    /// Path segment the endpoints live under.
    pub namespace: String,
    /// Integrator API key, sent as the `api-key` header.
    pub api_key: Option<String>,
    /// Service public key. When set, every response must be signed.
    pub public_key: Option<Felt>,
}

impl fmt::Debug for PaymasterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymasterConfig")
            .field("base_url", &self.base_url.as_str())
            .field("namespace", &self.namespace)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("public_key", &self.public_key)
            .finish()
    }
}

impl PaymasterConfig {
    /// Creates a configuration for `base_url` with the default namespace.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            namespace: DEFAULT_NAMESPACE.to_owned(),
            api_key: None,
            public_key: None,
        }
    }

    /// Parses `base_url` and creates a configuration for it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UrlParse`] if `base_url` is not a valid URL.
    pub fn parse(base_url: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(base_url).map_err(|e| ConfigError::UrlParse {
            context: "Failed to parse base url",
            source: e,
        })?;
        Ok(Self::new(url))
    }

    /// Mainnet service.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the URL is a constant.
    pub fn mainnet() -> Result<Self, ConfigError> {
        Self::parse(MAINNET_BASE_URL)
    }

    /// Sepolia service.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the URL is a constant.
    pub fn sepolia() -> Result<Self, ConfigError> {
        Self::parse(SEPOLIA_BASE_URL)
    }

    /// Overrides the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the integrator API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Requires signed responses, verified against `public_key`.
    #[must_use]
    pub const fn with_public_key(mut self, public_key: Felt) -> Self {
        self.public_key = Some(public_key);
        self
    }

    /// Root URL of the versioned API: `{base_url}/{namespace}/v1/`.
    ///
    /// Trailing slashes on the base URL and around the namespace are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotABase`] if the base URL cannot carry a path.
    pub fn api_root(&self) -> Result<Url, ConfigError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| ConfigError::NotABase(self.base_url.to_string()))?;
            segments.pop_if_empty();
            for segment in self.namespace.split('/').filter(|s| !s.is_empty()) {
                segments.push(segment);
            }
            segments.push(crate::constants::API_VERSION);
            segments.push("");
        }
        Ok(url)
    }
}
