//! Error types of the HTTP client.
//!
//! Request-time failures are reported as [`gasless::PaymasterError`]; this
//! module only covers building a client.

/// Errors raised while building a [`PaymasterClient`](crate::PaymasterClient).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// URL parse error.
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        /// Human-readable context.
        context: &'static str,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// The base URL cannot carry path segments (`data:`, `mailto:`...).
    #[error("base URL cannot be a base: {0}")]
    NotABase(String),
    /// The API key is not a valid header value.
    #[error("API key is not a valid header value")]
    InvalidApiKey(#[source] http::header::InvalidHeaderValue),
}
