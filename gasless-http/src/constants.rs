//! HTTP constants of the paymaster service.

/// Mainnet service URL.
pub const MAINNET_BASE_URL: &str = "https://starknet.api.avnu.fi";

/// Sepolia service URL.
pub const SEPOLIA_BASE_URL: &str = "https://sepolia.api.avnu.fi";

/// Path segment all gasless endpoints live under.
pub const DEFAULT_NAMESPACE: &str = "gasless";

/// API version segment.
pub const API_VERSION: &str = "v1";

/// Request header carrying the integrator's billing credential.
pub const API_KEY_HEADER: &str = "api-key";

pub use gasless::auth::{ASK_SIGNATURE_HEADER, SIGNATURE_HEADER};

/// `GET` service status.
pub const STATUS_PATH: &str = "status";

/// `GET` gas token price list.
pub const GAS_TOKEN_PRICES_PATH: &str = "gas-token-prices";

/// `POST` typed-data quote.
pub const BUILD_TYPED_DATA_PATH: &str = "build-typed-data";

/// `POST` signed quote submission.
pub const EXECUTE_PATH: &str = "execute";
