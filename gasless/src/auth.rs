//! Server response authentication.
//!
//! When a client is configured with the service's public key, every response
//! must carry a `signature` header of the form `r,s`. The signed message is
//! `pedersen_array([starknet_keccak(body)])`, i.e. the Pedersen hash-on-elements
//! of the single keccak word of the raw body bytes, checked on the Stark curve.

use std::fmt;
use std::str::FromStr;

use starknet_core::crypto::{Signature, compute_hash_on_elements, ecdsa_verify};
use starknet_core::types::Felt;
use starknet_core::utils::starknet_keccak;

use crate::proto::encoding::{felt_to_hex, parse_felt};

/// Name of the response header carrying the server signature.
pub const SIGNATURE_HEADER: &str = "signature";

/// Name of the request header asking the service to sign its response.
pub const ASK_SIGNATURE_HEADER: &str = "ask-signature";

/// Errors raised while authenticating a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthenticationError {
    /// A public key is configured but the response carries no signature.
    #[error("response is not signed")]
    MissingSignature,
    /// The signature header cannot be parsed as `r,s`.
    #[error("malformed response signature: {0}")]
    MalformedSignature(String),
    /// The signature does not verify against the configured public key.
    #[error("invalid response signature")]
    InvalidSignature,
}

/// A server signature parsed from the `signature` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSignature {
    /// `r` component.
    pub r: Felt,
    /// `s` component.
    pub s: Felt,
}

impl FromStr for ServerSignature {
    type Err = AuthenticationError;

    fn from_str(header: &str) -> Result<Self, Self::Err> {
        let mut parts = header.split(',');
        let (Some(r), Some(s), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(AuthenticationError::MalformedSignature(format!(
                "expected `r,s`, got `{header}`"
            )));
        };
        let r = parse_felt(r).map_err(AuthenticationError::MalformedSignature)?;
        let s = parse_felt(s).map_err(AuthenticationError::MalformedSignature)?;
        Ok(Self { r, s })
    }
}

impl fmt::Display for ServerSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", felt_to_hex(&self.r), felt_to_hex(&self.s))
    }
}

impl From<ServerSignature> for Signature {
    fn from(value: ServerSignature) -> Self {
        Self {
            r: value.r,
            s: value.s,
        }
    }
}

/// Hash the service signs for a response body.
#[must_use]
pub fn response_hash(body: &[u8]) -> Felt {
    compute_hash_on_elements(&[starknet_keccak(body)])
}

/// Checks `signature` over `body` against `public_key`.
///
/// Returns `false` both for a wrong signature and for one the curve rejects.
#[must_use]
pub fn verify_response(body: &[u8], signature: &ServerSignature, public_key: &Felt) -> bool {
    let hash = response_hash(body);
    ecdsa_verify(public_key, &hash, &Signature::from(*signature)).unwrap_or(false)
}

/// Verifies responses against a fixed service public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseVerifier {
    public_key: Felt,
}

impl ResponseVerifier {
    /// Creates a verifier for `public_key`.
    #[must_use]
    pub const fn new(public_key: Felt) -> Self {
        Self { public_key }
    }

    /// The configured public key.
    #[must_use]
    pub const fn public_key(&self) -> Felt {
        self.public_key
    }

    /// Verifies a response body against its `signature` header value.
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError::MissingSignature`] if `header` is `None`,
    /// [`AuthenticationError::MalformedSignature`] if it cannot be parsed and
    /// [`AuthenticationError::InvalidSignature`] if it does not verify.
    pub fn verify(&self, body: &[u8], header: Option<&str>) -> Result<(), AuthenticationError> {
        let signature: ServerSignature = header
            .ok_or(AuthenticationError::MissingSignature)?
            .parse()?;
        if verify_response(body, &signature, &self.public_key) {
            Ok(())
        } else {
            Err(AuthenticationError::InvalidSignature)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use starknet_core::crypto::ecdsa_sign;
    use starknet_crypto::get_public_key;

    const BODY: &[u8] = br#"{"status":true,"lastChecked":"2024-01-01T00:00:00Z"}"#;

    fn private_key() -> Felt {
        Felt::from_hex("0x0139fe4d6f02e666e86a6f58e65060f115cd3c185bd9e98bd829636931458f79")
            .unwrap()
    }

    fn sign(body: &[u8]) -> ServerSignature {
        let signature = ecdsa_sign(&private_key(), &response_hash(body)).unwrap();
        ServerSignature {
            r: signature.r,
            s: signature.s,
        }
    }

    #[test]
    fn test_valid_signature_verifies() {
        let verifier = ResponseVerifier::new(get_public_key(&private_key()));
        let header = sign(BODY).to_string();
        assert_eq!(verifier.verify(BODY, Some(&header)), Ok(()));
    }

    #[test]
    fn test_decimal_signature_header_is_accepted() {
        let verifier = ResponseVerifier::new(get_public_key(&private_key()));
        let signature = sign(BODY);
        let header = format!("{},{}", signature.r, signature.s);
        assert_eq!(verifier.verify(BODY, Some(&header)), Ok(()));
    }

    #[test]
    fn test_tampered_body_is_rejected() {
        let verifier = ResponseVerifier::new(get_public_key(&private_key()));
        let header = sign(BODY).to_string();
        let tampered = br#"{"status":false,"lastChecked":"2024-01-01T00:00:00Z"}"#;
        assert_eq!(
            verifier.verify(tampered, Some(&header)),
            Err(AuthenticationError::InvalidSignature)
        );
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let verifier = ResponseVerifier::new(get_public_key(&Felt::from(42u64)));
        let header = sign(BODY).to_string();
        assert_eq!(
            verifier.verify(BODY, Some(&header)),
            Err(AuthenticationError::InvalidSignature)
        );
    }

    #[test]
    fn test_missing_signature() {
        let verifier = ResponseVerifier::new(get_public_key(&private_key()));
        assert_eq!(
            verifier.verify(BODY, None),
            Err(AuthenticationError::MissingSignature)
        );
    }

    #[test]
    fn test_malformed_headers() {
        let oversized = format!("0x1,0x{}", "f".repeat(64));
        for header in ["", "0x1", "0x1,0x2,0x3", "0x1,zz", oversized.as_str()] {
            assert!(
                matches!(
                    header.parse::<ServerSignature>(),
                    Err(AuthenticationError::MalformedSignature(_))
                ),
                "header `{header}`"
            );
        }
    }

    #[test]
    fn test_signature_display_round_trips() {
        let signature = ServerSignature {
            r: Felt::from(10u64),
            s: Felt::from(0x0100u64),
        };
        assert_eq!(signature.to_string(), "0x0a,0x0100");
        assert_eq!(signature.to_string().parse::<ServerSignature>(), Ok(signature));
    }
}
