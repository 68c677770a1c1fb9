//! Account signature shapes.
//!
//! Wallets return a typed-data signature either as a flat array of field
//! elements (multisig and smart accounts) or as a plain `(r, s)` pair. The
//! service only accepts the array form, hex encoded.

use starknet_core::crypto::Signature;
use starknet_core::types::Felt;

use crate::proto::encoding::felt_to_hex;

/// A signature produced by an account over a typed-data quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountSignature {
    /// A flat array of field elements, forwarded as is.
    Array(Vec<Felt>),
    /// A `(r, s)` pair, forwarded as `[r, s]`.
    Components {
        /// `r` component.
        r: Felt,
        /// `s` component.
        s: Felt,
    },
}

impl AccountSignature {
    /// Flattens the signature into field elements.
    #[must_use]
    pub fn to_felts(&self) -> Vec<Felt> {
        match self {
            Self::Array(felts) => felts.clone(),
            Self::Components { r, s } => vec![*r, *s],
        }
    }

    /// Normalizes the signature into the hex word array the service accepts.
    #[must_use]
    pub fn to_wire(&self) -> Vec<String> {
        self.to_felts().iter().map(felt_to_hex).collect()
    }
}

impl From<Signature> for AccountSignature {
    fn from(value: Signature) -> Self {
        Self::Components {
            r: value.r,
            s: value.s,
        }
    }
}

impl From<Vec<Felt>> for AccountSignature {
    fn from(value: Vec<Felt>) -> Self {
        Self::Array(value)
    }
}
