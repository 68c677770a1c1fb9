//! Response classification and authentication.
//!
//! [`decode_response`] turns a raw HTTP response into a payload or a typed
//! [`PaymasterError`]:
//!
//! - 4xx: the first message of the error body is surfaced as
//!   [`PaymasterError::Service`]. Error bodies are never signature-checked.
//! - 5xx: a message containing the contract error marker becomes
//!   [`PaymasterError::ContractExecution`]; anything else is a transport error.
//! - 2xx: when a verifier is configured, the body must carry a valid
//!   signature before it is parsed.

use gasless::auth::ResponseVerifier;
use gasless::error::CONTRACT_ERROR_MARKER;
use gasless::proto::ErrorBody;
use gasless::PaymasterError;
use http::StatusCode;
use serde::de::DeserializeOwned;

fn transport_error(status: StatusCode) -> PaymasterError {
    PaymasterError::transport(status.as_u16(), status.canonical_reason().unwrap_or_default())
}

fn error_body(body: &[u8]) -> Option<ErrorBody> {
    serde_json::from_slice::<ErrorBody>(body).ok()
}

/// Classifies a response and, on success, authenticates and decodes its body.
///
/// `signature` is the raw value of the `signature` response header, if any.
///
/// # Errors
///
/// Returns a [`PaymasterError`] describing the service failure, the
/// authentication failure or the decoding failure.
pub fn decode_response<T: DeserializeOwned>(
    status: StatusCode,
    signature: Option<&str>,
    body: &[u8],
    verifier: Option<&ResponseVerifier>,
) -> Result<T, PaymasterError> {
    if status.is_client_error() {
        return Err(error_body(body)
            .and_then(|e| e.messages.into_iter().next())
            .map_or_else(|| transport_error(status), PaymasterError::Service));
    }
    if status.is_server_error() {
        if let Some(ErrorBody {
            messages,
            revert_error,
        }) = error_body(body)
        {
            if let Some(message) = messages.into_iter().next() {
                if message.contains(CONTRACT_ERROR_MARKER) {
                    return Err(PaymasterError::ContractExecution {
                        message,
                        revert_error,
                    });
                }
            }
        }
        return Err(transport_error(status));
    }
    if !status.is_success() {
        return Err(transport_error(status));
    }
    if let Some(verifier) = verifier {
        verifier.verify(body, signature)?;
    }
    Ok(serde_json::from_slice(body)?)
}
