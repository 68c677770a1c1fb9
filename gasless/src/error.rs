//! Error taxonomy of the gasless flow.
//!
//! [`PaymasterError`] is what a single service call or flow step can fail
//! with. [`ExecuteCallsError`] wraps it with the stage of the execution flow
//! that was active when it happened.

use crate::api::SignerError;
use crate::auth::AuthenticationError;
use crate::calldata::CalldataError;
use crate::executor::ExecutionStage;
use crate::fee::FeeError;

/// Boxed transport-level error (connection refused, TLS, body read...).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Marker the service puts in `messages[0]` of a 5xx body when the relayed
/// transaction reverted.
pub const CONTRACT_ERROR_MARKER: &str = "Contract error";

/// Errors raised by the paymaster service or by a step of the gasless flow.
#[derive(Debug, thiserror::Error)]
pub enum PaymasterError {
    /// Non-success HTTP status without a usable service message.
    #[error("{status} {status_text}")]
    Transport {
        /// HTTP status code.
        status: u16,
        /// Canonical reason phrase, empty if unknown.
        status_text: String,
    },
    /// The service rejected the request with a message.
    #[error("{0}")]
    Service(String),
    /// The relayed transaction reverted on chain.
    #[error("{message}")]
    ContractExecution {
        /// Service message.
        message: String,
        /// Revert reason reported by the network, if any.
        revert_error: Option<String>,
    },
    /// The response failed signature verification.
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthenticationError),
    /// No fee bound can be derived for the request.
    #[error("precondition failed: {0}")]
    Precondition(String),
    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,
    /// Fee conversion failed.
    #[error(transparent)]
    Fee(#[from] FeeError),
    /// Calldata normalization failed.
    #[error(transparent)]
    Calldata(#[from] CalldataError),
    /// The account refused or failed to sign.
    #[error("signing failed: {0}")]
    Signing(#[source] SignerError),
    /// The request could not be sent or the response body could not be read.
    #[error("request failed: {0}")]
    Request(#[source] BoxError),
    /// A body could not be encoded or decoded.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl PaymasterError {
    /// Builds a [`PaymasterError::Transport`] from a status code.
    #[must_use]
    pub fn transport(status: u16, status_text: impl Into<String>) -> Self {
        Self::Transport {
            status,
            status_text: status_text.into(),
        }
    }

    /// Whether this is a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// A failed [`execute_calls`](crate::executor::GaslessExecutor::execute_calls),
/// tagged with the stage it failed in.
#[derive(Debug, thiserror::Error)]
#[error("gasless execution failed while {stage}: {source}")]
pub struct ExecuteCallsError {
    /// Stage active when the error was raised.
    pub stage: ExecutionStage,
    /// Underlying error.
    #[source]
    pub source: PaymasterError,
}

impl ExecuteCallsError {
    /// Wraps `source` with `stage`.
    #[must_use]
    pub const fn new(stage: ExecutionStage, source: PaymasterError) -> Self {
        Self { stage, source }
    }
}
