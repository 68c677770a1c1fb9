#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for gasless (paymaster-relayed) Starknet transactions.
//!
//! A paymaster service fronts the network fees of an account and is reimbursed
//! in a token the account chooses, or by a sponsor. This crate holds the parts
//! of that flow that do not depend on a particular transport:
//!
//! - converting an ETH-denominated fee estimate into a bound in a gas token,
//! - authenticating signed service responses,
//! - normalizing call batches into flat calldata,
//! - orchestrating compatibility lookup, fee bounding, quote building, signing
//!   and submission.
//!
//! # Modules
//!
//! - [`api`] - Service and signer traits the orchestrator is generic over
//! - [`auth`] - Server response signature verification
//! - [`calldata`] - Call batches and calldata normalization
//! - [`error`] - Error taxonomy shared by every crate of the workspace
//! - [`executor`] - The execution flow (compatibility → fee bound → quote → sign → relay)
//! - [`fee`] - Integer-only fee conversion into gas token units
//! - [`proto`] - Wire format types of the paymaster service
//! - [`signature`] - Account signature shapes and their wire normalization
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation of the execution flow

pub mod api;
pub mod auth;
pub mod calldata;
pub mod error;
pub mod executor;
pub mod fee;
pub mod proto;
pub mod signature;

pub use api::{BoxFuture, PaymasterApi, SignerError, TypedDataSigner};
pub use auth::{AuthenticationError, ResponseVerifier, ServerSignature};
pub use calldata::{Call, CallArg, Calldata, CalldataError, FormattedCall, format_call};
pub use error::{ExecuteCallsError, PaymasterError};
pub use executor::{
    ExecuteCallsOptions, ExecutionStage, FeeBound, FeeDerivation, GaslessExecutor,
};
pub use fee::{FeeError, FeeEstimate, SafetyMargin};
pub use proto::{
    AccountDeploymentData, BuildTypedDataRequest, ExecuteRequest, GasTokenPrice,
    GaslessCompatibility, GaslessStatus, InvokeResult, PaymasterReward, RewardsFilter,
    TypedData, WhitelistedCall,
};
pub use signature::AccountSignature;

/// Re-export of the field element type used for addresses, hashes and calldata.
pub use starknet_core::types::Felt;
