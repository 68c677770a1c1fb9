//! Service and signer seams.
//!
//! [`GaslessExecutor`](crate::executor::GaslessExecutor) is generic over a
//! [`PaymasterApi`] (the paymaster service) and a [`TypedDataSigner`] (the
//! account). The HTTP client in `gasless-http` implements the former; wallets
//! and test doubles implement the latter.
//!
//! Every service method takes a [`CancellationToken`]. Implementations must
//! stop issuing requests and return [`PaymasterError::Cancelled`] once it fires.

use std::future::Future;
use std::pin::Pin;

use starknet_core::types::Felt;
use tokio_util::sync::CancellationToken;

use crate::error::PaymasterError;
use crate::proto::{
    BuildTypedDataRequest, ExecuteRequest, GasTokenPrice, GaslessCompatibility, GaslessStatus,
    InvokeResult, PaymasterReward, RewardsFilter, TypedData,
};
use crate::signature::AccountSignature;

/// A pinned, boxed, `Send` future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Error type returned by [`TypedDataSigner`] implementations.
pub type SignerError = Box<dyn std::error::Error + Send + Sync>;

/// The paymaster service.
pub trait PaymasterApi: Send + Sync {
    /// Reports whether the service is up.
    fn status<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<GaslessStatus, PaymasterError>>;

    /// Reports whether `account` can use the service, and its validation overhead.
    fn account_compatibility<'a>(
        &'a self,
        account: &'a Felt,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<GaslessCompatibility, PaymasterError>>;

    /// Lists the sponsor rewards available to `account`.
    fn account_rewards<'a>(
        &'a self,
        account: &'a Felt,
        filter: &'a RewardsFilter,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<PaymasterReward>, PaymasterError>>;

    /// Lists the gas tokens the service accepts, with their prices.
    fn gas_token_prices<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<GasTokenPrice>, PaymasterError>>;

    /// Asks the service for a typed-data quote of a call batch.
    fn build_typed_data<'a>(
        &'a self,
        request: &'a BuildTypedDataRequest,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<TypedData, PaymasterError>>;

    /// Submits a signed quote for relaying.
    fn execute<'a>(
        &'a self,
        request: &'a ExecuteRequest,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<InvokeResult, PaymasterError>>;

    /// Whether requests carry a billing credential (an API key) the service
    /// can charge instead of the account.
    fn has_billing_credential(&self) -> bool;
}

/// The account that signs typed-data quotes.
pub trait TypedDataSigner: Send + Sync {
    /// Address of the signing account.
    fn address(&self) -> Felt;

    /// Signs a typed-data quote exactly as received.
    fn sign_typed_data<'a>(
        &'a self,
        typed_data: &'a TypedData,
    ) -> BoxFuture<'a, Result<AccountSignature, SignerError>>;
}

impl<T: PaymasterApi + ?Sized> PaymasterApi for std::sync::Arc<T> {
    fn status<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<GaslessStatus, PaymasterError>> {
        (**self).status(cancel)
    }

    fn account_compatibility<'a>(
        &'a self,
        account: &'a Felt,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<GaslessCompatibility, PaymasterError>> {
        (**self).account_compatibility(account, cancel)
    }

    fn account_rewards<'a>(
        &'a self,
        account: &'a Felt,
        filter: &'a RewardsFilter,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<PaymasterReward>, PaymasterError>> {
        (**self).account_rewards(account, filter, cancel)
    }

    fn gas_token_prices<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<GasTokenPrice>, PaymasterError>> {
        (**self).gas_token_prices(cancel)
    }

    fn build_typed_data<'a>(
        &'a self,
        request: &'a BuildTypedDataRequest,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<TypedData, PaymasterError>> {
        (**self).build_typed_data(request, cancel)
    }

    fn execute<'a>(
        &'a self,
        request: &'a ExecuteRequest,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<InvokeResult, PaymasterError>> {
        (**self).execute(request, cancel)
    }

    fn has_billing_credential(&self) -> bool {
        (**self).has_billing_credential()
    }
}
