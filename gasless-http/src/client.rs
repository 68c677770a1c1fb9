//! A [`gasless::PaymasterApi`] implementation that talks to a _remote_
//! paymaster service over HTTP.
//!
//! Every request honours the caller's [`CancellationToken`]: once it fires the
//! in-flight request is dropped and [`PaymasterError::Cancelled`] is returned.
//! No timeout is applied internally.
//!
//! The `signature` response header is read before the body is consumed, and
//! the body is kept as raw bytes until it has been authenticated.

use std::fmt::Display;

use gasless::api::BoxFuture;
use gasless::auth::ResponseVerifier;
use gasless::proto::encoding::felt_to_hex;
use gasless::proto::{
    BuildTypedDataRequest, ExecuteRequest, GasTokenPrice, GaslessCompatibility, GaslessStatus,
    InvokeResult, PaymasterReward, RewardsFilter, TypedData,
};
use gasless::{Felt, PaymasterApi, PaymasterError};
use http::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

#[cfg(feature = "telemetry")]
use tracing::{Span, instrument};

use crate::config::PaymasterConfig;
use crate::constants::{
    API_KEY_HEADER, ASK_SIGNATURE_HEADER, BUILD_TYPED_DATA_PATH, EXECUTE_PATH,
    GAS_TOKEN_PRICES_PATH, SIGNATURE_HEADER, STATUS_PATH,
};
use crate::error::ConfigError;
use crate::response::decode_response;

/// A client for one paymaster service.
#[derive(Clone, Debug)]
pub struct PaymasterClient {
    /// `{base_url}/{namespace}/v1/`
    api_root: Url,
    /// Full URL of `GET /status`
    status_url: Url,
    /// Full URL of `GET /gas-token-prices`
    gas_token_prices_url: Url,
    /// Full URL of `POST /build-typed-data`
    build_typed_data_url: Url,
    /// Full URL of `POST /execute`
    execute_url: Url,
    /// Shared Reqwest HTTP client
    client: Client,
    /// `ask-signature` and `api-key`, when configured
    headers: HeaderMap,
    /// Present when responses must be signed
    verifier: Option<ResponseVerifier>,
}

impl PaymasterClient {
    /// Builds a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an endpoint URL cannot be built or the API
    /// key is not a valid header value.
    pub fn new(config: &PaymasterConfig) -> Result<Self, ConfigError> {
        let api_root = config.api_root()?;
        let join = |path: &str, context: &'static str| {
            api_root
                .join(path)
                .map_err(|e| ConfigError::UrlParse { context, source: e })
        };
        let status_url = join(STATUS_PATH, "Failed to construct ./status URL")?;
        let gas_token_prices_url = join(
            GAS_TOKEN_PRICES_PATH,
            "Failed to construct ./gas-token-prices URL",
        )?;
        let build_typed_data_url = join(
            BUILD_TYPED_DATA_PATH,
            "Failed to construct ./build-typed-data URL",
        )?;
        let execute_url = join(EXECUTE_PATH, "Failed to construct ./execute URL")?;

        let mut headers = HeaderMap::new();
        if config.public_key.is_some() {
            headers.insert(ASK_SIGNATURE_HEADER, HeaderValue::from_static("true"));
        }
        if let Some(api_key) = &config.api_key {
            let mut value = HeaderValue::from_str(api_key).map_err(ConfigError::InvalidApiKey)?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
        }

        Ok(Self {
            api_root,
            status_url,
            gas_token_prices_url,
            build_typed_data_url,
            execute_url,
            client: Client::new(),
            headers,
            verifier: config.public_key.map(ResponseVerifier::new),
        })
    }

    /// Uses `client` for all future requests.
    #[must_use]
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Returns the versioned API root this client sends requests under.
    pub const fn api_root(&self) -> &Url {
        &self.api_root
    }

    /// Whether responses are authenticated.
    pub const fn verifies_responses(&self) -> bool {
        self.verifier.is_some()
    }

    /// Whether requests carry an API key.
    pub fn has_api_key(&self) -> bool {
        self.headers.contains_key(API_KEY_HEADER)
    }

    /// `GET /accounts/{account}/compatible`
    fn compatibility_url(&self, account: &Felt) -> Result<Url, PaymasterError> {
        self.account_url(account, "compatible")
    }

    /// `GET /accounts/{account}/rewards?sponsor=..&campaign=..&protocol=..`
    fn rewards_url(&self, account: &Felt, filter: &RewardsFilter) -> Result<Url, PaymasterError> {
        let mut url = self.account_url(account, "rewards")?;
        if !filter.is_empty() {
            url.query_pairs_mut().extend_pairs(filter.query_pairs());
        }
        Ok(url)
    }

    fn account_url(&self, account: &Felt, leaf: &str) -> Result<Url, PaymasterError> {
        let path = format!("accounts/{}/{leaf}", felt_to_hex(account));
        self.api_root
            .join(&path)
            .map_err(|e| PaymasterError::Request(Box::new(e)))
    }

    /// Sends a `GET /status` request.
    ///
    /// # Errors
    ///
    /// Returns [`PaymasterError`] if the request fails, is rejected, or is cancelled.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "gasless.paymaster.status", skip_all, err)
    )]
    pub async fn status(&self, cancel: &CancellationToken) -> Result<GaslessStatus, PaymasterError> {
        let request = self.client.get(self.status_url.clone());
        self.send(request, "GET /status", cancel).await
    }

    /// Sends a `GET /accounts/{account}/compatible` request.
    ///
    /// # Errors
    ///
    /// Returns [`PaymasterError`] if the request fails, is rejected, or is cancelled.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "gasless.paymaster.compatibility",
            skip_all,
            err,
            fields(account = %felt_to_hex(account))
        )
    )]
    pub async fn account_compatibility(
        &self,
        account: &Felt,
        cancel: &CancellationToken,
    ) -> Result<GaslessCompatibility, PaymasterError> {
        let request = self.client.get(self.compatibility_url(account)?);
        self.send(request, "GET /accounts/{account}/compatible", cancel)
            .await
    }

    /// Sends a `GET /accounts/{account}/rewards` request.
    ///
    /// Filter values are sent as repeated query keys.
    ///
    /// # Errors
    ///
    /// Returns [`PaymasterError`] if the request fails, is rejected, or is cancelled.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "gasless.paymaster.rewards",
            skip_all,
            err,
            fields(account = %felt_to_hex(account))
        )
    )]
    pub async fn account_rewards(
        &self,
        account: &Felt,
        filter: &RewardsFilter,
        cancel: &CancellationToken,
    ) -> Result<Vec<PaymasterReward>, PaymasterError> {
        let request = self.client.get(self.rewards_url(account, filter)?);
        self.send(request, "GET /accounts/{account}/rewards", cancel)
            .await
    }

    /// Sends a `GET /gas-token-prices` request.
    ///
    /// # Errors
    ///
    /// Returns [`PaymasterError`] if the request fails, is rejected, or is cancelled.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "gasless.paymaster.gas_token_prices", skip_all, err)
    )]
    pub async fn gas_token_prices(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<GasTokenPrice>, PaymasterError> {
        let request = self.client.get(self.gas_token_prices_url.clone());
        self.send(request, "GET /gas-token-prices", cancel).await
    }

    /// Sends a `POST /build-typed-data` request.
    ///
    /// # Errors
    ///
    /// Returns [`PaymasterError`] if the request fails, is rejected, or is cancelled.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "gasless.paymaster.build_typed_data",
            skip_all,
            err,
            fields(calls = request.calls.len())
        )
    )]
    pub async fn build_typed_data(
        &self,
        request: &BuildTypedDataRequest,
        cancel: &CancellationToken,
    ) -> Result<TypedData, PaymasterError> {
        let request = self
            .client
            .post(self.build_typed_data_url.clone())
            .json(request);
        self.send(request, "POST /build-typed-data", cancel).await
    }

    /// Sends a `POST /execute` request.
    ///
    /// Cancelling after the request has been sent does not recall the
    /// transaction; it only stops waiting for the answer.
    ///
    /// # Errors
    ///
    /// Returns [`PaymasterError`] if the request fails, is rejected, or is cancelled.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "gasless.paymaster.execute", skip_all, err)
    )]
    pub async fn execute(
        &self,
        request: &ExecuteRequest,
        cancel: &CancellationToken,
    ) -> Result<InvokeResult, PaymasterError> {
        let request = self.client.post(self.execute_url.clone()).json(request);
        self.send(request, "POST /execute", cancel).await
    }

    /// Sends `request` with the configured headers, then classifies,
    /// authenticates and decodes the response.
    ///
    /// `context` is a human-readable identifier used in tracing (e.g. `"GET /status"`).
    async fn send<R>(
        &self,
        request: RequestBuilder,
        context: &'static str,
        cancel: &CancellationToken,
    ) -> Result<R, PaymasterError>
    where
        R: DeserializeOwned,
    {
        let exchange = async {
            let response = request
                .headers(self.headers.clone())
                .send()
                .await
                .map_err(|e| PaymasterError::Request(Box::new(e)))?;
            let status = response.status();
            let signature = response
                .headers()
                .get(SIGNATURE_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            let body = response
                .bytes()
                .await
                .map_err(|e| PaymasterError::Request(Box::new(e)))?;
            decode_response(status, signature.as_deref(), &body, self.verifier.as_ref())
        };

        let result = cancel
            .run_until_cancelled(exchange)
            .await
            .unwrap_or_else(|| Err(PaymasterError::Cancelled));

        record_result_on_span(context, &result);

        result
    }
}

impl PaymasterApi for PaymasterClient {
    fn status<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<GaslessStatus, PaymasterError>> {
        Box::pin(Self::status(self, cancel))
    }

    fn account_compatibility<'a>(
        &'a self,
        account: &'a Felt,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<GaslessCompatibility, PaymasterError>> {
        Box::pin(Self::account_compatibility(self, account, cancel))
    }

    fn account_rewards<'a>(
        &'a self,
        account: &'a Felt,
        filter: &'a RewardsFilter,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<PaymasterReward>, PaymasterError>> {
        Box::pin(Self::account_rewards(self, account, filter, cancel))
    }

    fn gas_token_prices<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<GasTokenPrice>, PaymasterError>> {
        Box::pin(Self::gas_token_prices(self, cancel))
    }

    fn build_typed_data<'a>(
        &'a self,
        request: &'a BuildTypedDataRequest,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<TypedData, PaymasterError>> {
        Box::pin(Self::build_typed_data(self, request, cancel))
    }

    fn execute<'a>(
        &'a self,
        request: &'a ExecuteRequest,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<InvokeResult, PaymasterError>> {
        Box::pin(Self::execute(self, request, cancel))
    }

    fn has_billing_credential(&self) -> bool {
        self.has_api_key()
    }
}

/// Records the outcome of a request on the current span, including errors.
#[cfg(feature = "telemetry")]
fn record_result_on_span<R, E: Display>(context: &'static str, result: &Result<R, E>) {
    let span = Span::current();
    match result {
        Ok(_) => {
            span.record("otel.status_code", "OK");
        }
        Err(err) => {
            span.record("otel.status_code", "ERROR");
            span.record("error.message", tracing::field::display(err));
            tracing::event!(tracing::Level::WARN, request = context, error = %err, "Request to paymaster failed");
        }
    }
}

/// Records the outcome of a request on a tracing span, including status and errors.
/// Noop if telemetry feature is off.
#[cfg(not(feature = "telemetry"))]
const fn record_result_on_span<R, E: Display>(_context: &'static str, _result: &Result<R, E>) {}
