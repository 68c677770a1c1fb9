//! The gasless execution flow.
//!
//! [`GaslessExecutor::execute_calls`] runs one strictly ordered flow per call:
//!
//! ```text
//! Idle → Authorizing → FeeBounding → QuoteBuilding → Signing → Submitting → Done
//! ```
//!
//! Any error moves the flow to `Failed` and is returned tagged with the stage
//! it happened in. Nothing fetched during a flow (compatibility, rewards,
//! prices, quote) outlives it, and nothing is retried.

use std::fmt;

use alloy_primitives::U256;
use starknet_core::types::Felt;
use tokio_util::sync::CancellationToken;
#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::api::{PaymasterApi, TypedDataSigner};
use crate::calldata::{Call, FormattedCall, format_call};
use crate::error::{ExecuteCallsError, PaymasterError};
use crate::fee::{FeeEstimate, SafetyMargin, find_gas_token_price, max_gas_token_amount};
use crate::proto::encoding::{felt_to_hex, uint_to_hex};
use crate::proto::{
    AccountDeploymentData, BuildTypedDataRequest, ExecuteRequest, GaslessCompatibility,
    InvokeResult, PaymasterReward, RewardsFilter,
};

/// A step of the execution flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionStage {
    /// Nothing has been requested yet.
    Idle,
    /// Fetching account compatibility and sponsor rewards.
    Authorizing,
    /// Resolving the maximum gas token spend.
    FeeBounding,
    /// Normalizing calldata and requesting the typed-data quote.
    QuoteBuilding,
    /// Waiting for the account signature.
    Signing,
    /// Submitting the signed quote.
    Submitting,
    /// The transaction was accepted for relay.
    Done,
    /// The flow was aborted.
    Failed,
}

impl ExecutionStage {
    /// Kebab-case name of the stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Authorizing => "authorizing",
            Self::FeeBounding => "fee-bounding",
            Self::QuoteBuilding => "quote-building",
            Self::Signing => "signing",
            Self::Submitting => "submitting",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ExecutionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs for deriving a gas token bound from a network fee estimate.
///
/// The margin is mandatory: the conversion truncates, so the caller decides
/// how much headroom to authorize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeDerivation {
    /// Network fee estimate of the batch.
    pub estimate: FeeEstimate,
    /// Multiplier applied to the converted fee.
    pub margin: SafetyMargin,
}

/// Options of a single [`GaslessExecutor::execute_calls`] invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteCallsOptions {
    /// Token the account pays gas in.
    pub gas_token_address: Option<Felt>,
    /// Explicit maximum spend, in gas token units. Takes precedence over any
    /// other fee source and skips the validation overhead.
    pub max_gas_token_amount: Option<U256>,
    /// Estimate and margin to derive the maximum spend from.
    pub fee_derivation: Option<FeeDerivation>,
    /// Deployment data, for accounts not yet deployed.
    pub deployment_data: Option<AccountDeploymentData>,
    /// Class hash of the account, forwarded to the quote builder.
    pub account_class_hash: Option<Felt>,
    /// Reward filter. `None` skips the reward lookup.
    pub rewards_filter: Option<RewardsFilter>,
}

impl Default for ExecuteCallsOptions {
    fn default() -> Self {
        Self {
            gas_token_address: None,
            max_gas_token_amount: None,
            fee_derivation: None,
            deployment_data: None,
            account_class_hash: None,
            rewards_filter: Some(RewardsFilter::default()),
        }
    }
}

impl ExecuteCallsOptions {
    /// Default options: reward lookup enabled, no fee source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the gas token.
    #[must_use]
    pub const fn with_gas_token(mut self, gas_token_address: Felt) -> Self {
        self.gas_token_address = Some(gas_token_address);
        self
    }

    /// Sets an explicit maximum spend.
    #[must_use]
    pub const fn with_max_gas_token_amount(mut self, amount: U256) -> Self {
        self.max_gas_token_amount = Some(amount);
        self
    }

    /// Derives the maximum spend from `estimate`, multiplied by `margin`.
    #[must_use]
    pub const fn with_fee_estimate(mut self, estimate: FeeEstimate, margin: SafetyMargin) -> Self {
        self.fee_derivation = Some(FeeDerivation { estimate, margin });
        self
    }

    /// Sets deployment data.
    #[must_use]
    pub fn with_deployment_data(mut self, deployment_data: AccountDeploymentData) -> Self {
        self.deployment_data = Some(deployment_data);
        self
    }

    /// Sets the account class hash.
    #[must_use]
    pub const fn with_account_class_hash(mut self, class_hash: Felt) -> Self {
        self.account_class_hash = Some(class_hash);
        self
    }

    /// Filters the reward lookup.
    #[must_use]
    pub fn with_rewards_filter(mut self, filter: RewardsFilter) -> Self {
        self.rewards_filter = Some(filter);
        self
    }

    /// Skips the reward lookup.
    #[must_use]
    pub fn without_rewards_lookup(mut self) -> Self {
        self.rewards_filter = None;
        self
    }
}

/// How the gas of a batch is paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeBound {
    /// The account pays at most `max_amount` of `address`.
    GasToken {
        /// Gas token.
        address: Felt,
        /// Maximum spend, in token units.
        max_amount: U256,
    },
    /// A sponsor covers the fees.
    Sponsored {
        /// Number of matching rewards.
        rewards: usize,
    },
    /// The integrator's API key is billed.
    BillingCredential,
}

impl FeeBound {
    /// Gas token fields of the quote request for this bound.
    #[must_use]
    pub const fn quote_fields(&self) -> (Option<Felt>, Option<U256>) {
        match self {
            Self::GasToken {
                address,
                max_amount,
            } => (Some(*address), Some(*max_amount)),
            Self::Sponsored { .. } | Self::BillingCredential => (None, None),
        }
    }
}

impl fmt::Display for FeeBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GasToken {
                address,
                max_amount,
            } => write!(
                f,
                "at most {} of {}",
                uint_to_hex(*max_amount),
                felt_to_hex(address)
            ),
            Self::Sponsored { rewards } => write!(f, "sponsored ({rewards} rewards)"),
            Self::BillingCredential => f.write_str("billed to api key"),
        }
    }
}

/// Tracks the current stage of one flow.
struct Flow<'a> {
    stage: ExecutionStage,
    cancel: &'a CancellationToken,
}

impl<'a> Flow<'a> {
    const fn new(cancel: &'a CancellationToken) -> Self {
        Self {
            stage: ExecutionStage::Idle,
            cancel,
        }
    }

    fn enter(&mut self, stage: ExecutionStage) -> Result<(), ExecuteCallsError> {
        if self.cancel.is_cancelled() {
            return Err(self.fail(PaymasterError::Cancelled));
        }
        #[cfg(feature = "telemetry")]
        tracing::debug!(from = %self.stage, to = %stage, "gasless flow transition");
        self.stage = stage;
        Ok(())
    }

    /// Marks the flow as done. The token is not consulted: once the service
    /// acknowledged the submission, the transaction is relayed.
    fn finish(&mut self) {
        #[cfg(feature = "telemetry")]
        tracing::debug!(from = %self.stage, to = %ExecutionStage::Done, "gasless flow transition");
        self.stage = ExecutionStage::Done;
    }

    fn fail(&mut self, source: PaymasterError) -> ExecuteCallsError {
        let stage = self.stage;
        #[cfg(feature = "telemetry")]
        tracing::warn!(stage = %stage, error = %source, "gasless flow failed");
        self.stage = ExecutionStage::Failed;
        ExecuteCallsError::new(stage, source)
    }

    fn check<T>(&mut self, result: Result<T, PaymasterError>) -> Result<T, ExecuteCallsError> {
        result.map_err(|e| self.fail(e))
    }
}

/// Runs gasless flows for one account against one service.
#[derive(Debug, Clone)]
pub struct GaslessExecutor<A, S> {
    api: A,
    signer: S,
}

impl<A, S> GaslessExecutor<A, S>
where
    A: PaymasterApi,
    S: TypedDataSigner,
{
    /// Creates an executor.
    pub const fn new(api: A, signer: S) -> Self {
        Self { api, signer }
    }

    /// The service.
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// The signing account.
    pub const fn signer(&self) -> &S {
        &self.signer
    }

    /// Quotes, signs and relays `calls` with gas paid according to `options`.
    ///
    /// Exactly one signature is requested from the account and exactly one
    /// submission is made. A fee source must be resolvable, in this order:
    /// an explicit maximum amount, a matching sponsor reward, a fee estimate
    /// paired with a gas token, or a billing credential on the service.
    ///
    /// # Errors
    ///
    /// Returns an [`ExecuteCallsError`] carrying the stage that failed.
    /// [`PaymasterError::Precondition`] is raised at [`ExecutionStage::Idle`],
    /// before any request, when no fee source can possibly resolve.
    #[cfg_attr(feature = "telemetry", instrument(
        name = "gasless.execute_calls",
        skip_all,
        err,
        fields(account = %felt_to_hex(&self.signer.address()), calls = calls.len())
    ))]
    pub async fn execute_calls(
        &self,
        calls: &[Call],
        options: &ExecuteCallsOptions,
        cancel: &CancellationToken,
    ) -> Result<InvokeResult, ExecuteCallsError> {
        let mut flow = Flow::new(cancel);
        let precheck = self.precheck(calls, options);
        flow.check(precheck)?;
        let account = self.signer.address();

        flow.enter(ExecutionStage::Authorizing)?;
        let compatibility = self.api.account_compatibility(&account, cancel).await;
        let compatibility = flow.check(compatibility)?;
        #[cfg(feature = "telemetry")]
        if !compatibility.is_compatible {
            tracing::warn!(account = %felt_to_hex(&account), "account is not compatible with the paymaster");
        }
        let rewards = match &options.rewards_filter {
            Some(filter) => {
                let rewards = self.api.account_rewards(&account, filter, cancel).await;
                flow.check(rewards)?
            }
            None => Vec::new(),
        };

        flow.enter(ExecutionStage::FeeBounding)?;
        let bound = self
            .resolve_fee_bound(options, &compatibility, &rewards, cancel)
            .await;
        let bound = flow.check(bound)?;
        #[cfg(feature = "telemetry")]
        tracing::info!(bound = %bound, "fee bound resolved");

        flow.enter(ExecutionStage::QuoteBuilding)?;
        let formatted = calls
            .iter()
            .map(format_call)
            .collect::<Result<Vec<FormattedCall>, _>>()
            .map_err(PaymasterError::from);
        let formatted = flow.check(formatted)?;
        let (gas_token_address, max_gas_token_amount) = bound.quote_fields();
        let request = BuildTypedDataRequest {
            user_address: account,
            calls: formatted,
            gas_token_address,
            max_gas_token_amount,
            account_class_hash: options.account_class_hash,
        };
        let typed_data = self.api.build_typed_data(&request, cancel).await;
        let typed_data = flow.check(typed_data)?;

        flow.enter(ExecutionStage::Signing)?;
        let signature = match cancel
            .run_until_cancelled(self.signer.sign_typed_data(&typed_data))
            .await
        {
            Some(Ok(signature)) => Ok(signature),
            Some(Err(e)) => Err(PaymasterError::Signing(e)),
            None => Err(PaymasterError::Cancelled),
        };
        let signature = flow.check(signature)?;

        flow.enter(ExecutionStage::Submitting)?;
        let request = ExecuteRequest {
            user_address: account,
            typed_data: typed_data.as_str().to_owned(),
            signature: signature.to_wire(),
            deployment_data: options.deployment_data.clone(),
        };
        let result = self.api.execute(&request, cancel).await;
        let result = flow.check(result)?;

        flow.finish();
        #[cfg(feature = "telemetry")]
        tracing::info!(tx = %felt_to_hex(&result.transaction_hash), "gasless transaction relayed");
        Ok(result)
    }

    /// Rejects requests that cannot succeed, before any network call.
    fn precheck(&self, calls: &[Call], options: &ExecuteCallsOptions) -> Result<(), PaymasterError> {
        if calls.is_empty() {
            return Err(PaymasterError::Precondition("no calls to execute".to_owned()));
        }
        if options.max_gas_token_amount.is_some() && options.gas_token_address.is_none() {
            return Err(PaymasterError::Precondition(
                "an explicit maximum amount requires a gas token".to_owned(),
            ));
        }
        let derivable = options.fee_derivation.is_some() && options.gas_token_address.is_some();
        if options.max_gas_token_amount.is_none()
            && !derivable
            && options.rewards_filter.is_none()
            && !self.api.has_billing_credential()
        {
            return Err(PaymasterError::Precondition(
                "no fee source: set a maximum amount, a fee estimate with a gas token, \
                 an api key, or enable the reward lookup"
                    .to_owned(),
            ));
        }
        Ok(())
    }

    async fn resolve_fee_bound(
        &self,
        options: &ExecuteCallsOptions,
        compatibility: &GaslessCompatibility,
        rewards: &[PaymasterReward],
        cancel: &CancellationToken,
    ) -> Result<FeeBound, PaymasterError> {
        if let (Some(address), Some(max_amount)) =
            (options.gas_token_address, options.max_gas_token_amount)
        {
            return Ok(FeeBound::GasToken {
                address,
                max_amount,
            });
        }
        if !rewards.is_empty() {
            return Ok(FeeBound::Sponsored {
                rewards: rewards.len(),
            });
        }
        if let (Some(address), Some(derivation)) =
            (options.gas_token_address, options.fee_derivation)
        {
            let prices = self.api.gas_token_prices(cancel).await?;
            let price = find_gas_token_price(&prices, &address)?;
            let max_amount =
                max_gas_token_amount(&derivation.estimate, price, compatibility, derivation.margin)?;
            return Ok(FeeBound::GasToken {
                address,
                max_amount,
            });
        }
        if self.api.has_billing_credential() {
            return Ok(FeeBound::BillingCredential);
        }
        Err(PaymasterError::Precondition(
            "no sponsor reward matched and no other fee source is configured".to_owned(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::api::{BoxFuture, SignerError};
    use crate::fee::FeeError;
    use crate::proto::{GasTokenPrice, GaslessStatus, TypedData};
    use crate::signature::AccountSignature;

    const ACCOUNT: u64 = 0xacc;
    const USDC: &str = "0x053c91253bc9682c04929ca02ed00b3e423f6710d2ee7e0d5ebb06f3ecf368a8";
    const QUOTE: &str = r#"{"types":{},"primaryType":"OutsideExecution","message":{"caller":"0x414e595f43414c4c4552","nonce":123456789012345678901234567890}}"#;

    fn usdc() -> Felt {
        Felt::from_hex(USDC).unwrap()
    }

    #[derive(Default)]
    struct FakeApi {
        compatibility: GaslessCompatibility,
        rewards: Vec<PaymasterReward>,
        billing: bool,
        fail_build: bool,
        cancel_on_execute: bool,
        log: Mutex<Vec<&'static str>>,
        built: Mutex<Option<BuildTypedDataRequest>>,
        executed: Mutex<Option<ExecuteRequest>>,
    }

    impl FakeApi {
        fn record(&self, name: &'static str) {
            self.log.lock().unwrap().push(name);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.log.lock().unwrap().clone()
        }

        fn built(&self) -> BuildTypedDataRequest {
            self.built.lock().unwrap().clone().unwrap()
        }

        fn executed(&self) -> ExecuteRequest {
            self.executed.lock().unwrap().clone().unwrap()
        }
    }

    fn ready<'a, T: Send + 'a>(value: T) -> BoxFuture<'a, T> {
        Box::pin(std::future::ready(value))
    }

    impl PaymasterApi for FakeApi {
        fn status<'a>(
            &'a self,
            _cancel: &'a CancellationToken,
        ) -> BoxFuture<'a, Result<GaslessStatus, PaymasterError>> {
            self.record("status");
            ready(Ok(GaslessStatus {
                status: true,
                last_checked: None,
            }))
        }

        fn account_compatibility<'a>(
            &'a self,
            _account: &'a Felt,
            _cancel: &'a CancellationToken,
        ) -> BoxFuture<'a, Result<GaslessCompatibility, PaymasterError>> {
            self.record("compatibility");
            ready(Ok(self.compatibility.clone()))
        }

        fn account_rewards<'a>(
            &'a self,
            _account: &'a Felt,
            _filter: &'a RewardsFilter,
            _cancel: &'a CancellationToken,
        ) -> BoxFuture<'a, Result<Vec<PaymasterReward>, PaymasterError>> {
            self.record("rewards");
            ready(Ok(self.rewards.clone()))
        }

        fn gas_token_prices<'a>(
            &'a self,
            _cancel: &'a CancellationToken,
        ) -> BoxFuture<'a, Result<Vec<GasTokenPrice>, PaymasterError>> {
            self.record("prices");
            ready(Ok(vec![GasTokenPrice {
                token_address: usdc(),
                price_in_eth: U256::from(500_000_000_000_000u64),
                price_in_usd: 1.0,
                decimals: 6,
            }]))
        }

        fn build_typed_data<'a>(
            &'a self,
            request: &'a BuildTypedDataRequest,
            _cancel: &'a CancellationToken,
        ) -> BoxFuture<'a, Result<TypedData, PaymasterError>> {
            self.record("build");
            *self.built.lock().unwrap() = Some(request.clone());
            if self.fail_build {
                return ready(Err(PaymasterError::Service(
                    "Invalid gas token".to_owned(),
                )));
            }
            ready(Ok(TypedData::from_json(QUOTE.to_owned()).unwrap()))
        }

        fn execute<'a>(
            &'a self,
            request: &'a ExecuteRequest,
            cancel: &'a CancellationToken,
        ) -> BoxFuture<'a, Result<InvokeResult, PaymasterError>> {
            self.record("execute");
            *self.executed.lock().unwrap() = Some(request.clone());
            if self.cancel_on_execute {
                cancel.cancel();
            }
            ready(Ok(InvokeResult {
                transaction_hash: Felt::from(0x7731u64),
            }))
        }

        fn has_billing_credential(&self) -> bool {
            self.billing
        }
    }

    #[derive(Default)]
    struct FakeSigner {
        signature: Option<AccountSignature>,
        pending: bool,
        refuse: bool,
        signed: Mutex<usize>,
    }

    impl TypedDataSigner for FakeSigner {
        fn address(&self) -> Felt {
            Felt::from(ACCOUNT)
        }

        fn sign_typed_data<'a>(
            &'a self,
            _typed_data: &'a TypedData,
        ) -> BoxFuture<'a, Result<AccountSignature, SignerError>> {
            *self.signed.lock().unwrap() += 1;
            if self.pending {
                return Box::pin(std::future::pending());
            }
            if self.refuse {
                return ready(Err("user rejected the request".into()));
            }
            let signature = self.signature.clone().unwrap_or(AccountSignature::Components {
                r: Felt::from(1u64),
                s: Felt::from(2u64),
            });
            ready(Ok(signature))
        }
    }

    fn transfer() -> Vec<Call> {
        vec![Call::compiled(usdc(), "transfer", ["0xabc", "1000", "0"])]
    }

    fn reward() -> PaymasterReward {
        serde_json::from_value(serde_json::json!({
            "date": "2024-01-01T00:00:00Z",
            "address": "0xacc",
            "sponsor": "AVNU",
            "campaign": "launch",
            "freeTx": 3,
            "whitelistedCalls": []
        }))
        .unwrap()
    }

    async fn run(
        api: FakeApi,
        signer: FakeSigner,
        options: ExecuteCallsOptions,
    ) -> (
        Result<InvokeResult, ExecuteCallsError>,
        GaslessExecutor<FakeApi, FakeSigner>,
    ) {
        let executor = GaslessExecutor::new(api, signer);
        let result = executor
            .execute_calls(&transfer(), &options, &CancellationToken::new())
            .await;
        (result, executor)
    }

    #[tokio::test]
    async fn test_explicit_amount_bypasses_overhead_for_incompatible_account() {
        let api = FakeApi {
            compatibility: GaslessCompatibility {
                is_compatible: false,
                gas_consumed_overhead: U256::from(1_000u64),
                data_gas_consumed_overhead: U256::ZERO,
            },
            ..FakeApi::default()
        };
        let options = ExecuteCallsOptions::new()
            .with_gas_token(usdc())
            .with_max_gas_token_amount(U256::from(42u64));
        let (result, executor) = run(api, FakeSigner::default(), options).await;
        assert_eq!(result.unwrap().transaction_hash, Felt::from(0x7731u64));
        let built = executor.api().built();
        assert_eq!(built.gas_token_address, Some(usdc()));
        assert_eq!(built.max_gas_token_amount, Some(U256::from(42u64)));
        assert_eq!(
            executor.api().calls(),
            vec!["compatibility", "rewards", "build", "execute"]
        );
    }

    #[tokio::test]
    async fn test_explicit_amount_wins_over_rewards() {
        let api = FakeApi {
            rewards: vec![reward()],
            ..FakeApi::default()
        };
        let options = ExecuteCallsOptions::new()
            .with_gas_token(usdc())
            .with_max_gas_token_amount(U256::from(42u64));
        let (result, executor) = run(api, FakeSigner::default(), options).await;
        assert!(result.is_ok());
        assert_eq!(
            executor.api().built().max_gas_token_amount,
            Some(U256::from(42u64))
        );
    }

    #[tokio::test]
    async fn test_derived_bound_applies_overhead_then_margin() {
        let api = FakeApi {
            compatibility: GaslessCompatibility {
                is_compatible: true,
                gas_consumed_overhead: U256::from(1_000u64),
                data_gas_consumed_overhead: U256::ZERO,
            },
            ..FakeApi::default()
        };
        let estimate = FeeEstimate::new(U256::from(500_000_000_000_000u64))
            .with_gas_price(U256::from(23_000_000_000u64))
            .with_data_gas_price(U256::from(1u64));
        let options = ExecuteCallsOptions::new()
            .with_gas_token(usdc())
            .with_fee_estimate(estimate, SafetyMargin::DOUBLE);
        let (result, executor) = run(api, FakeSigner::default(), options).await;
        assert!(result.is_ok());
        assert_eq!(
            executor.api().built().max_gas_token_amount,
            Some(U256::from(2_092_000u64))
        );
        assert_eq!(
            executor.api().calls(),
            vec!["compatibility", "rewards", "prices", "build", "execute"]
        );
    }

    #[tokio::test]
    async fn test_sponsored_batch_sends_no_gas_token() {
        let api = FakeApi {
            rewards: vec![reward()],
            ..FakeApi::default()
        };
        let estimate = FeeEstimate::new(U256::from(1u64));
        let options = ExecuteCallsOptions::new()
            .with_gas_token(usdc())
            .with_fee_estimate(estimate, SafetyMargin::EXACT);
        let (result, executor) = run(api, FakeSigner::default(), options).await;
        assert!(result.is_ok());
        let built = executor.api().built();
        assert_eq!(built.gas_token_address, None);
        assert_eq!(built.max_gas_token_amount, None);
        assert!(!executor.api().calls().contains(&"prices"));
    }

    #[tokio::test]
    async fn test_billing_credential_without_rewards_lookup() {
        let api = FakeApi {
            billing: true,
            ..FakeApi::default()
        };
        let options = ExecuteCallsOptions::new().without_rewards_lookup();
        let (result, executor) = run(api, FakeSigner::default(), options).await;
        assert!(result.is_ok());
        assert_eq!(
            executor.api().calls(),
            vec!["compatibility", "build", "execute"]
        );
        assert_eq!(executor.api().built().max_gas_token_amount, None);
    }

    #[tokio::test]
    async fn test_no_fee_source_fails_before_any_request() {
        let options = ExecuteCallsOptions::new().without_rewards_lookup();
        let (result, executor) = run(FakeApi::default(), FakeSigner::default(), options).await;
        let err = result.unwrap_err();
        assert_eq!(err.stage, ExecutionStage::Idle);
        assert!(matches!(err.source, PaymasterError::Precondition(_)));
        assert!(executor.api().calls().is_empty());
        assert_eq!(*executor.signer().signed.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_explicit_amount_without_gas_token_is_rejected() {
        let options = ExecuteCallsOptions::new().with_max_gas_token_amount(U256::from(1u64));
        let (result, executor) = run(FakeApi::default(), FakeSigner::default(), options).await;
        let err = result.unwrap_err();
        assert_eq!(err.stage, ExecutionStage::Idle);
        assert!(matches!(err.source, PaymasterError::Precondition(_)));
        assert!(executor.api().calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_rewards_without_other_source_fails_before_quote() {
        let (result, executor) = run(
            FakeApi::default(),
            FakeSigner::default(),
            ExecuteCallsOptions::new(),
        )
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.stage, ExecutionStage::FeeBounding);
        assert!(matches!(err.source, PaymasterError::Precondition(_)));
        assert_eq!(executor.api().calls(), vec!["compatibility", "rewards"]);
        assert_eq!(*executor.signer().signed.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_gas_token_fails_fee_bounding() {
        let options = ExecuteCallsOptions::new()
            .with_gas_token(Felt::from(0x1234u64))
            .with_fee_estimate(FeeEstimate::new(U256::from(1u64)), SafetyMargin::DOUBLE);
        let (result, executor) = run(FakeApi::default(), FakeSigner::default(), options).await;
        let err = result.unwrap_err();
        assert_eq!(err.stage, ExecutionStage::FeeBounding);
        assert!(matches!(
            err.source,
            PaymasterError::Fee(FeeError::UnknownGasToken(_))
        ));
        assert!(!executor.api().calls().contains(&"build"));
    }

    #[tokio::test]
    async fn test_build_failure_never_reaches_signer() {
        let api = FakeApi {
            billing: true,
            fail_build: true,
            ..FakeApi::default()
        };
        let (result, executor) = run(api, FakeSigner::default(), ExecuteCallsOptions::new()).await;
        let err = result.unwrap_err();
        assert_eq!(err.stage, ExecutionStage::QuoteBuilding);
        assert!(matches!(err.source, PaymasterError::Service(ref m) if m == "Invalid gas token"));
        assert_eq!(*executor.signer().signed.lock().unwrap(), 0);
        assert!(!executor.api().calls().contains(&"execute"));
    }

    #[tokio::test]
    async fn test_invalid_calldata_fails_quote_building() {
        let api = FakeApi {
            billing: true,
            ..FakeApi::default()
        };
        let executor = GaslessExecutor::new(api, FakeSigner::default());
        let calls = vec![Call::compiled(usdc(), "transfer", ["not-a-number"])];
        let err = executor
            .execute_calls(&calls, &ExecuteCallsOptions::new(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.stage, ExecutionStage::QuoteBuilding);
        assert!(matches!(err.source, PaymasterError::Calldata(_)));
        assert!(!executor.api().calls().contains(&"build"));
    }

    #[tokio::test]
    async fn test_signer_refusal_is_not_submitted() {
        let api = FakeApi {
            billing: true,
            ..FakeApi::default()
        };
        let signer = FakeSigner {
            refuse: true,
            ..FakeSigner::default()
        };
        let (result, executor) = run(api, signer, ExecuteCallsOptions::new()).await;
        let err = result.unwrap_err();
        assert_eq!(err.stage, ExecutionStage::Signing);
        assert!(matches!(err.source, PaymasterError::Signing(_)));
        assert!(!executor.api().calls().contains(&"execute"));
    }

    #[tokio::test]
    async fn test_cancellation_while_signing() {
        let api = FakeApi {
            billing: true,
            ..FakeApi::default()
        };
        let signer = FakeSigner {
            pending: true,
            ..FakeSigner::default()
        };
        let executor = GaslessExecutor::new(api, signer);
        let cancel = CancellationToken::new();
        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                cancel.cancel();
            })
        };
        let err = executor
            .execute_calls(&transfer(), &ExecuteCallsOptions::new(), &cancel)
            .await
            .unwrap_err();
        canceller.await.unwrap();
        assert_eq!(err.stage, ExecutionStage::Signing);
        assert!(err.source.is_cancelled());
        assert!(!executor.api().calls().contains(&"execute"));
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_before_first_request() {
        let api = FakeApi {
            billing: true,
            ..FakeApi::default()
        };
        let executor = GaslessExecutor::new(api, FakeSigner::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = executor
            .execute_calls(&transfer(), &ExecuteCallsOptions::new(), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.stage, ExecutionStage::Idle);
        assert!(err.source.is_cancelled());
        assert!(executor.api().calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_after_acknowledged_submission_keeps_result() {
        let api = FakeApi {
            billing: true,
            cancel_on_execute: true,
            ..FakeApi::default()
        };
        let executor = GaslessExecutor::new(api, FakeSigner::default());
        let cancel = CancellationToken::new();
        let result = executor
            .execute_calls(&transfer(), &ExecuteCallsOptions::new(), &cancel)
            .await;
        assert!(cancel.is_cancelled());
        assert_eq!(result.unwrap().transaction_hash, Felt::from(0x7731u64));
        assert_eq!(
            executor.api().calls(),
            vec!["compatibility", "rewards", "build", "execute"]
        );
    }

    #[tokio::test]
    async fn test_submission_carries_normalized_signature_and_quote() {
        let api = FakeApi {
            billing: true,
            ..FakeApi::default()
        };
        let signer = FakeSigner {
            signature: Some(AccountSignature::Array(vec![
                Felt::from(0xau64),
                Felt::from(0x100u64),
            ])),
            ..FakeSigner::default()
        };
        let (result, executor) = run(api, signer, ExecuteCallsOptions::new()).await;
        assert!(result.is_ok());
        let executed = executor.api().executed();
        assert_eq!(executed.signature, vec!["0x0a", "0x0100"]);
        assert_eq!(executed.user_address, Felt::from(ACCOUNT));
        assert_eq!(executed.typed_data, QUOTE);
        assert_eq!(*executor.signer().signed.lock().unwrap(), 1);
        assert_eq!(
            executor.api().calls().iter().filter(|c| **c == "execute").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_calls_are_normalized_before_quote() {
        let api = FakeApi {
            billing: true,
            ..FakeApi::default()
        };
        let (result, executor) = run(api, FakeSigner::default(), ExecuteCallsOptions::new()).await;
        assert!(result.is_ok());
        let built = executor.api().built();
        assert_eq!(built.calls[0].calldata, vec!["0x0abc", "0x03e8", "0x00"]);
        assert_eq!(built.user_address, Felt::from(ACCOUNT));
    }

    #[test]
    fn test_fee_bound_display() {
        let bound = FeeBound::GasToken {
            address: Felt::from(0x1u64),
            max_amount: U256::from(0x100u64),
        };
        assert_eq!(bound.to_string(), "at most 0x0100 of 0x01");
        assert_eq!(
            FeeBound::Sponsored { rewards: 2 }.to_string(),
            "sponsored (2 rewards)"
        );
    }

    #[test]
    fn test_default_options_enable_rewards_lookup() {
        let options = ExecuteCallsOptions::default();
        assert_eq!(options.rewards_filter, Some(RewardsFilter::default()));
        assert!(options.fee_derivation.is_none());
    }
}
