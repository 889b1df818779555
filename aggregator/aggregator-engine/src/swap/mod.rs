//! The swap engine: routes, validates, executes and settles swaps
//!
//! A swap runs under the ledger's write lock, so swaps are serialized with
//! one another and with platform config updates. The ledger is snapshotted
//! before a swap begins and restored if any step fails, so a failed swap
//! leaves no trace.

pub mod settlement;
pub mod types;
pub mod validation;

use std::sync::Arc;

use aggregator_api::{
    execution::ExecutionRequest,
    metadata::SwapMetadata,
    quote::{QuoteRequest, QuoteResponse},
    route::SwapRoute,
};
use alloy_primitives::{Address, U256};
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use self::{
    settlement::{collect_input, pay_out, SettlementAccounts},
    types::{StateTrace, SwapCache, SwapReceipt, SwapRequest, SwapState},
    validation::{validate_request, ValidatedSwap},
};
use crate::{
    config::{EngineConfig, PlatformConfig},
    error::SwapError,
    fees::{
        compute_fees,
        conversion::{convert_fees_to_native, FeeSettlement, NativeFeeSplit},
    },
    ledger::SettlementLedger,
    quotes::{freshness::QuoteFreshnessValidator, QuoteAggregator, SelectionPolicy},
    telemetry::{record_swap_reverted, record_swap_settled},
    venues::{AdapterRegistry, RouteQuote},
};

/// The swap engine
pub struct SwapEngine {
    /// The account the engine trades from
    engine_account: Address,
    /// The only account permitted to update the platform config
    admin: Address,
    /// The spender used for delegated allowances
    delegated_allowance_account: Option<Address>,
    /// The quote aggregator
    aggregator: QuoteAggregator,
    /// The platform config, snapshotted at the start of each swap
    platform: RwLock<PlatformConfig>,
    /// The settlement ledger
    ledger: Arc<RwLock<SettlementLedger>>,
}

impl SwapEngine {
    /// Build an engine with the adapters described by the config
    pub fn new(config: &EngineConfig, ledger: SettlementLedger) -> Result<Self, SwapError> {
        let registry = AdapterRegistry::from_config(&config.adapters);
        Self::with_registry(config, registry, ledger)
    }

    /// Build an engine over an explicit adapter registry
    pub fn with_registry(
        config: &EngineConfig,
        registry: AdapterRegistry,
        ledger: SettlementLedger,
    ) -> Result<Self, SwapError> {
        config.validate()?;
        Ok(Self {
            engine_account: config.engine_account,
            admin: config.admin,
            delegated_allowance_account: config.delegated_allowance_account,
            aggregator: QuoteAggregator::new(registry),
            platform: RwLock::new(config.platform.clone()),
            ledger: Arc::new(RwLock::new(ledger)),
        })
    }

    /// A handle to the settlement ledger
    pub fn ledger(&self) -> Arc<RwLock<SettlementLedger>> {
        self.ledger.clone()
    }

    /// The engine's trading account
    pub fn engine_account(&self) -> Address {
        self.engine_account
    }

    /// The current platform config
    pub async fn platform_config(&self) -> PlatformConfig {
        self.platform.read().await.clone()
    }

    /// Replace the platform config; admin only
    ///
    /// Waits for any in-flight swap, so a swap never observes a config change
    /// part way through
    #[instrument(skip_all, fields(caller = %caller))]
    pub async fn update_platform_config(
        &self,
        caller: Address,
        config: PlatformConfig,
    ) -> Result<(), SwapError> {
        if caller != self.admin {
            warn!("Rejected platform config update from non-admin");
            return Err(SwapError::Unauthorized);
        }
        config.validate()?;

        let _ledger = self.ledger.write().await;
        *self.platform.write().await = config;
        info!("Updated platform config");
        Ok(())
    }

    // ----------
    // | Quotes |
    // ----------

    /// Quote the best route for a request under the current policy
    pub async fn quote_route(&self, request: &QuoteRequest) -> Option<RouteQuote> {
        let policy = SelectionPolicy::from(&*self.platform.read().await);
        let ledger = self.ledger.read().await;
        self.aggregator.quote(&ledger, request, policy).await
    }

    /// Quote a request, answering with the no-route sentinel when no
    /// adapter can route it
    pub async fn quote(&self, request: &QuoteRequest) -> QuoteResponse {
        match self.quote_route(request).await {
            Some(quote) => quote.to_response(),
            None => QuoteResponse::no_route(),
        }
    }

    // -------------
    // | Execution |
    // -------------

    /// Execute a wire execution request on behalf of `payer`
    pub async fn execute_request(
        &self,
        payer: Address,
        request: &ExecutionRequest,
        msg_value: U256,
        expected_output: U256,
        deadline: Option<u64>,
        metadata: Option<SwapMetadata>,
    ) -> Result<SwapReceipt, SwapError> {
        let request = SwapRequest::from_execution_request(
            payer,
            request,
            msg_value,
            expected_output,
            deadline,
            metadata,
        )
        .inspect_err(record_swap_reverted)?;

        self.execute_swap(&request).await
    }

    /// Execute a swap, all or nothing
    #[instrument(
        skip_all,
        fields(
            payer = %request.payer,
            token_in = %request.token_in,
            token_out = %request.token_out,
            amount_in = %request.execution.amount_in
        )
    )]
    pub async fn execute_swap(&self, request: &SwapRequest) -> Result<SwapReceipt, SwapError> {
        let mut ledger = self.ledger.write().await;
        let platform = self.platform.read().await.clone();
        let checkpoint = ledger.clone();

        let mut trace = StateTrace::default();
        match self.run_swap(&mut ledger, &platform, request, &mut trace).await {
            Ok(receipt) => {
                record_swap_settled(
                    receipt.route.generation,
                    request.integrator(),
                    receipt.native_fees.platform,
                    receipt.native_fees.referral,
                    receipt.gas_used,
                );
                info!(swap_id = %receipt.swap_id, net_output = %receipt.net_output, "Swap settled");
                Ok(receipt)
            },
            Err(e) => {
                *ledger = checkpoint;
                let failed_in = trace.current();
                // Every non-final state may revert
                let _ = trace.advance(SwapState::Reverted);

                record_swap_reverted(&e);
                warn!(state = %failed_in, trace = ?trace.states(), "Swap reverted: {e}");
                Err(e)
            },
        }
    }

    /// Drive a swap through each state, mutating the ledger as it goes
    async fn run_swap(
        &self,
        ledger: &mut SettlementLedger,
        platform: &PlatformConfig,
        request: &SwapRequest,
        trace: &mut StateTrace,
    ) -> Result<SwapReceipt, SwapError> {
        let policy = SelectionPolicy::from(platform);
        let trusted = request.execution.trust_provided_quote && !platform.mev_protection;

        trace.advance(SwapState::Validating)?;
        let ValidatedSwap { swap_id, ref_config, min_output } =
            validate_request(request, ledger, trusted)?;

        trace.advance(SwapState::Routed)?;
        let route = self.route_swap(ledger, platform, request, trusted).await?;
        let adapter = self
            .aggregator
            .registry()
            .get_adapter(route.generation)
            .ok_or_else(|| SwapError::invalid_route_data("no adapter serves the route"))?;

        trace.advance(SwapState::FeeComputed)?;
        // Rates are checked now; amounts follow the realized output
        compute_fees(U256::ZERO, &ref_config, platform.platform_fee_bps)?;

        trace.advance(SwapState::Executing)?;
        let accounts = SettlementAccounts {
            engine: self.engine_account,
            delegated_spender: self.delegated_allowance_account,
            fee_recipient: platform.fee_recipient,
        };
        collect_input(ledger, request, &accounts)?;

        let mut cache = SwapCache {
            swap_id,
            gas_start: ledger.gas_used(),
            pre_balance: ledger.balance_of(request.token_out, self.engine_account),
            post_balance: U256::ZERO,
            timestamp: ledger.block().timestamp,
        };
        adapter.execute(ledger, &route, request.execution.amount_in, self.engine_account).await?;
        cache.post_balance = ledger.balance_of(request.token_out, self.engine_account);

        let realized_output = cache.realized_output()?;
        let fees = compute_fees(realized_output, &ref_config, platform.platform_fee_bps)?;
        let net_output = fees.net_output(realized_output)?;
        if net_output < min_output {
            return Err(SwapError::ReturnAmountIsNotEnough(net_output, min_output));
        }

        let settlement = convert_fees_to_native(
            &self.aggregator,
            ledger,
            &fees,
            request.token_out,
            self.engine_account,
            policy,
            platform.max_fee_conversion_depth,
        )
        .await?;
        let (fees, native_fees, net_output) = match settlement {
            FeeSettlement::Native(split) => (fees, split, net_output),
            FeeSettlement::Waived => (fees.waived(), NativeFeeSplit::default(), realized_output),
        };
        pay_out(ledger, request, &accounts, &ref_config, &native_fees, net_output)?;

        ledger.record_swap(swap_id);
        if let Some(nonce) = request.metadata.as_ref().and_then(|m| m.nonce) {
            ledger.consume_nonce(request.integrator(), request.payer, nonce);
        }

        trace.advance(SwapState::Settled)?;
        Ok(SwapReceipt {
            swap_id,
            route,
            amount_in: request.execution.amount_in,
            realized_output,
            fees,
            native_fees,
            net_output,
            min_output,
            recipient: request.execution.recipient,
            trace: trace.clone(),
            gas_used: ledger.gas_used().saturating_sub(cache.gas_start),
            timestamp: cache.timestamp,
            user_data: request.metadata.as_ref().map(|m| m.user_data.clone()).unwrap_or_default(),
        })
    }

    /// Choose the route a swap executes
    ///
    /// In trust mode without MEV protection the caller's route executes as
    /// given. Otherwise the aggregator re-quotes the swap, the caller's
    /// expected output is checked against the fresh quote, and the fresh
    /// route executes.
    async fn route_swap(
        &self,
        ledger: &SettlementLedger,
        platform: &PlatformConfig,
        request: &SwapRequest,
        trusted: bool,
    ) -> Result<SwapRoute, SwapError> {
        if trusted {
            if let Some(route) = &request.route {
                return Ok(route.clone());
            }
        }

        let quote_request =
            QuoteRequest::new(request.token_in, request.token_out, request.execution.amount_in);
        let fresh = self.aggregator.quote(ledger, &quote_request, platform.into()).await;
        let Some(fresh) = fresh else {
            return Err(SwapError::NoRouteFound);
        };

        if !trusted {
            let validator = QuoteFreshnessValidator::new(platform.max_quote_deviation_bps);
            validator
                .validate(request.execution.expected_output, Some(fresh.amount_out))
                .into_result()?;
        }

        Ok(fresh.route)
    }
}
