//! Quote aggregation across the registered adapters

pub mod freshness;

use std::cmp::Ordering;

use aggregator_api::{generation::AmmGeneration, quote::QuoteRequest};
use alloy_primitives::B256;
use futures::future::join_all;
use tracing::{info, instrument, warn};

use crate::{
    config::{PlatformConfig, RoutePolicy},
    ledger::SettlementLedger,
    telemetry::{record_adapter_failure, record_no_route, record_quote_requested},
    venues::{AdapterError, AdapterRegistry, RouteQuote},
};

/// The settings that decide which of several quotes wins
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionPolicy {
    /// The route policy
    pub route_policy: RoutePolicy,
    /// Whether exact output ties are broken by gas under the best price policy
    pub gas_optimization: bool,
}

impl From<&PlatformConfig> for SelectionPolicy {
    fn from(config: &PlatformConfig) -> Self {
        Self { route_policy: config.route_policy, gas_optimization: config.gas_optimization }
    }
}

/// Fans quote requests out to every adapter and picks one route
#[derive(Clone)]
pub struct QuoteAggregator {
    /// The adapters consulted
    registry: AdapterRegistry,
}

impl QuoteAggregator {
    /// Constructor
    pub fn new(registry: AdapterRegistry) -> Self {
        Self { registry }
    }

    /// The adapter registry
    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Quote the best route for a request, `None` when no adapter produced a
    /// usable route
    ///
    /// A request carrying a pool hint consults only the adapter owning that
    /// pool, and only that pool.
    #[instrument(
        skip_all,
        fields(
            token_in = %request.token_in,
            token_out = %request.token_out,
            amount_in = %request.amount_in
        )
    )]
    pub async fn quote(
        &self,
        ledger: &SettlementLedger,
        request: &QuoteRequest,
        policy: SelectionPolicy,
    ) -> Option<RouteQuote> {
        record_quote_requested();
        if request.token_in == request.token_out || request.amount_in.is_zero() {
            record_no_route();
            return None;
        }

        let quotes = match request.pool_hint {
            Some(hint) => {
                self.fetch_hinted_quote(ledger, request, hint).await.into_iter().collect()
            },
            None => self.fetch_all_quotes(ledger, request).await,
        };

        let best = select_best_quote(quotes, policy);
        match &best {
            Some(quote) => info!(
                generation = %quote.generation(),
                amount_out = %quote.amount_out,
                gas_estimate = quote.gas_estimate,
                "Selected route"
            ),
            None => {
                record_no_route();
                info!("No route found");
            },
        }

        best
    }

    /// Whether a request no adapter can route fails only for its size, some
    /// adapter pricing the pair but yielding no output
    pub async fn is_dust(&self, ledger: &SettlementLedger, request: &QuoteRequest) -> bool {
        let adapters = self.registry.get_all_adapters();
        let quote_futures =
            adapters.iter().map(|adapter| async move { adapter.get_quote(ledger, request).await });

        join_all(quote_futures)
            .await
            .into_iter()
            .any(|res| matches!(res, Err(AdapterError::DustAmount)))
    }

    // -----------
    // | Helpers |
    // -----------

    /// Fetch quotes across all adapters
    async fn fetch_all_quotes(
        &self,
        ledger: &SettlementLedger,
        request: &QuoteRequest,
    ) -> Vec<RouteQuote> {
        let adapters = self.registry.get_all_adapters();

        // Fetch all quotes in parallel
        let quote_futures = adapters.into_iter().map(|adapter| async move {
            let quote_res = adapter.get_quote(ledger, request).await;
            (adapter.generation(), quote_res)
        });
        let quote_results = join_all(quote_futures).await;

        let mut all_quotes = Vec::new();
        for (generation, quote_res) in quote_results {
            match quote_res {
                Ok(quote) => all_quotes.push(quote),
                Err(e) => {
                    warn!("Error getting quote from {generation} adapter: {e}");
                    record_adapter_failure(generation);
                },
            }
        }

        all_quotes
    }

    /// Fetch a quote from the one pool named by a hint
    async fn fetch_hinted_quote(
        &self,
        ledger: &SettlementLedger,
        request: &QuoteRequest,
        hint: B256,
    ) -> Option<RouteQuote> {
        let Some(generation) = ledger.pools().generation_of(&hint) else {
            warn!(pool = %hint, "Pool hint names an unknown pool");
            return None;
        };
        let Some(adapter) = self.registry.get_adapter(generation) else {
            warn!(pool = %hint, "No {generation} adapter registered for the hinted pool");
            return None;
        };

        match adapter.get_quote(ledger, request).await {
            Ok(quote) => Some(quote),
            Err(e) => {
                warn!("Error getting hinted quote from {generation} adapter: {e}");
                record_adapter_failure(generation);
                None
            },
        }
    }
}

/// Select the best quote under the policy
///
/// Ties left after the policy's criteria go to the lowest generation ordinal
pub fn select_best_quote(quotes: Vec<RouteQuote>, policy: SelectionPolicy) -> Option<RouteQuote> {
    quotes.into_iter().min_by(|a, b| compare_quotes(a, b, policy))
}

/// Order two quotes so the preferred quote compares as lesser
fn compare_quotes(a: &RouteQuote, b: &RouteQuote, policy: SelectionPolicy) -> Ordering {
    let by_output = b.amount_out.cmp(&a.amount_out);
    let by_gas = a.gas_estimate.cmp(&b.gas_estimate);
    let by_liquidity = b.liquidity.cmp(&a.liquidity);
    let by_ordinal = ordinal(a.generation()).cmp(&ordinal(b.generation()));

    let ordering = match policy.route_policy {
        RoutePolicy::BestPrice if policy.gas_optimization => by_output.then(by_gas),
        RoutePolicy::BestPrice => by_output,
        RoutePolicy::Fastest => by_gas.then(by_output),
        RoutePolicy::Safest => by_liquidity.then(by_output),
    };

    ordering.then(by_ordinal)
}

/// The ordinal of a generation, used as the final tie-break
fn ordinal(generation: AmmGeneration) -> u8 {
    generation.tag()
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering as AtomicOrdering},
        Arc,
    };

    use aggregator_api::NATIVE_ASSET_ADDRESS;
    use alloy_primitives::U256;

    use super::*;
    use crate::{
        test_helpers::{
            dai, default_registry, mock_ledger, usdc, wad, CountingAdapter, FailingAdapter,
            FixedQuoteAdapter,
        },
        venues::{fee_tiered::FeeTieredAdapter, VersionAdapter},
    };

    /// A tenth of a unit of the native asset
    fn tenth() -> U256 {
        wad(1) / U256::from(10u64)
    }

    /// The deep fee-tiered pool wins the best price
    #[tokio::test]
    async fn test_best_price_selection() {
        let ledger = mock_ledger();
        let aggregator = QuoteAggregator::new(default_registry());

        let request = QuoteRequest::new(NATIVE_ASSET_ADDRESS, usdc(), tenth());
        let quote = aggregator.quote(&ledger, &request, SelectionPolicy::default()).await.unwrap();

        assert_eq!(quote.generation(), AmmGeneration::FeeTiered);
        assert_eq!(quote.route.fee_tier, 3000);
    }

    /// A failing adapter is dropped while the others still quote
    #[tokio::test]
    async fn test_failing_adapter_isolated() {
        let ledger = mock_ledger();
        let registry = AdapterRegistry::new(vec![
            Arc::new(FailingAdapter(AmmGeneration::DirectPair)),
            Arc::new(FeeTieredAdapter::default()),
            Arc::new(FailingAdapter(AmmGeneration::HookEnabled)),
        ]);
        let aggregator = QuoteAggregator::new(registry);

        let request = QuoteRequest::new(NATIVE_ASSET_ADDRESS, usdc(), tenth());
        let quote = aggregator.quote(&ledger, &request, SelectionPolicy::default()).await.unwrap();
        assert_eq!(quote.generation(), AmmGeneration::FeeTiered);
    }

    /// Every adapter failing is no route, not an error
    #[tokio::test]
    async fn test_all_adapters_failing() {
        let ledger = mock_ledger();
        let registry = AdapterRegistry::new(vec![
            Arc::new(FailingAdapter(AmmGeneration::DirectPair)),
            Arc::new(FailingAdapter(AmmGeneration::FeeTiered)),
        ]);
        let aggregator = QuoteAggregator::new(registry);

        let request = QuoteRequest::new(NATIVE_ASSET_ADDRESS, usdc(), tenth());
        assert!(aggregator.quote(&ledger, &request, SelectionPolicy::default()).await.is_none());
    }

    /// Equal outputs go to the lowest generation ordinal, whatever the
    /// registration order
    #[tokio::test]
    async fn test_tie_break_lowest_ordinal() {
        let ledger = mock_ledger();
        let amount_out = U256::from(1_000u64);
        let registry = AdapterRegistry::new(vec![
            Arc::new(FixedQuoteAdapter::new(AmmGeneration::HookEnabled, amount_out, 50_000)),
            Arc::new(FixedQuoteAdapter::new(AmmGeneration::FeeTiered, amount_out, 90_000)),
        ]);
        let aggregator = QuoteAggregator::new(registry);

        let request = QuoteRequest::new(NATIVE_ASSET_ADDRESS, usdc(), tenth());
        let quote = aggregator.quote(&ledger, &request, SelectionPolicy::default()).await.unwrap();
        assert_eq!(quote.generation(), AmmGeneration::FeeTiered);

        // With gas optimization on, the cheaper route wins the tie instead
        let policy = SelectionPolicy { gas_optimization: true, ..Default::default() };
        let quote = aggregator.quote(&ledger, &request, policy).await.unwrap();
        assert_eq!(quote.generation(), AmmGeneration::HookEnabled);
    }

    /// The fastest and safest policies select on gas and depth
    #[tokio::test]
    async fn test_route_policies() {
        let ledger = mock_ledger();
        let aggregator = QuoteAggregator::new(default_registry());
        let request = QuoteRequest::new(NATIVE_ASSET_ADDRESS, usdc(), tenth());

        let fastest = SelectionPolicy { route_policy: RoutePolicy::Fastest, ..Default::default() };
        let quote = aggregator.quote(&ledger, &request, fastest).await.unwrap();
        assert_eq!(quote.generation(), AmmGeneration::DirectPair);

        let safest = SelectionPolicy { route_policy: RoutePolicy::Safest, ..Default::default() };
        let quote = aggregator.quote(&ledger, &request, safest).await.unwrap();
        assert_eq!(quote.generation(), AmmGeneration::FeeTiered);
        assert_eq!(quote.route.fee_tier, 3000);
    }

    /// Quoting the same state twice gives the same answer
    #[tokio::test]
    async fn test_quoting_is_idempotent() {
        let ledger = mock_ledger();
        let aggregator = QuoteAggregator::new(default_registry());
        let request = QuoteRequest::new(NATIVE_ASSET_ADDRESS, usdc(), tenth());

        let first = aggregator.quote(&ledger, &request, SelectionPolicy::default()).await;
        let second = aggregator.quote(&ledger, &request, SelectionPolicy::default()).await;
        assert_eq!(first, second);
    }

    /// A pool hint consults only the owning adapter
    #[tokio::test]
    async fn test_pool_hint() {
        let ledger = mock_ledger();
        let counter = Arc::new(AtomicUsize::new(0));
        let counting: Arc<dyn VersionAdapter> =
            Arc::new(CountingAdapter::new(AmmGeneration::DirectPair, counter.clone()));
        let registry = AdapterRegistry::new(vec![counting, Arc::new(FeeTieredAdapter::default())]);
        let aggregator = QuoteAggregator::new(registry);

        // Hint at the shallow 0.05% pool, which loses an open search
        let shallow = ledger
            .pools()
            .find(AmmGeneration::FeeTiered, NATIVE_ASSET_ADDRESS, usdc())
            .find(|pool| pool.fee_pips == 500)
            .unwrap()
            .id;

        let request =
            QuoteRequest::new(NATIVE_ASSET_ADDRESS, usdc(), tenth()).with_pool_hint(shallow);
        let quote = aggregator.quote(&ledger, &request, SelectionPolicy::default()).await.unwrap();

        assert_eq!(quote.route.fee_tier, 500);
        assert_eq!(quote.pools, vec![shallow]);
        assert_eq!(counter.load(AtomicOrdering::SeqCst), 0);
    }

    /// Pairs no adapter can route are no route
    #[tokio::test]
    async fn test_unroutable_pair() {
        let ledger = mock_ledger();
        let aggregator = QuoteAggregator::new(default_registry());

        // The only path to DAI is through an intermediate the default
        // registry does not configure
        let request = QuoteRequest::new(NATIVE_ASSET_ADDRESS, dai(), tenth());
        assert!(aggregator.quote(&ledger, &request, SelectionPolicy::default()).await.is_none());
    }
}
