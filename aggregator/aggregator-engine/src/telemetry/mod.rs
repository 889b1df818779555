//! Logging setup and metric recording
//!
//! The engine records metrics through the `metrics` facade only; installing
//! an exporter is left to the embedding binary.

pub mod labels;

use aggregator_api::generation::AmmGeneration;
use alloy_primitives::U256;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use self::labels::{
    ADAPTER_FAILURE_METRIC_NAME, GENERATION_TAG, INTEGRATOR_TAG, NO_ROUTE_METRIC_NAME,
    OUTCOME_TAG, PLATFORM_FEE_METRIC_NAME, QUOTES_REQUESTED_METRIC_NAME,
    QUOTE_DEVIATION_BPS_METRIC_NAME, REASON_TAG, REFERRAL_FEE_METRIC_NAME,
    SWAPS_REVERTED_METRIC_NAME, SWAPS_SETTLED_METRIC_NAME, SWAP_GAS_METRIC_NAME,
};
use crate::error::SwapError;

// -----------
// | Logging |
// -----------

/// Configure the logging subscriber
///
/// Filtering follows `RUST_LOG`, defaulting to `info`
pub fn setup_logging(json_logs: bool) {
    let filter =
        EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy();
    let registry = tracing_subscriber::registry().with(filter);

    if json_logs {
        registry
            .with(fmt::layer().with_file(true).with_line_number(true).json().flatten_event(true))
            .init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }
}

// -----------
// | Metrics |
// -----------

/// Record a quote request
pub fn record_quote_requested() {
    metrics::counter!(QUOTES_REQUESTED_METRIC_NAME).increment(1);
}

/// Record a quote request that produced no route
pub fn record_no_route() {
    metrics::counter!(NO_ROUTE_METRIC_NAME).increment(1);
}

/// Record an adapter failure absorbed during aggregation
pub fn record_adapter_failure(generation: AmmGeneration) {
    metrics::counter!(ADAPTER_FAILURE_METRIC_NAME, GENERATION_TAG => generation.to_string())
        .increment(1);
}

/// Record the deviation of a caller's quote from a fresh quote
pub fn record_quote_deviation(deviation_bps: u64, accepted: bool) {
    metrics::gauge!(
        QUOTE_DEVIATION_BPS_METRIC_NAME,
        OUTCOME_TAG => if accepted { "accept" } else { "reject" },
    )
    .set(deviation_bps as f64);
}

/// Record a settled swap and the native fees it captured
pub fn record_swap_settled(
    generation: AmmGeneration,
    integrator: &str,
    platform_fee: U256,
    referral_fee: U256,
    gas_used: u64,
) {
    let labels = vec![
        (GENERATION_TAG.to_string(), generation.to_string()),
        (INTEGRATOR_TAG.to_string(), integrator.to_string()),
    ];

    metrics::counter!(SWAPS_SETTLED_METRIC_NAME, &labels).increment(1);
    metrics::histogram!(PLATFORM_FEE_METRIC_NAME, &labels).record(u256_to_f64(platform_fee));
    metrics::histogram!(REFERRAL_FEE_METRIC_NAME, &labels).record(u256_to_f64(referral_fee));
    metrics::histogram!(SWAP_GAS_METRIC_NAME, &labels).record(gas_used as f64);
}

/// Record a reverted swap
pub fn record_swap_reverted(error: &SwapError) {
    metrics::counter!(SWAPS_REVERTED_METRIC_NAME, REASON_TAG => error.label()).increment(1);
}

/// Lossily convert an amount for recording
fn u256_to_f64(amount: U256) -> f64 {
    f64::from(amount)
}
