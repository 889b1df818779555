//! Constants for metric labels and metric names

/// Metric counting quote requests served by the aggregator
pub const QUOTES_REQUESTED_METRIC_NAME: &str = "quotes_requested";

/// Metric counting quote requests for which no adapter produced a route
pub const NO_ROUTE_METRIC_NAME: &str = "quotes_no_route";

/// Metric counting adapter failures absorbed during aggregation
pub const ADAPTER_FAILURE_METRIC_NAME: &str = "adapter_quote_failures";

/// Metric describing the deviation of a caller's quote from a fresh quote, in
/// basis points
pub const QUOTE_DEVIATION_BPS_METRIC_NAME: &str = "quote_deviation_bps";

/// Metric counting swaps that settled
pub const SWAPS_SETTLED_METRIC_NAME: &str = "swaps_settled";

/// Metric counting swaps that reverted
pub const SWAPS_REVERTED_METRIC_NAME: &str = "swaps_reverted";

/// Metric for the platform fee captured by a swap, in native atoms
pub const PLATFORM_FEE_METRIC_NAME: &str = "swap_platform_fee";

/// Metric for the referral fee captured by a swap, in native atoms
pub const REFERRAL_FEE_METRIC_NAME: &str = "swap_referral_fee";

/// Metric for the gas estimate of a settled swap
pub const SWAP_GAS_METRIC_NAME: &str = "swap_gas_estimate";

/// Metric tag for the AMM generation of a route or adapter
pub const GENERATION_TAG: &str = "generation";

/// Metric tag for the reason a swap reverted
pub const REASON_TAG: &str = "reason";

/// Metric tag for the outcome of a freshness check, `"accept"` or `"reject"`
pub const OUTCOME_TAG: &str = "outcome";

/// Metric tag for the integrator named in a swap's metadata
pub const INTEGRATOR_TAG: &str = "integrator";
