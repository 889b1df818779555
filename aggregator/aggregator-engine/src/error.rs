//! Error types for the swap engine

use aggregator_api::error::ApiError;
use alloy_primitives::U256;

use crate::{ledger::LedgerError, venues::AdapterError};

/// An error returned by the swap engine
///
/// Every variant aborts the swap as a whole; no partial transfer or fee
/// capture survives an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SwapError {
    /// The input amount is zero or malformed
    #[error("invalid amount")]
    InvalidAmount,
    /// A token is neither the native asset nor a known token
    #[error("invalid token address")]
    InvalidTokenAddress,
    /// The input and output tokens are the same
    #[error("input and output tokens are identical")]
    SameTokenSwap,
    /// No adapter produced a usable route
    #[error("no route found")]
    NoRouteFound,
    /// The caller-supplied quote deviates too far from a fresh quote
    #[error("stale quote: {0}")]
    StaleQuote(String),
    /// The realized output, net of fees, is below the caller's minimum
    #[error("return amount is not enough: got {0}, expected at least {1}")]
    ReturnAmountIsNotEnough(U256, U256),
    /// A native asset transfer could not be delivered
    #[error("native asset transfer failed")]
    NativeAssetTransferFailed,
    /// The call value does not match the native input amount
    #[error("invalid call value: expected {expected}, got {actual}")]
    InvalidMsgValue {
        /// The value the request requires
        expected: U256,
        /// The value that accompanied the call
        actual: U256,
    },
    /// The referral data cannot be interpreted
    #[error("invalid referral: {0}")]
    InvalidReferral(String),
    /// A fee rate exceeds its ceiling
    #[error("fee rate exceeded: {0}")]
    FeeRateExceeded(String),
    /// The swap deadline has passed
    #[error("deadline elapsed")]
    DeadlineElapsed,
    /// The slippage tolerance is above the hard ceiling
    #[error("slippage tolerance {0} bps exceeds the maximum")]
    SlippageToleranceTooHigh(u64),
    /// Only exact-input swaps are supported
    #[error("unsupported swap kind: {0}")]
    UnsupportedSwapKind(String),
    /// An identical swap already executed in this block
    #[error("duplicate swap in the same block")]
    DuplicateSwap,
    /// The metadata nonce was already consumed
    #[error("nonce already used")]
    NonceAlreadyUsed,
    /// Fees could not be converted to the native asset
    #[error("fee conversion failed: {0}")]
    FeeConversionFailed(String),
    /// The caller may not perform a privileged operation
    #[error("unauthorized")]
    Unauthorized,
    /// The route data does not describe an executable route
    #[error("invalid route data: {0}")]
    InvalidRouteData(String),
    /// An error in the settlement ledger
    #[error("ledger error: {0}")]
    Ledger(LedgerError),
    /// An error raised by a venue adapter during execution
    #[error("adapter error: {0}")]
    Adapter(AdapterError),
    /// An error in the engine configuration
    #[error("config error: {0}")]
    Config(String),
}

impl SwapError {
    /// Create a new stale quote error
    #[allow(clippy::needless_pass_by_value)]
    pub fn stale_quote<T: ToString>(e: T) -> Self {
        SwapError::StaleQuote(e.to_string())
    }

    /// Create a new fee rate exceeded error
    #[allow(clippy::needless_pass_by_value)]
    pub fn fee_rate_exceeded<T: ToString>(e: T) -> Self {
        SwapError::FeeRateExceeded(e.to_string())
    }

    /// Create a new fee conversion error
    #[allow(clippy::needless_pass_by_value)]
    pub fn fee_conversion<T: ToString>(e: T) -> Self {
        SwapError::FeeConversionFailed(e.to_string())
    }

    /// Create a new invalid route data error
    #[allow(clippy::needless_pass_by_value)]
    pub fn invalid_route_data<T: ToString>(e: T) -> Self {
        SwapError::InvalidRouteData(e.to_string())
    }

    /// Create a new config error
    #[allow(clippy::needless_pass_by_value)]
    pub fn config<T: ToString>(e: T) -> Self {
        SwapError::Config(e.to_string())
    }

    /// A short, stable label for the error, used as a metric tag
    pub fn label(&self) -> &'static str {
        match self {
            SwapError::InvalidAmount => "invalid_amount",
            SwapError::InvalidTokenAddress => "invalid_token_address",
            SwapError::SameTokenSwap => "same_token_swap",
            SwapError::NoRouteFound => "no_route_found",
            SwapError::StaleQuote(_) => "stale_quote",
            SwapError::ReturnAmountIsNotEnough(..) => "return_amount_is_not_enough",
            SwapError::NativeAssetTransferFailed => "native_asset_transfer_failed",
            SwapError::InvalidMsgValue { .. } => "invalid_msg_value",
            SwapError::InvalidReferral(_) => "invalid_referral",
            SwapError::FeeRateExceeded(_) => "fee_rate_exceeded",
            SwapError::DeadlineElapsed => "deadline_elapsed",
            SwapError::SlippageToleranceTooHigh(_) => "slippage_tolerance_too_high",
            SwapError::UnsupportedSwapKind(_) => "unsupported_swap_kind",
            SwapError::DuplicateSwap => "duplicate_swap",
            SwapError::NonceAlreadyUsed => "nonce_already_used",
            SwapError::FeeConversionFailed(_) => "fee_conversion_failed",
            SwapError::Unauthorized => "unauthorized",
            SwapError::InvalidRouteData(_) => "invalid_route_data",
            SwapError::Ledger(_) => "ledger",
            SwapError::Adapter(_) => "adapter",
            SwapError::Config(_) => "config",
        }
    }
}

impl From<LedgerError> for SwapError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NativeTransferRejected(_) => SwapError::NativeAssetTransferFailed,
            other => SwapError::Ledger(other),
        }
    }
}

impl From<AdapterError> for SwapError {
    fn from(e: AdapterError) -> Self {
        match e {
            AdapterError::Ledger(ledger_err) => ledger_err.into(),
            AdapterError::RouteData(msg) => SwapError::InvalidRouteData(msg),
            other => SwapError::Adapter(other),
        }
    }
}

impl From<ApiError> for SwapError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::MalformedRefData(msg) => SwapError::InvalidReferral(msg),
            other => SwapError::invalid_route_data(other),
        }
    }
}
