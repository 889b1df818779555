//! Errors emitted while decoding wire types

/// An error decoding or interpreting an API payload
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The payload is not valid ABI for the expected type
    #[error("abi decoding error: {0}")]
    AbiDecode(String),
    /// The protocol generation tag is outside the supported set
    #[error("unknown protocol generation tag: {0}")]
    UnknownGeneration(u8),
    /// The referral data has an unexpected shape
    #[error("malformed referral data: {0}")]
    MalformedRefData(String),
    /// A numeric field does not fit its expected width
    #[error("value out of range: {0}")]
    OutOfRange(String),
}

impl ApiError {
    /// Create a new abi decoding error
    #[allow(clippy::needless_pass_by_value)]
    pub fn abi_decode<T: ToString>(e: T) -> Self {
        ApiError::AbiDecode(e.to_string())
    }

    /// Create a new malformed referral data error
    #[allow(clippy::needless_pass_by_value)]
    pub fn malformed_ref_data<T: ToString>(e: T) -> Self {
        ApiError::MalformedRefData(e.to_string())
    }

    /// Create a new out of range error
    #[allow(clippy::needless_pass_by_value)]
    pub fn out_of_range<T: ToString>(e: T) -> Self {
        ApiError::OutOfRange(e.to_string())
    }
}

impl From<alloy_sol_types::Error> for ApiError {
    fn from(e: alloy_sol_types::Error) -> Self {
        ApiError::abi_decode(e)
    }
}
