//! A swap engine aggregating quotes across three AMM generations
//!
//! The engine fans each quote request out to one adapter per generation,
//! picks a route under the platform's route policy, and executes swaps as
//! all-or-nothing state machines against a settlement ledger. Fees are taken
//! from the swap output and delivered in the native asset.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::needless_pass_by_ref_mut)]
#![deny(unsafe_code)]
#![deny(clippy::uninlined_format_args)]

pub mod config;
pub mod error;
pub mod fees;
pub mod ledger;
pub mod quotes;
pub mod swap;
pub mod telemetry;
pub mod venues;

#[cfg(test)]
mod test_helpers;

pub use config::{EngineConfig, PlatformConfig, RoutePolicy};
pub use error::SwapError;
pub use swap::SwapEngine;
