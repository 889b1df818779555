//! API types for the aggregator

pub mod execution;
pub mod generation;
pub mod metadata;
pub mod payload;
pub mod quote;
pub mod route;
