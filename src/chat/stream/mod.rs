//! Streaming response reconciliation.

pub mod accumulator;
pub mod fragment;

pub use accumulator::{ERROR_NOTICE, apply_completion, apply_failure, apply_fragment};
pub use fragment::{ExchangePhase, Fragment};
