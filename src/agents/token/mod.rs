//! Token counting and cost estimation

mod cost;
mod counter;

pub use cost::{CostEstimator, CostReport, DEFAULT_PRICE_PER_1K_TOKENS};
pub use counter::TokenCounter;
