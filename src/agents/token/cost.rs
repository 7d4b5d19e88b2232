//! Cost estimation for conversation transcripts

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::TokenCounter;
use crate::agents::error::AgentResult;

/// Default price in dollars per 1000 tokens
pub const DEFAULT_PRICE_PER_1K_TOKENS: f64 = 0.06;

/// Estimated spend of a conversation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostReport {
    pub cost: f64,
    pub tokens: usize,
}

/// Converts transcript text into an approximate token count and price
#[derive(Clone)]
pub struct CostEstimator {
    counter: Arc<TokenCounter>,
    price_per_1k_tokens: f64,
}

impl CostEstimator {
    pub fn new(counter: Arc<TokenCounter>, price_per_1k_tokens: f64) -> Self {
        Self {
            counter,
            price_per_1k_tokens,
        }
    }

    /// Estimator over the shared counter at the given price
    pub fn with_price(price_per_1k_tokens: f64) -> AgentResult<Self> {
        Ok(Self::new(TokenCounter::shared()?, price_per_1k_tokens))
    }

    pub fn price_per_1k_tokens(&self) -> f64 {
        self.price_per_1k_tokens
    }

    /// Estimate a single block of text; cost is rounded to cents
    pub fn estimate(&self, text: &str) -> CostReport {
        let tokens = self.counter.count(text);
        let cost = (tokens as f64 / 1000.0) * self.price_per_1k_tokens;
        CostReport {
            cost: (cost * 100.0).round() / 100.0,
            tokens,
        }
    }

    /// Estimate a sequence of messages joined by single spaces
    pub fn estimate_messages<S: AsRef<str>>(&self, messages: &[S]) -> CostReport {
        let joined = messages
            .iter()
            .map(|m| m.as_ref())
            .collect::<Vec<_>>()
            .join(" ");
        self.estimate(&joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> CostEstimator {
        CostEstimator::with_price(DEFAULT_PRICE_PER_1K_TOKENS).unwrap()
    }

    #[test]
    fn test_empty_text_is_free() {
        let report = estimator().estimate("");
        assert_eq!(report, CostReport { cost: 0.0, tokens: 0 });
        let empty: [&str; 0] = [];
        assert_eq!(estimator().estimate_messages(&empty).tokens, 0);
    }

    #[test]
    fn test_cost_is_non_decreasing_in_tokens() {
        let estimator = estimator();
        let mut previous = CostReport::default();
        let mut text = String::new();
        for _ in 0..50 {
            text.push_str("select name, email from users where created_at is recent ");
            let report = estimator.estimate(&text);
            assert!(report.tokens >= previous.tokens);
            assert!(report.cost >= previous.cost);
            previous = report;
        }
        assert!(previous.cost > 0.0);
    }

    #[test]
    fn test_cost_rounds_to_cents() {
        let estimator = estimator();
        let text = "word ".repeat(1000);
        let report = estimator.estimate(&text);
        assert_eq!(report.cost, ((report.tokens as f64 / 1000.0) * 0.06 * 100.0).round() / 100.0);
        assert_eq!((report.cost * 100.0).fract(), 0.0);
    }
}
