//! Token counting utilities

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use tiktoken_rs::CoreBPE;

use crate::agents::error::{AgentError, AgentResult};

static SHARED: OnceLock<Arc<TokenCounter>> = OnceLock::new();

/// cl100k_base token counter with caching
pub struct TokenCounter {
    bpe: CoreBPE,
    /// Cache of text hash -> token count
    cache: RwLock<HashMap<u64, usize>>,
}

impl TokenCounter {
    /// Create a new token counter
    pub fn new() -> AgentResult<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| AgentError::Internal(format!("Failed to load cl100k_base: {}", e)))?;
        Ok(Self {
            bpe,
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Process-wide counter; the encoding tables are loaded once
    pub fn shared() -> AgentResult<Arc<TokenCounter>> {
        if let Some(counter) = SHARED.get() {
            return Ok(counter.clone());
        }
        let counter = Arc::new(Self::new()?);
        Ok(SHARED.get_or_init(|| counter).clone())
    }

    /// Count tokens in text
    pub fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        let hash = Self::hash_text(text);

        if let Ok(cache) = self.cache.read() {
            if let Some(&count) = cache.get(&hash) {
                return count;
            }
        }

        let count = self.bpe.encode_with_special_tokens(text).len();

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(hash, count);
        }

        count
    }

    /// Hash text for caching
    fn hash_text(text: &str) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        hasher.finish()
    }

    /// Clear the cache
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_has_no_tokens() {
        let counter = TokenCounter::shared().unwrap();
        assert_eq!(counter.count(""), 0);
    }

    #[test]
    fn test_counts_are_cached_and_stable() {
        let counter = TokenCounter::new().unwrap();
        let first = counter.count("SELECT * FROM users WHERE created_at > now() - interval '7 days'");
        assert!(first > 5);
        let second = counter.count("SELECT * FROM users WHERE created_at > now() - interval '7 days'");
        assert_eq!(first, second);
        counter.clear_cache();
        assert_eq!(counter.count("hello world"), 2);
    }
}
