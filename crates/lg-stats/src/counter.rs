//! The token counter collaborator and its cached wrapper.

use std::rc::Rc;

use lg_cache::Cache;

/// Model metadata the report carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    /// Model label (`"o3"`, `"claude"`, …).
    pub name: String,
    /// Encoder identifier.
    pub encoder: String,
    /// Context window in tokens.
    pub ctx_limit: u32,
}

impl Default for ModelInfo {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            encoder: "heuristic".to_string(),
            ctx_limit: 128_000,
        }
    }
}

/// External tokenizer contract.
pub trait TokenCounter {
    /// Counts the tokens of a text for the current model.
    fn count(&self, text: &str) -> u32;
}

/// Deterministic fallback counter: one token per four characters, rounded
/// up. Close enough for accounting when no real tokenizer is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCounter;

impl TokenCounter for HeuristicCounter {
    fn count(&self, text: &str) -> u32 {
        (text.chars().count() as u32).div_ceil(4)
    }
}

/// A token counter wrapped with the two-tier cache.
pub struct TokenService {
    /// The underlying counter.
    counter: Box<dyn TokenCounter>,
    /// Model the counts belong to.
    model: ModelInfo,
    /// Cache for (text → count) lookups.
    cache: Rc<Cache>,
}

impl TokenService {
    /// Creates a service over a counter and a cache.
    pub fn new(counter: Box<dyn TokenCounter>, model: ModelInfo, cache: Rc<Cache>) -> Self {
        Self {
            counter,
            model,
            cache,
        }
    }

    /// The model metadata.
    pub fn model(&self) -> &ModelInfo {
        &self.model
    }

    /// Counts tokens, going through the cache.
    pub fn count_cached(&self, text: &str) -> u32 {
        if text.is_empty() {
            return 0;
        }
        if let Some(count) = self.cache.get_text_tokens(text, &self.model.name) {
            return count;
        }
        let count = self.counter.count(text);
        self.cache.put_text_tokens(text, &self.model.name, count);
        count
    }
}
