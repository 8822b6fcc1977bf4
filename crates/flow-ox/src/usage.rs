use serde::{Deserialize, Serialize};

/// Token accounting for one decoded message.
///
/// `message_start` carries the initial counts; `message_delta` events report
/// increments that are folded in additively, so the totals only ever grow.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub cache_creation_input_tokens: Option<u64>,
    pub cache_read_input_tokens: Option<u64>,
}

impl Usage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.unwrap_or(0) + self.output_tokens.unwrap_or(0)
    }

    pub fn total_input_tokens(&self) -> u64 {
        self.input_tokens.unwrap_or(0)
            + self.cache_creation_input_tokens.unwrap_or(0)
            + self.cache_read_input_tokens.unwrap_or(0)
    }

    /// Fold a `message_delta` usage report into the running totals.
    ///
    /// Counts are added, never replaced, so totals are monotonic across the
    /// whole stream.
    pub fn merge_delta(&mut self, delta: &Usage) {
        if let Some(n) = delta.input_tokens {
            *self.input_tokens.get_or_insert(0) += n;
        }
        if let Some(n) = delta.output_tokens {
            *self.output_tokens.get_or_insert(0) += n;
        }
        if let Some(n) = delta.cache_creation_input_tokens {
            *self.cache_creation_input_tokens.get_or_insert(0) += n;
        }
        if let Some(n) = delta.cache_read_input_tokens {
            *self.cache_read_input_tokens.get_or_insert(0) += n;
        }
    }
}
