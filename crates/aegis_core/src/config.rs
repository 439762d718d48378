use crate::chunker::{Chunker, FingerprintAlgo};
use crate::consts::{
    DEFAULT_CHUNK_SIZE, DEFAULT_CONSECUTIVE_CHUNKS, DEFAULT_EXPECTED_ITEMS,
    DEFAULT_FALSE_POSITIVE_RATE, MIN_WINDOW,
};
use crate::errors::{AegisError, Result};
use serde::{Deserialize, Serialize};

/// Construction options for a corpus filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Sizing input, not a cap: more items only raise the false-positive rate.
    pub expected_items: u64,
    pub false_positive_rate: f64,
    /// Window length in chars.
    pub chunk_size: usize,
    /// Consecutive hits needed for `MAYBE_PRESENT`.
    pub consecutive_chunks: usize,
    #[serde(default)]
    pub digest: FingerprintAlgo,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            expected_items: DEFAULT_EXPECTED_ITEMS,
            false_positive_rate: DEFAULT_FALSE_POSITIVE_RATE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            consecutive_chunks: DEFAULT_CONSECUTIVE_CHUNKS,
            digest: FingerprintAlgo::default(),
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.expected_items == 0 {
            return Err(AegisError::invalid("expected_items must be positive"));
        }
        let p = self.false_positive_rate;
        if !(p > 0.0 && p < 1.0) {
            return Err(AegisError::invalid(format!("false_positive_rate must be in (0, 1), got {p}")));
        }
        if self.chunk_size < MIN_WINDOW {
            return Err(AegisError::invalid(format!(
                "chunk_size must be at least {MIN_WINDOW}, got {}",
                self.chunk_size
            )));
        }
        if self.consecutive_chunks == 0 {
            return Err(AegisError::invalid("consecutive_chunks must be at least 1"));
        }
        Ok(())
    }

    pub fn chunker(&self) -> Result<Chunker> {
        Chunker::new(self.chunk_size, self.digest)
    }

    pub fn with_expected_items(mut self, expected_items: u64) -> Self {
        self.expected_items = expected_items;
        self
    }
}
