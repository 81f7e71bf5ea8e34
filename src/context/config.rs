//! Configuration for context compaction.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Total-token threshold used when `trigger_tokens` is zero.
pub const DEFAULT_TRIGGER_TOKENS: usize = 128 * 1024;

/// Recent-message budget used when `recent_tokens` is zero.
pub const DEFAULT_RECENT_TOKENS: usize = 25 * 1024;

/// Configuration for context compaction.
///
/// Controls when compaction occurs and how much recent history survives it.
///
/// # Example
///
/// ```
/// use history_compaction::context::CompactionConfig;
///
/// let config = CompactionConfig::default()
///     .with_trigger_tokens(100_000)
///     .with_recent_tokens(20_000);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    /// Token threshold to trigger compaction.
    /// Compaction runs only when the counted total exceeds this.
    /// Zero selects [`DEFAULT_TRIGGER_TOKENS`].
    pub trigger_tokens: usize,

    /// Token budget for recent turns kept verbatim after compaction.
    /// Zero selects [`DEFAULT_RECENT_TOKENS`].
    pub recent_tokens: usize,

    /// Upper bound on a single summarization call, in seconds.
    /// `None` waits for the summarizer indefinitely.
    pub summary_timeout_secs: Option<u64>,

    /// Whether the middleware compacts automatically before model calls.
    /// Default: true
    pub auto_compact: bool,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            trigger_tokens: DEFAULT_TRIGGER_TOKENS,
            recent_tokens: DEFAULT_RECENT_TOKENS,
            summary_timeout_secs: None,
            auto_compact: true,
        }
    }
}

impl CompactionConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the token threshold for compaction.
    #[must_use]
    pub const fn with_trigger_tokens(mut self, tokens: usize) -> Self {
        self.trigger_tokens = tokens;
        self
    }

    /// Set the token budget for verbatim recent turns.
    #[must_use]
    pub const fn with_recent_tokens(mut self, tokens: usize) -> Self {
        self.recent_tokens = tokens;
        self
    }

    /// Bound the summarization call.
    #[must_use]
    pub const fn with_summary_timeout_secs(mut self, secs: u64) -> Self {
        self.summary_timeout_secs = Some(secs);
        self
    }

    /// Set whether to auto-compact.
    #[must_use]
    pub const fn with_auto_compact(mut self, auto: bool) -> Self {
        self.auto_compact = auto;
        self
    }

    #[must_use]
    pub const fn effective_trigger_tokens(&self) -> usize {
        if self.trigger_tokens == 0 {
            DEFAULT_TRIGGER_TOKENS
        } else {
            self.trigger_tokens
        }
    }

    #[must_use]
    pub const fn effective_recent_tokens(&self) -> usize {
        if self.recent_tokens == 0 {
            DEFAULT_RECENT_TOKENS
        } else {
            self.recent_tokens
        }
    }

    #[must_use]
    pub fn summary_timeout(&self) -> Option<Duration> {
        self.summary_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_default_config() {
        let config = CompactionConfig::default();
        assert_eq!(config.trigger_tokens, 128 * 1024);
        assert_eq!(config.recent_tokens, 25 * 1024);
        assert_eq!(config.summary_timeout(), None);
        assert!(config.auto_compact);
    }

    #[test]
    fn test_builder_pattern() {
        let config = CompactionConfig::new()
            .with_trigger_tokens(50_000)
            .with_recent_tokens(5_000)
            .with_summary_timeout_secs(30)
            .with_auto_compact(false);

        assert_eq!(config.trigger_tokens, 50_000);
        assert_eq!(config.recent_tokens, 5_000);
        assert_eq!(config.summary_timeout(), Some(Duration::from_secs(30)));
        assert!(!config.auto_compact);
    }

    #[test]
    fn test_zero_budgets_fall_back_to_defaults() {
        let config = CompactionConfig::new()
            .with_trigger_tokens(0)
            .with_recent_tokens(0);

        assert_eq!(config.effective_trigger_tokens(), DEFAULT_TRIGGER_TOKENS);
        assert_eq!(config.effective_recent_tokens(), DEFAULT_RECENT_TOKENS);
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() -> Result<()> {
        let config: CompactionConfig = serde_json::from_str(r#"{"trigger_tokens": 60}"#)?;
        assert_eq!(config.trigger_tokens, 60);
        assert_eq!(config.recent_tokens, DEFAULT_RECENT_TOKENS);
        assert!(config.auto_compact);
        Ok(())
    }
}
