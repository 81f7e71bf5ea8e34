//! Per-message token counting.

use crate::llm::Message;
use anyhow::{Context, Result};
use std::sync::Arc;
use tiktoken_rs::CoreBPE;

use super::render::counting_text;

/// Produces one token count per message.
///
/// Implementations must return exactly `messages.len()` counts in message
/// order. The compactor rejects any other length.
pub trait TokenCounter: Send + Sync {
    fn count(&self, messages: &[Message]) -> Vec<usize>;
}

impl<F> TokenCounter for F
where
    F: Fn(&[Message]) -> Vec<usize> + Send + Sync,
{
    fn count(&self, messages: &[Message]) -> Vec<usize> {
        self(messages)
    }
}

/// BPE counter using the `cl100k_base` encoding.
///
/// Each message is flattened with [`counting_text`] and encoded without
/// special tokens.
#[derive(Clone)]
pub struct TiktokenCounter {
    bpe: Arc<CoreBPE>,
}

impl TiktokenCounter {
    /// Load the `cl100k_base` encoding.
    ///
    /// # Errors
    /// Returns an error if the encoding tables cannot be built.
    pub fn new() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base().context("Failed to load cl100k_base encoding")?;
        Ok(Self { bpe: Arc::new(bpe) })
    }

    #[must_use]
    pub fn count_text(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_ordinary(text).len()
    }
}

impl std::fmt::Debug for TiktokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiktokenCounter")
            .field("encoding", &"cl100k_base")
            .finish()
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, messages: &[Message]) -> Vec<usize> {
        messages
            .iter()
            .map(|m| self.count_text(&counting_text(m)))
            .collect()
    }
}

/// Estimates token count for messages without a tokenizer.
///
/// Uses a simple heuristic of ~4 characters per token, which provides
/// a reasonable approximation for most English text and code.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCounter;

impl HeuristicCounter {
    /// Characters per token estimate.
    const CHARS_PER_TOKEN: usize = 4;

    /// Overhead tokens per message (role, formatting).
    const MESSAGE_OVERHEAD: usize = 4;

    /// Overhead for each tool call (id, formatting).
    const TOOL_CALL_OVERHEAD: usize = 20;

    /// Estimate tokens for a text string.
    #[must_use]
    pub const fn estimate_text(text: &str) -> usize {
        text.len().div_ceil(Self::CHARS_PER_TOKEN)
    }

    /// Estimate tokens for a single message.
    #[must_use]
    pub fn estimate_message(message: &Message) -> usize {
        let content = Self::estimate_text(message.text());
        let parts: usize = message.text_parts().map(Self::estimate_text).sum();
        let calls: usize = message
            .tool_calls
            .iter()
            .map(|call| {
                Self::estimate_text(&call.function.name)
                    + Self::estimate_text(&call.function.arguments)
                    + Self::TOOL_CALL_OVERHEAD
            })
            .sum();

        content + parts + calls + Self::MESSAGE_OVERHEAD
    }

    /// Estimate total tokens for a message history.
    #[must_use]
    pub fn estimate_history(messages: &[Message]) -> usize {
        messages.iter().map(Self::estimate_message).sum()
    }
}

impl TokenCounter for HeuristicCounter {
    fn count(&self, messages: &[Message]) -> Vec<usize> {
        messages.iter().map(Self::estimate_message).collect()
    }
}
