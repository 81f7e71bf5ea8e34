//! Context compaction implementation.

use crate::llm::{LlmProvider, Message};
use anyhow::anyhow;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::blocks::{Block, partition, split_recent};
use super::config::CompactionConfig;
use super::counter::{TiktokenCounter, TokenCounter};
use super::error::CompactionError;
use super::render::render_blocks;
use super::summarizer::{LlmSummarizer, Summarizer, SummaryContext};

/// Numbers describing one successful compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionStats {
    /// Number of messages before compaction.
    pub original_count: usize,
    /// Number of messages after compaction.
    pub new_count: usize,
    /// Counted tokens before compaction.
    pub original_tokens: usize,
    /// Tokens of the messages carried over verbatim (system, user, recent).
    pub retained_tokens: usize,
    /// Turn blocks folded into the summary.
    pub older_blocks: usize,
    /// Turn blocks kept verbatim.
    pub recent_blocks: usize,
}

/// Result of a compaction that replaced the history.
#[derive(Debug, Clone)]
pub struct CompactionResult {
    /// The new compacted message history.
    pub messages: Vec<Message>,
    pub stats: CompactionStats,
}

/// What a compaction attempt decided.
#[derive(Debug, Clone)]
pub enum CompactionOutcome {
    /// The history is within the trigger budget and stands as is.
    Unchanged { total_tokens: usize },
    /// The history was summarized into a new, shorter one.
    Compacted(CompactionResult),
}

impl CompactionOutcome {
    #[must_use]
    pub const fn is_compacted(&self) -> bool {
        matches!(self, Self::Compacted(_))
    }

    /// The history to continue with, given the history that was compacted.
    #[must_use]
    pub fn into_messages(self, original: Vec<Message>) -> Vec<Message> {
        match self {
            Self::Unchanged { .. } => original,
            Self::Compacted(result) => result.messages,
        }
    }
}

/// Token-budgeted history compactor.
///
/// When the counted history exceeds the trigger budget, everything except
/// the system prompt, the leading user messages and a budget-bounded suffix
/// of recent turns is condensed into a single summary message.
///
/// The compactor holds no mutable state. Each call partitions its own
/// snapshot, so one instance can serve any number of conversations.
pub struct HistoryCompactor<S, C = TiktokenCounter> {
    summarizer: S,
    counter: C,
    config: CompactionConfig,
}

impl<S: Summarizer, C: TokenCounter> HistoryCompactor<S, C> {
    #[must_use]
    pub const fn new(summarizer: S, counter: C, config: CompactionConfig) -> Self {
        Self {
            summarizer,
            counter,
            config,
        }
    }

    /// Replace the token counter.
    #[must_use]
    pub fn with_counter<C2: TokenCounter>(self, counter: C2) -> HistoryCompactor<S, C2> {
        HistoryCompactor {
            summarizer: self.summarizer,
            counter,
            config: self.config,
        }
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &CompactionConfig {
        &self.config
    }

    /// Count every message, verifying the counter kept its contract.
    ///
    /// # Errors
    /// Returns [`CompactionError::CountMismatch`] if the counter returned the
    /// wrong number of counts.
    pub fn count_tokens(&self, messages: &[Message]) -> Result<Vec<usize>, CompactionError> {
        let tokens = self.counter.count(messages);
        if tokens.len() != messages.len() {
            warn!(
                "Token counter returned {} counts for {} messages",
                tokens.len(),
                messages.len()
            );
            return Err(CompactionError::CountMismatch {
                messages: messages.len(),
                counts: tokens.len(),
            });
        }
        Ok(tokens)
    }

    /// Check whether `messages` exceed the trigger budget.
    ///
    /// # Errors
    /// Returns [`CompactionError::CountMismatch`] on a counter contract violation.
    pub fn needs_compaction(&self, messages: &[Message]) -> Result<bool, CompactionError> {
        if messages.is_empty() {
            return Ok(false);
        }
        let total: usize = self.count_tokens(messages)?.iter().sum();
        Ok(total > self.config.effective_trigger_tokens())
    }

    /// Compact `messages` if they exceed the trigger budget.
    ///
    /// The input is never modified. On error no new history exists, so the
    /// caller keeps using `messages`.
    ///
    /// # Errors
    /// Returns [`CompactionError::CountMismatch`] if the counter misbehaves and
    /// [`CompactionError::SummarizationFailed`] if the summarizer fails or
    /// exceeds the configured timeout.
    pub async fn compact(&self, messages: &[Message]) -> Result<CompactionOutcome, CompactionError> {
        self.run(messages, None).await
    }

    /// Like [`compact`](Self::compact), abandoning the summarization when
    /// `cancel` fires.
    ///
    /// # Errors
    /// Cancellation is reported as [`CompactionError::SummarizationFailed`].
    pub async fn compact_with_cancel(
        &self,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<CompactionOutcome, CompactionError> {
        self.run(messages, Some(cancel)).await
    }

    /// Compact `history` in place.
    ///
    /// `history` is replaced only after a successful summarization; on error
    /// it is left exactly as it was. Returns the stats when a compaction
    /// happened.
    ///
    /// # Errors
    /// See [`compact`](Self::compact).
    pub async fn compact_history(
        &self,
        history: &mut Vec<Message>,
    ) -> Result<Option<CompactionStats>, CompactionError> {
        match self.run(history, None).await? {
            CompactionOutcome::Unchanged { .. } => Ok(None),
            CompactionOutcome::Compacted(result) => {
                *history = result.messages;
                Ok(Some(result.stats))
            }
        }
    }

    async fn run(
        &self,
        messages: &[Message],
        cancel: Option<&CancellationToken>,
    ) -> Result<CompactionOutcome, CompactionError> {
        if messages.is_empty() {
            return Ok(CompactionOutcome::Unchanged { total_tokens: 0 });
        }

        let tokens = self.count_tokens(messages)?;
        let total_tokens: usize = tokens.iter().sum();
        let trigger = self.config.effective_trigger_tokens();
        if total_tokens <= trigger {
            return Ok(CompactionOutcome::Unchanged { total_tokens });
        }

        debug!(
            "Context compaction triggered (message_count={}, total_tokens={total_tokens}, trigger_tokens={trigger})",
            messages.len()
        );

        let blocks = partition(messages, &tokens);
        let (older, recent) = split_recent(&blocks.turns, self.config.effective_recent_tokens());

        debug!(
            "Partitioned history (turn_blocks={}, older_blocks={}, recent_blocks={})",
            blocks.turns.len(),
            older.len(),
            recent.len()
        );

        let context = SummaryContext {
            system_prompt: render_blocks([&blocks.system]),
            user_messages: render_blocks([&blocks.user]),
            previous_summary: render_blocks([&blocks.summary]),
            older_messages: render_blocks(older),
            recent_messages: render_blocks(recent),
        };

        let reply = self.summarize(context, cancel).await?;

        let kept = blocks.system.len() + blocks.user.len() + message_count(recent);
        let mut new_messages = Vec::with_capacity(kept + 1);
        new_messages.extend_from_slice(blocks.system.messages());
        new_messages.extend_from_slice(blocks.user.messages());
        new_messages.push(Message::summary(reply.text()));
        for block in recent {
            new_messages.extend_from_slice(block.messages());
        }

        let stats = CompactionStats {
            original_count: messages.len(),
            new_count: new_messages.len(),
            original_tokens: total_tokens,
            retained_tokens: blocks.system.tokens()
                + blocks.user.tokens()
                + recent.iter().map(Block::tokens).sum::<usize>(),
            older_blocks: older.len(),
            recent_blocks: recent.len(),
        };

        info!(
            "Context compacted (original_count={}, new_count={}, original_tokens={}, retained_tokens={})",
            stats.original_count, stats.new_count, stats.original_tokens, stats.retained_tokens
        );

        Ok(CompactionOutcome::Compacted(CompactionResult {
            messages: new_messages,
            stats,
        }))
    }

    async fn summarize(
        &self,
        context: SummaryContext,
        cancel: Option<&CancellationToken>,
    ) -> Result<Message, CompactionError> {
        let call = async {
            let summary = self.summarizer.summarize(context);
            match self.config.summary_timeout() {
                Some(limit) => match tokio::time::timeout(limit, summary).await {
                    Ok(result) => result,
                    Err(_) => Err(anyhow!("summarization timed out after {limit:?}")),
                },
                None => summary.await,
            }
        };

        let result = match cancel {
            Some(token) => tokio::select! {
                biased;
                () = token.cancelled() => Err(anyhow!("summarization cancelled")),
                result = call => result,
            },
            None => call.await,
        };

        result.map_err(|error| {
            warn!("Context compaction failed, keeping full history: {error:#}");
            CompactionError::SummarizationFailed(error)
        })
    }
}

impl<S: Summarizer> HistoryCompactor<S, TiktokenCounter> {
    /// Create a compactor counting with the `cl100k_base` encoding.
    ///
    /// # Errors
    /// Returns an error if the encoding cannot be loaded.
    pub fn with_tiktoken(summarizer: S, config: CompactionConfig) -> anyhow::Result<Self> {
        Ok(Self::new(summarizer, TiktokenCounter::new()?, config))
    }
}

impl<P: LlmProvider> HistoryCompactor<LlmSummarizer<P>, TiktokenCounter> {
    /// Create a compactor that summarizes with `provider` using the default
    /// prompt and counts with the `cl100k_base` encoding.
    ///
    /// # Errors
    /// Returns an error if the encoding cannot be loaded.
    pub fn from_provider(provider: Arc<P>, config: CompactionConfig) -> anyhow::Result<Self> {
        Self::with_tiktoken(LlmSummarizer::new(provider), config)
    }
}

fn message_count(blocks: &[Block<'_>]) -> usize {
    blocks.iter().map(Block::len).sum()
}
