//! Context compaction for long-running conversations.
//!
//! This module keeps an agent's message history within a token budget.
//! When the history grows too large, older turns are summarized and
//! replaced with a single summary message.
//!
//! # Overview
//!
//! The compaction system works as follows:
//! 1. Count tokens per message with a [`TokenCounter`]
//! 2. When the total exceeds the trigger budget, partition the history into
//!    blocks: system prompt, leading user messages, previous summary, and
//!    turn blocks (a tool call travels with its results)
//! 3. Keep the newest turn blocks that fit the recent budget verbatim
//! 4. Summarize the rest with a [`Summarizer`]
//! 5. Replace history with system + user + summary + recent messages
//!
//! # Example
//!
//! ```ignore
//! use history_compaction::context::{CompactionConfig, HistoryCompactor};
//!
//! let compactor = HistoryCompactor::from_provider(provider, CompactionConfig::default())?;
//! compactor.compact_history(&mut history).await?;
//! ```
//!
//! # Configuration
//!
//! Use [`CompactionConfig`] to customize compaction behavior:
//! - `trigger_tokens`: When to trigger compaction
//! - `recent_tokens`: How many tokens of recent turns to keep intact
//! - `summary_timeout_secs`: Upper bound on the summarization call
//! - `auto_compact`: Whether the middleware compacts before model calls

mod blocks;
mod compactor;
mod config;
mod counter;
mod error;
mod render;
mod summarizer;

pub use blocks::{Block, Partition, partition, split_recent};
pub use compactor::{CompactionOutcome, CompactionResult, CompactionStats, HistoryCompactor};
pub use config::{CompactionConfig, DEFAULT_RECENT_TOKENS, DEFAULT_TRIGGER_TOKENS};
pub use counter::{HeuristicCounter, TiktokenCounter, TokenCounter};
pub use error::CompactionError;
pub use render::{counting_text, render_blocks, render_message};
pub use summarizer::{
    DEFAULT_SUMMARY_PROMPT, LlmSummarizer, PromptTemplate, SUMMARY_INSTRUCTION, Summarizer,
    SummaryContext,
};
