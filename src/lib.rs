//! History compaction for long-running LLM conversations.
//!
//! This crate keeps an agent's message history under a token budget by
//! folding older turns into a single summary message, while the system
//! prompt, the user's opening request and the most recent turns are kept
//! verbatim. Tool calls never lose their results along the way.
//!
//! - Token-budgeted [`HistoryCompactor`] with pluggable counting and summarization
//! - Provider-agnostic LLM interface for the default summarizer
//! - [`SummarizationMiddleware`] for agent turn loops
//!
//! # Example
//!
//! ```ignore
//! use history_compaction::{
//!     AgentState, ChatModelMiddleware, CompactionConfig, HistoryCompactor,
//!     SummarizationMiddleware, ThreadId,
//! };
//!
//! let compactor = HistoryCompactor::from_provider(provider, CompactionConfig::default())?;
//! let middleware = SummarizationMiddleware::new(compactor);
//!
//! let mut state = AgentState::new(ThreadId::new()).with_messages(history);
//! middleware.before_model(&mut state).await?;
//! ```

#![forbid(unsafe_code)]

pub mod context;
pub mod llm;
mod middleware;
mod stores;
mod types;

pub use context::{
    CompactionConfig, CompactionError, CompactionOutcome, CompactionStats, HistoryCompactor,
    Summarizer, TokenCounter,
};
pub use llm::{LlmProvider, Message};
pub use middleware::{ChatModelMiddleware, SummarizationMiddleware, run_before_model};
pub use stores::{InMemoryStore, MessageStore};
pub use types::{AgentState, ThreadId};
