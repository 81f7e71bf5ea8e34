//! Middleware run by the agent turn loop before each model call.
//!
//! - [`ChatModelMiddleware::before_model`] - Inspect or rewrite the working
//!   state before it is sent to the model
//!
//! # Built-in Implementations
//!
//! - [`SummarizationMiddleware`] - Compacts history that outgrew its budget

use crate::context::{CompactionStats, HistoryCompactor, Summarizer, TokenCounter};
use crate::stores::MessageStore;
use crate::types::{AgentState, ThreadId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

/// Hooks the turn loop calls around model invocations.
#[async_trait]
pub trait ChatModelMiddleware: Send + Sync {
    /// Called before every model call.
    /// An error aborts the turn; the state must then be left as it was.
    async fn before_model(&self, _state: &mut AgentState) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<T: ChatModelMiddleware + ?Sized> ChatModelMiddleware for Arc<T> {
    async fn before_model(&self, state: &mut AgentState) -> Result<()> {
        (**self).before_model(state).await
    }
}

/// Run every middleware in order, stopping at the first error.
///
/// # Errors
/// Returns the first middleware error.
pub async fn run_before_model(
    middlewares: &[Arc<dyn ChatModelMiddleware>],
    state: &mut AgentState,
) -> Result<()> {
    for middleware in middlewares {
        middleware.before_model(state).await?;
    }
    Ok(())
}

/// Compacts the working history before model calls.
///
/// On success the state's history is replaced and its compaction counter
/// incremented. On failure the state is untouched and the
/// [`CompactionError`](crate::context::CompactionError) is returned so the
/// turn loop can abort or retry from the same history.
pub struct SummarizationMiddleware<S, C> {
    compactor: HistoryCompactor<S, C>,
}

impl<S: Summarizer, C: TokenCounter> SummarizationMiddleware<S, C> {
    #[must_use]
    pub const fn new(compactor: HistoryCompactor<S, C>) -> Self {
        Self { compactor }
    }

    #[must_use]
    pub const fn compactor(&self) -> &HistoryCompactor<S, C> {
        &self.compactor
    }

    /// Compact a stored thread, writing back only after success.
    ///
    /// # Errors
    /// Returns an error if the store fails or compaction fails.
    pub async fn compact_thread<M: MessageStore>(
        &self,
        store: &M,
        thread_id: &ThreadId,
    ) -> Result<Option<CompactionStats>> {
        let mut history = store
            .get_history(thread_id)
            .await
            .context("Failed to get history for compaction")?;

        let Some(stats) = self.compactor.compact_history(&mut history).await? else {
            return Ok(None);
        };

        store
            .replace_history(thread_id, history)
            .await
            .context("Failed to replace history after compaction")?;

        debug!(
            "Stored compacted history (thread_id={thread_id}, new_count={})",
            stats.new_count
        );
        Ok(Some(stats))
    }
}

#[async_trait]
impl<S: Summarizer, C: TokenCounter> ChatModelMiddleware for SummarizationMiddleware<S, C> {
    async fn before_model(&self, state: &mut AgentState) -> Result<()> {
        if !self.compactor.config().auto_compact {
            return Ok(());
        }

        if let Some(stats) = self.compactor.compact_history(&mut state.messages).await? {
            state.compaction_count += 1;
            debug!(
                "Compacted working history (thread_id={}, turn={}, compactions={}, original_count={}, new_count={})",
                state.thread_id,
                state.turn_count,
                state.compaction_count,
                stats.original_count,
                stats.new_count
            );
        }
        Ok(())
    }
}
