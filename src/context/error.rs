//! Errors raised by a compaction attempt.

use thiserror::Error;

/// Why a compaction attempt was abandoned.
///
/// Both variants are terminal for the attempt: no new history is assembled,
/// so the caller's pre-compaction history stays authoritative.
#[derive(Debug, Error)]
pub enum CompactionError {
    /// The token counter returned a different number of counts than messages.
    #[error("token count mismatch: {messages} messages, {counts} counts")]
    CountMismatch { messages: usize, counts: usize },

    /// The summarizer failed, timed out or was cancelled.
    #[error("summarization failed: {0}")]
    SummarizationFailed(#[source] anyhow::Error),
}

impl CompactionError {
    /// Whether retrying the same history could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::SummarizationFailed(_))
    }
}
