//! Core types shared by the middleware and stores.
//!
//! - [`ThreadId`]: Unique identifier for conversation threads
//! - [`AgentState`]: The working state a turn loop hands to middleware

use crate::llm::Message;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation thread
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub String);

impl ThreadId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-conversation state threaded through each model call.
///
/// Counters live here rather than in shared session storage, so every
/// conversation carries its own.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub thread_id: ThreadId,
    /// Working history sent to the model.
    pub messages: Vec<Message>,
    /// Model calls made so far.
    pub turn_count: usize,
    /// Successful compactions applied to `messages`.
    pub compaction_count: usize,
}

impl AgentState {
    #[must_use]
    pub fn new(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_id_unique() {
        assert_ne!(ThreadId::new(), ThreadId::new());
        assert_eq!(ThreadId::from_string("t-1").to_string(), "t-1");
    }

    #[test]
    fn test_agent_state_starts_empty() {
        let thread_id = ThreadId::from_string("t-1");
        let state = AgentState::new(thread_id.clone()).with_messages(vec![Message::user("hi")]);

        assert_eq!(state.thread_id, thread_id);
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.turn_count, 0);
        assert_eq!(state.compaction_count, 0);
    }
}
