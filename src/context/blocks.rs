//! Partitioning of a message history into blocks that move together.
//!
//! Block kinds are positional: an optional leading system message, the run
//! of user messages right after it, an optional previous summary, then turn
//! blocks for everything else. An assistant message that requests tools
//! forms one turn block with the tool results answering it, so a compaction
//! can never separate a call from its response.

use crate::llm::{Message, Role};
use std::collections::HashSet;
use std::ops::Range;

/// A contiguous run of messages and their summed token count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block<'a> {
    messages: &'a [Message],
    tokens: usize,
}

impl<'a> Block<'a> {
    fn new(messages: &'a [Message], tokens: &[usize], range: Range<usize>) -> Self {
        Self {
            tokens: tokens[range.clone()].iter().sum(),
            messages: &messages[range],
        }
    }

    #[must_use]
    pub const fn messages(&self) -> &'a [Message] {
        self.messages
    }

    #[must_use]
    pub const fn tokens(&self) -> usize {
        self.tokens
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// A history split into its leading blocks and turn blocks.
#[derive(Debug, Clone)]
pub struct Partition<'a> {
    pub system: Block<'a>,
    pub user: Block<'a>,
    pub summary: Block<'a>,
    pub turns: Vec<Block<'a>>,
}

impl<'a> Partition<'a> {
    /// All blocks in history order, empty leading blocks included.
    pub fn iter(&self) -> impl Iterator<Item = &Block<'a>> {
        [&self.system, &self.user, &self.summary]
            .into_iter()
            .chain(self.turns.iter())
    }
}

/// Partition `messages` into blocks.
///
/// `tokens` must be the parallel per-message count; callers verify the
/// lengths match before partitioning.
#[must_use]
pub fn partition<'a>(messages: &'a [Message], tokens: &[usize]) -> Partition<'a> {
    debug_assert_eq!(messages.len(), tokens.len());

    let len = messages.len();
    let mut idx = 0;

    let system_start = idx;
    if messages.first().is_some_and(|m| m.role == Role::System) {
        idx += 1;
    }
    let system = Block::new(messages, tokens, system_start..idx);

    let user_start = idx;
    while idx < len && messages[idx].role == Role::User {
        idx += 1;
    }
    let user = Block::new(messages, tokens, user_start..idx);

    let summary_start = idx;
    if messages
        .get(idx)
        .is_some_and(|m| m.role == Role::Assistant && m.is_summary())
    {
        idx += 1;
    }
    let summary = Block::new(messages, tokens, summary_start..idx);

    let mut turns = Vec::new();
    while idx < len {
        let end = turn_end(messages, idx);
        turns.push(Block::new(messages, tokens, idx..end));
        idx = end;
    }

    Partition {
        system,
        user,
        summary,
        turns,
    }
}

/// Exclusive end of the turn block starting at `start`.
fn turn_end(messages: &[Message], start: usize) -> usize {
    let head = &messages[start];
    if !head.has_tool_calls() {
        return start + 1;
    }

    let call_ids: HashSet<&str> = head.tool_calls.iter().map(|c| c.id.as_str()).collect();

    let mut end = start + 1;
    while let Some(next) = messages.get(end) {
        if next.role != Role::Tool {
            break;
        }
        // Unattributed results stay with the call but don't close the scan.
        if !next.tool_call_id.is_empty() && !call_ids.contains(next.tool_call_id.as_str()) {
            break;
        }
        end += 1;
    }
    end
}

/// Split turn blocks into `(older, recent)`.
///
/// Walks from the newest block backwards, keeping blocks while their running
/// total stays within `budget`. The first block that would overflow ends the
/// walk: it and everything before it are older, even if a smaller older block
/// would still fit. Recent is always a contiguous suffix.
#[must_use]
pub fn split_recent<'p, 'a>(
    turns: &'p [Block<'a>],
    budget: usize,
) -> (&'p [Block<'a>], &'p [Block<'a>]) {
    let mut used = 0usize;
    let mut split = turns.len();

    for (i, block) in turns.iter().enumerate().rev() {
        let next = used.saturating_add(block.tokens);
        if next > budget {
            break;
        }
        used = next;
        split = i;
    }

    turns.split_at(split)
}
