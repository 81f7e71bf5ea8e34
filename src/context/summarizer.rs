//! Summarization step used by the compactor.

use crate::llm::{ChatOutcome, ChatRequest, LlmProvider, Message};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default system prompt for [`LlmSummarizer`].
pub const DEFAULT_SUMMARY_PROMPT: &str = r"You maintain the working memory of a long-running assistant conversation.
The conversation has grown too long and its older part must be condensed into a single summary that replaces it.

Write the summary so the assistant can continue the task without the original messages. Preserve:
- The user's goals, constraints and explicit instructions
- Decisions made and conclusions reached
- Concrete details: file names, identifiers, commands, tool calls and their results, error messages
- Work completed so far and anything still pending

Fold the previous summary (if any) into the new one rather than repeating it. Do not restate the recent messages; they are kept verbatim after the summary and are shown only for context.

System prompt:
{system_prompt}

User messages:
{user_messages}

Previous summary:
{previous_summary}

Older messages (summarize these):
{older_messages}

Recent messages (kept verbatim):
{recent_messages}";

/// User turn sent after the rendered system prompt.
pub const SUMMARY_INSTRUCTION: &str = "summarize 'older_messages': ";

/// Rendered history handed to a [`Summarizer`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryContext {
    pub system_prompt: String,
    pub user_messages: String,
    pub previous_summary: String,
    pub older_messages: String,
    pub recent_messages: String,
}

impl SummaryContext {
    /// Look up a field by its serialized name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "system_prompt" => Some(&self.system_prompt),
            "user_messages" => Some(&self.user_messages),
            "previous_summary" => Some(&self.previous_summary),
            "older_messages" => Some(&self.older_messages),
            "recent_messages" => Some(&self.recent_messages),
            _ => None,
        }
    }
}

/// Condenses rendered history into a replacement message.
///
/// Only the returned message's text is used; the compactor builds the final
/// summary message itself.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// # Errors
    /// Any error aborts the compaction attempt.
    async fn summarize(&self, context: SummaryContext) -> Result<Message>;
}

#[async_trait]
impl<S: Summarizer + ?Sized> Summarizer for Arc<S> {
    async fn summarize(&self, context: SummaryContext) -> Result<Message> {
        (**self).summarize(context).await
    }
}

/// A prompt with `{field}` placeholders for [`SummaryContext`] fields.
///
/// Substitution is a single pass, so placeholder-like text inside the
/// substituted history is never expanded. Unknown placeholders are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.template
    }

    #[must_use]
    pub fn render(&self, context: &SummaryContext) -> String {
        let mut output = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(open) = rest.find('{') {
            output.push_str(&rest[..open]);
            let after = &rest[open + 1..];

            let value = after
                .find('}')
                .and_then(|close| context.field(&after[..close]).map(|v| (close, v)));

            match value {
                Some((close, value)) => {
                    output.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    output.push('{');
                    rest = after;
                }
            }
        }

        output.push_str(rest);
        output
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_SUMMARY_PROMPT)
    }
}

/// LLM-backed summarizer.
///
/// Renders the prompt template into the system prompt and asks the model to
/// summarize the older messages.
pub struct LlmSummarizer<P: LlmProvider> {
    provider: Arc<P>,
    prompt: PromptTemplate,
    max_tokens: u32,
}

impl<P: LlmProvider> LlmSummarizer<P> {
    /// Create a summarizer with the default prompt.
    #[must_use]
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            prompt: PromptTemplate::default(),
            max_tokens: 2000,
        }
    }

    /// Replace the system prompt template. An empty template keeps the default.
    #[must_use]
    pub fn with_prompt(mut self, template: impl Into<String>) -> Self {
        let template = template.into();
        if !template.is_empty() {
            self.prompt = PromptTemplate::new(template);
        }
        self
    }

    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub const fn prompt(&self) -> &PromptTemplate {
        &self.prompt
    }
}

#[async_trait]
impl<P: LlmProvider> Summarizer for LlmSummarizer<P> {
    async fn summarize(&self, context: SummaryContext) -> Result<Message> {
        let request = ChatRequest {
            system: self.prompt.render(&context),
            messages: vec![Message::user(SUMMARY_INSTRUCTION)],
            max_tokens: self.max_tokens,
        };

        let outcome = self
            .provider
            .chat(request)
            .await
            .context("Failed to call LLM for summarization")?;

        match outcome {
            ChatOutcome::Success(response) => response
                .first_text()
                .map(Message::assistant)
                .context("No text in summarization response"),
            ChatOutcome::RateLimited => {
                bail!("Rate limited during summarization")
            }
            ChatOutcome::InvalidRequest(msg) => {
                bail!("Invalid request during summarization: {msg}")
            }
            ChatOutcome::ServerError(msg) => {
                bail!("Server error during summarization: {msg}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, StopReason, Usage};
    use std::sync::Mutex;

    struct MockProvider {
        outcome: Mutex<Option<ChatOutcome>>,
        last_request: Mutex<Option<ChatRequest>>,
    }

    impl MockProvider {
        fn new(outcome: ChatOutcome) -> Self {
            Self {
                outcome: Mutex::new(Some(outcome)),
                last_request: Mutex::new(None),
            }
        }

        fn text(summary: &str) -> Self {
            Self::new(ChatOutcome::Success(ChatResponse {
                id: "test".to_string(),
                message: Message::assistant(summary),
                model: "mock".to_string(),
                stop_reason: Some(StopReason::EndTurn),
                usage: Usage {
                    input_tokens: 100,
                    output_tokens: 50,
                },
            }))
        }
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        async fn chat(&self, request: ChatRequest) -> Result<ChatOutcome> {
            *self.last_request.lock().unwrap() = Some(request);
            self.outcome
                .lock()
                .unwrap()
                .take()
                .context("mock provider called twice")
        }

        fn model(&self) -> &'static str {
            "mock-model"
        }

        fn provider(&self) -> &'static str {
            "mock"
        }
    }

    fn context() -> SummaryContext {
        SummaryContext {
            system_prompt: "[system]\nbe helpful\n".to_string(),
            user_messages: "[user]\nwrite a report\n".to_string(),
            previous_summary: String::new(),
            older_messages: "[assistant]\nsection one\n".to_string(),
            recent_messages: "[assistant]\nsection two\n".to_string(),
        }
    }

    #[test]
    fn test_template_substitutes_all_fields() {
        let template = PromptTemplate::new(
            "{system_prompt}|{user_messages}|{previous_summary}|{older_messages}|{recent_messages}",
        );
        let rendered = template.render(&context());

        assert_eq!(
            rendered,
            "[system]\nbe helpful\n|[user]\nwrite a report\n||[assistant]\nsection one\n|[assistant]\nsection two\n"
        );
    }

    #[test]
    fn test_template_keeps_unknown_placeholders_and_stray_braces() {
        let template = PromptTemplate::new("json {\"a\": 1} {unknown} {older_messages} {");
        let rendered = template.render(&context());

        assert_eq!(
            rendered,
            "json {\"a\": 1} {unknown} [assistant]\nsection one\n {"
        );
    }

    #[test]
    fn test_template_does_not_expand_substituted_text() {
        let template = PromptTemplate::new("{older_messages}/{recent_messages}");
        let ctx = SummaryContext {
            older_messages: "{recent_messages}".to_string(),
            recent_messages: "tail".to_string(),
            ..SummaryContext::default()
        };

        assert_eq!(template.render(&ctx), "{recent_messages}/tail");
    }

    #[test]
    fn test_default_template_mentions_every_field() {
        let template = PromptTemplate::default();
        for name in [
            "system_prompt",
            "user_messages",
            "previous_summary",
            "older_messages",
            "recent_messages",
        ] {
            assert!(template.as_str().contains(&format!("{{{name}}}")), "{name}");
        }
    }

    #[test]
    fn test_context_serializes_five_fields() -> Result<()> {
        let json = serde_json::to_value(context())?;
        let object = json.as_object().context("expected object")?;
        assert_eq!(object.len(), 5);
        assert_eq!(object["older_messages"], "[assistant]\nsection one\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_llm_summarizer_builds_request() -> Result<()> {
        let provider = Arc::new(MockProvider::text("condensed"));
        let summarizer = LlmSummarizer::new(Arc::clone(&provider))
            .with_prompt("Summarize for: {user_messages}")
            .with_max_tokens(512);

        let message = summarizer.summarize(context()).await?;
        assert_eq!(message.text(), "condensed");

        let request = provider
            .last_request
            .lock()
            .unwrap()
            .clone()
            .context("no request recorded")?;
        assert_eq!(request.system, "Summarize for: [user]\nwrite a report\n");
        assert_eq!(request.max_tokens, 512);
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].text(), SUMMARY_INSTRUCTION);
        Ok(())
    }

    #[test]
    fn test_empty_prompt_keeps_default() {
        let provider = Arc::new(MockProvider::text("x"));
        let summarizer = LlmSummarizer::new(provider).with_prompt("");
        assert_eq!(summarizer.prompt().as_str(), DEFAULT_SUMMARY_PROMPT);
    }

    #[tokio::test]
    async fn test_llm_summarizer_maps_failures() {
        let cases = vec![
            (ChatOutcome::RateLimited, "Rate limited"),
            (
                ChatOutcome::InvalidRequest("bad".to_string()),
                "Invalid request during summarization: bad",
            ),
            (
                ChatOutcome::ServerError("down".to_string()),
                "Server error during summarization: down",
            ),
        ];

        for (outcome, expected) in cases {
            let summarizer = LlmSummarizer::new(Arc::new(MockProvider::new(outcome)));
            let err = summarizer
                .summarize(context())
                .await
                .expect_err("should fail");
            assert!(err.to_string().contains(expected), "{err}");
        }
    }

    #[tokio::test]
    async fn test_llm_summarizer_rejects_empty_response() {
        let summarizer = LlmSummarizer::new(Arc::new(MockProvider::text("")));
        let err = summarizer
            .summarize(context())
            .await
            .expect_err("should fail");
        assert!(err.to_string().contains("No text"));
    }
}
