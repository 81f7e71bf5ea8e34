use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key in [`Message::extra`] marking a message produced by compaction.
pub const SUMMARY_MESSAGE_FLAG: &str = "_agent_middleware_summary_message";

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Id of the assistant tool call this message answers. Empty when unknown.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tool_call_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl Message {
    fn with_text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(text.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self::with_text(Role::System, text)
    }

    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::with_text(Role::User, text)
    }

    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_text(Role::Assistant, text)
    }

    #[must_use]
    pub fn assistant_with_tool_calls(text: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: text,
            tool_calls,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_call_id: tool_call_id.into(),
            tool_name: Some(tool_name.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_parts(mut self, parts: Vec<ContentPart>) -> Self {
        self.parts = parts;
        self
    }

    /// Builds the assistant message that replaces summarized history.
    #[must_use]
    pub fn summary(text: impl Into<String>) -> Self {
        let mut message = Self::assistant(text);
        message.name = Some("summary".to_string());
        message.mark_summary();
        message
    }

    pub fn mark_summary(&mut self) {
        self.extra
            .insert(SUMMARY_MESSAGE_FLAG.to_string(), Value::Bool(true));
    }

    #[must_use]
    pub fn is_summary(&self) -> bool {
        self.extra.contains_key(SUMMARY_MESSAGE_FLAG)
    }

    #[must_use]
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    pub fn text_parts(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|part| match part {
            ContentPart::Text { text } if !text.is_empty() => Some(text.as_str()),
            _ => None,
        })
    }

    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        self.role == Role::Assistant && !self.tool_calls.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    #[default]
    User,
    Assistant,
    Tool,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "image_url")]
    ImageUrl { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub function: FunctionCall,
}

impl ToolCall {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON arguments as produced by the model.
    pub arguments: String,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub id: String,
    pub message: Message,
    pub model: String,
    pub stop_reason: Option<StopReason>,
    pub usage: Usage,
}

impl ChatResponse {
    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        self.message
            .content
            .as_deref()
            .filter(|text| !text.is_empty())
            .or_else(|| self.message.text_parts().next())
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug)]
pub enum ChatOutcome {
    Success(ChatResponse),
    RateLimited,
    InvalidRequest(String),
    ServerError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_summary_flag() {
        let mut message = Message::assistant("recap");
        assert!(!message.is_summary());

        message.mark_summary();
        assert!(message.is_summary());

        let summary = Message::summary("recap");
        assert!(summary.is_summary());
        assert_eq!(summary.name.as_deref(), Some("summary"));
        assert_eq!(summary.role, Role::Assistant);
    }

    #[test]
    fn test_text_parts_skip_images_and_empty_text() {
        let message = Message::user("look").with_parts(vec![
            ContentPart::Text {
                text: "caption".to_string(),
            },
            ContentPart::ImageUrl {
                url: "https://example.com/a.png".to_string(),
            },
            ContentPart::Text {
                text: String::new(),
            },
        ]);

        let parts: Vec<&str> = message.text_parts().collect();
        assert_eq!(parts, vec!["caption"]);
    }

    #[test]
    fn test_serde_shape() -> Result<()> {
        let message = Message::assistant_with_tool_calls(
            None,
            vec![ToolCall::new("call_1", "search", r#"{"q":"rust"}"#)],
        );

        let json = serde_json::to_value(&message)?;
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["tool_calls"][0]["function"]["name"], "search");
        assert!(json.get("content").is_none());
        assert!(json.get("tool_call_id").is_none());

        let back: Message = serde_json::from_value(json)?;
        assert_eq!(back, message);
        Ok(())
    }

    #[test]
    fn test_summary_flag_survives_serde() -> Result<()> {
        let summary = Message::summary("recap");
        let json = serde_json::to_string(&summary)?;
        let back: Message = serde_json::from_str(&json)?;
        assert!(back.is_summary());
        Ok(())
    }

    #[test]
    fn test_first_text_falls_back_to_parts() {
        let response = ChatResponse {
            id: "msg_1".to_string(),
            message: Message {
                role: Role::Assistant,
                parts: vec![ContentPart::Text {
                    text: "from parts".to_string(),
                }],
                ..Message::default()
            },
            model: "mock".to_string(),
            stop_reason: Some(StopReason::EndTurn),
            usage: Usage {
                input_tokens: 1,
                output_tokens: 1,
            },
        };

        assert_eq!(response.first_text(), Some("from parts"));
    }
}
