//! Plain-text renderings of messages.
//!
//! Two renderings exist: the transcript form handed to the summarizer, and
//! the flatter form the default token counter encodes.

use crate::llm::{Message, Role};

use super::blocks::Block;

/// Render one message as a transcript entry.
///
/// Layout: a role tag line, the content, then for assistant messages one
/// `tool_call:` / `args:` pair per call, then any text parts.
#[must_use]
pub fn render_message(message: &Message) -> String {
    let mut output = String::new();

    match (message.role, message.tool_name.as_deref()) {
        (Role::Tool, Some(name)) if !name.is_empty() => {
            output.push_str("[tool:");
            output.push_str(name);
            output.push_str("]\n");
        }
        (role, _) => {
            output.push('[');
            output.push_str(role.as_str());
            output.push_str("]\n");
        }
    }

    push_line(&mut output, message.text());

    if message.role == Role::Assistant {
        for call in &message.tool_calls {
            if !call.function.name.is_empty() {
                output.push_str("tool_call: ");
                push_line(&mut output, &call.function.name);
            }
            if !call.function.arguments.is_empty() {
                output.push_str("args: ");
                push_line(&mut output, &call.function.arguments);
            }
        }
    }

    for text in message.text_parts() {
        push_line(&mut output, text);
    }

    output
}

/// Render every message of every block in order, one blank line apart.
#[must_use]
pub fn render_blocks<'b, 'a: 'b, I>(blocks: I) -> String
where
    I: IntoIterator<Item = &'b Block<'a>>,
{
    let mut output = String::new();
    for block in blocks {
        for message in block.messages() {
            output.push_str(&render_message(message));
            output.push('\n');
        }
    }
    output
}

/// Text the default counter tokenizes for a message.
///
/// Role name, content, text parts, then tool-call names and arguments, each
/// on its own line. Every message contributes at least its role line.
#[must_use]
pub fn counting_text(message: &Message) -> String {
    let mut output = String::new();
    push_line(&mut output, message.role.as_str());
    push_line(&mut output, message.text());

    for text in message.text_parts() {
        push_line(&mut output, text);
    }

    for call in &message.tool_calls {
        push_line(&mut output, &call.function.name);
        push_line(&mut output, &call.function.arguments);
    }

    output
}

fn push_line(output: &mut String, text: &str) {
    if !text.is_empty() {
        output.push_str(text);
        output.push('\n');
    }
}
