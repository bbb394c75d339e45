//! Request size estimate used to pick a model variant.

use robo_llm::provider::{ChatMessage, FunctionSchema};

/// Per-message framing overhead.
const MESSAGE_OVERHEAD: usize = 4;
/// Every reply is primed with an assistant header.
const REPLY_PRIMING: usize = 2;

/// Approximate token count of a text: ~4 ASCII chars or ~1.5 other chars per token.
pub fn estimate_text(text: &str) -> usize {
    let (ascii, other) = text
        .chars()
        .fold((0usize, 0usize), |(a, o), c| if c.is_ascii() { (a + 1, o) } else { (a, o + 1) });
    ascii / 4 + (other as f64 / 1.5).ceil() as usize
}

/// Estimate for a full request: messages plus the serialized function schemas.
pub fn estimate_request(messages: &[ChatMessage], functions: &[FunctionSchema]) -> usize {
    let mut tokens = REPLY_PRIMING;
    for message in messages {
        tokens += MESSAGE_OVERHEAD + estimate_text(message.role().as_str()) + estimate_text(message.text());
        if let ChatMessage::AssistantFunctionCall { call } = message {
            tokens += estimate_text(&call.name);
        }
        if let ChatMessage::Function { name, .. } = message {
            tokens += estimate_text(name);
        }
    }
    for schema in functions {
        tokens += serde_json::to_string(schema).map(|s| estimate_text(&s)).unwrap_or(0);
    }
    tokens
}
