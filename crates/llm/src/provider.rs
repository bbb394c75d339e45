use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

/// Who authored a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Assistant turn that requested a structured call instead of text.
    AssistantFunctionCall,
    /// Result of a structured call, fed back to the model.
    Function,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant | Self::AssistantFunctionCall => "assistant",
            Self::Function => "function",
        }
    }
}

/// A structured call requested by the model: a function name plus its
/// arguments as the raw JSON text the model produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self { name: name.into(), arguments: arguments.into() }
    }

    /// Parse the argument payload into a JSON object.
    /// Fails on malformed JSON and on any payload that is not an object.
    pub fn parse_arguments(&self) -> Result<Map<String, Value>, serde_json::Error> {
        serde_json::from_str(&self.arguments)
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ChatMessage {
    System { content: String },
    User { content: String },
    Assistant { content: String },
    AssistantFunctionCall { call: FunctionCall },
    Function { name: String, content: String },
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System { content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User { content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant { content: content.into() }
    }

    pub fn function_call(call: FunctionCall) -> Self {
        Self::AssistantFunctionCall { call }
    }

    pub fn function_result(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Function { name: name.into(), content: content.into() }
    }

    pub fn role(&self) -> Role {
        match self {
            Self::System { .. } => Role::System,
            Self::User { .. } => Role::User,
            Self::Assistant { .. } => Role::Assistant,
            Self::AssistantFunctionCall { .. } => Role::AssistantFunctionCall,
            Self::Function { .. } => Role::Function,
        }
    }

    /// Textual payload of the message. For a call this is the raw argument JSON.
    pub fn text(&self) -> &str {
        match self {
            Self::System { content }
            | Self::User { content }
            | Self::Assistant { content }
            | Self::Function { content, .. } => content,
            Self::AssistantFunctionCall { call } => &call.arguments,
        }
    }
}

/// Function schema offered to the model (name + description + JSON Schema of the parameters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl FunctionSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self { name: name.into(), description: description.into(), parameters }
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinishReason {
    #[default]
    Stop,
    FunctionCall,
    Length,
    Other,
}

impl FinishReason {
    pub fn from_wire(reason: Option<&str>) -> Self {
        match reason {
            Some("stop") | None => Self::Stop,
            Some("function_call") | Some("tool_calls") => Self::FunctionCall,
            Some("length") => Self::Length,
            Some(_) => Self::Other,
        }
    }
}

/// LLM completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model override. `None` uses the provider's configured model.
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Function schemas offered to the model (empty = plain completion).
    pub functions: Vec<FunctionSchema>,
    /// Ask the provider to force a structured call when functions are offered.
    pub require_call: bool,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            model: None,
            messages,
            temperature: 0.0,
            max_tokens: None,
            functions: Vec::new(),
            require_call: false,
        }
    }
}

/// LLM completion response.
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    pub content: Option<String>,
    pub function_call: Option<FunctionCall>,
    pub finish_reason: FinishReason,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl CompletionResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), ..Self::default() }
    }

    pub fn call(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            function_call: Some(FunctionCall::new(name, arguments)),
            finish_reason: FinishReason::FunctionCall,
            ..Self::default()
        }
    }
}

/// Error type for LLM operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("rate limited")]
    RateLimited,
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Trait for LLM providers (OpenAI, Gemini, DeepSeek, etc.)
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    fn complete(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>>;
}

/// Mock provider for testing. Returns a fixed response.
#[derive(Debug, Clone)]
pub struct MockProvider {
    pub response: CompletionResponse,
}

impl MockProvider {
    pub fn new(response: impl Into<String>) -> Self {
        Self { response: CompletionResponse::text(response) }
    }

    /// Create a mock that always answers with the same structured call.
    pub fn with_call(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self { response: CompletionResponse::call(name, arguments) }
    }
}

impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>> {
        let mut response = self.response.clone();
        response.input_tokens = 10;
        response.output_tokens = 20;
        Box::pin(async move { Ok(response) })
    }
}

/// Provider that replays a fixed script of outcomes, one per request, and
/// records every request it receives. Fails with `Unavailable` once the
/// script runs dry.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<CompletionResponse, LlmError>>) -> Self {
        Self { script: Mutex::new(script.into()), requests: Mutex::new(Vec::new()) }
    }

    /// Convenience for a script made only of plain-text answers.
    pub fn texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|t| Ok(CompletionResponse::text(t))).collect())
    }

    pub fn push(&self, outcome: Result<CompletionResponse, LlmError>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(outcome);
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn complete(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        let next = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or_else(|| Err(LlmError::Unavailable("script exhausted".into())));
        Box::pin(async move { next })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_provider_returns_response() {
        let mock = MockProvider::new("hello robot");
        let req = CompletionRequest::new(vec![ChatMessage::user("hi")]);
        let resp = mock.complete(req).await.unwrap();
        assert_eq!(resp.content.as_deref(), Some("hello robot"));
        assert_eq!(resp.finish_reason, FinishReason::Stop);
        assert!(resp.function_call.is_none());
    }

    #[tokio::test]
    async fn mock_provider_returns_call() {
        let mock = MockProvider::with_call("think", r#"{"text":"why?"}"#);
        let resp = mock.complete(CompletionRequest::new(vec![])).await.unwrap();
        assert_eq!(resp.finish_reason, FinishReason::FunctionCall);
        let call = resp.function_call.unwrap();
        assert_eq!(call.name, "think");
        assert_eq!(call.parse_arguments().unwrap()["text"], "why?");
    }

    #[tokio::test]
    async fn scripted_provider_replays_in_order_and_counts() {
        let provider = ScriptedProvider::new(vec![
            Err(LlmError::RateLimited),
            Ok(CompletionResponse::text("second")),
        ]);

        let first = provider.complete(CompletionRequest::new(vec![ChatMessage::user("a")])).await;
        assert!(matches!(first, Err(LlmError::RateLimited)));

        let second = provider.complete(CompletionRequest::new(vec![ChatMessage::user("b")])).await.unwrap();
        assert_eq!(second.content.as_deref(), Some("second"));

        let dry = provider.complete(CompletionRequest::new(vec![])).await;
        assert!(matches!(dry, Err(LlmError::Unavailable(_))));

        assert_eq!(provider.request_count(), 3);
        assert_eq!(provider.requests()[1].messages, vec![ChatMessage::user("b")]);
        assert_eq!(provider.remaining(), 0);
    }

    #[test]
    fn malformed_or_non_object_arguments_fail_to_parse() {
        assert!(FunctionCall::new("f", "{not json").parse_arguments().is_err());
        assert!(FunctionCall::new("f", "[1, 2]").parse_arguments().is_err());
        assert!(FunctionCall::new("f", "{}").parse_arguments().unwrap().is_empty());
    }

    #[test]
    fn message_roles_and_text() {
        let call = ChatMessage::function_call(FunctionCall::new("move_to", r#"{"x":1}"#));
        assert_eq!(call.role(), Role::AssistantFunctionCall);
        assert_eq!(call.text(), r#"{"x":1}"#);
        assert_eq!(ChatMessage::function_result("move_to", "ok").role(), Role::Function);
        assert_eq!(ChatMessage::system("s").text(), "s");
    }

    #[test]
    fn finish_reason_wire_mapping() {
        assert_eq!(FinishReason::from_wire(Some("stop")), FinishReason::Stop);
        assert_eq!(FinishReason::from_wire(Some("tool_calls")), FinishReason::FunctionCall);
        assert_eq!(FinishReason::from_wire(Some("function_call")), FinishReason::FunctionCall);
        assert_eq!(FinishReason::from_wire(Some("length")), FinishReason::Length);
        assert_eq!(FinishReason::from_wire(Some("content_filter")), FinishReason::Other);
    }
}
