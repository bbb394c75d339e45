//! HTTP-based LLM provider.
//!
//! Speaks the OpenAI-compatible chat completions API with tool calling.
//! OpenAI, Google Gemini, DeepSeek and Anthropic all expose this surface.

use crate::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, FunctionCall,
    FunctionSchema, LlmError, LlmProvider,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Inferred provider kind from model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Google,
    DeepSeek,
    /// Falls back to the OpenAI endpoint.
    Unknown,
}

impl ProviderKind {
    /// Infer provider from model name prefix.
    pub fn from_model(model: &str) -> Self {
        let m = model.to_lowercase();
        if m.starts_with("gpt-")
            || m.starts_with("o1-")
            || m.starts_with("o3-")
            || m.starts_with("o4-")
        {
            Self::OpenAi
        } else if m.starts_with("claude-") {
            Self::Anthropic
        } else if m.starts_with("gemini-") {
            Self::Google
        } else if m.starts_with("deepseek-") {
            Self::DeepSeek
        } else {
            Self::Unknown
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi | Self::Unknown => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com/v1",
            Self::Google => "https://generativelanguage.googleapis.com/v1beta/openai",
            Self::DeepSeek => "https://api.deepseek.com",
        }
    }
}

// ── OpenAI-compatible request/response types ──

#[derive(Serialize)]
struct OaiRequest {
    model: String,
    messages: Vec<OaiMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OaiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Serialize, Debug, PartialEq)]
struct OaiMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OaiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize)]
struct OaiTool {
    r#type: &'static str,
    function: OaiFunctionDef,
}

#[derive(Serialize)]
struct OaiFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

impl From<&FunctionSchema> for OaiTool {
    fn from(schema: &FunctionSchema) -> Self {
        Self {
            r#type: "function",
            function: OaiFunctionDef {
                name: schema.name.clone(),
                description: schema.description.clone(),
                parameters: schema.parameters.clone(),
            },
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct OaiToolCall {
    #[serde(default)]
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: OaiFunctionCall,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct OaiFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct OaiResponse {
    choices: Vec<OaiChoice>,
    usage: Option<OaiUsage>,
}

#[derive(Deserialize)]
struct OaiChoice {
    message: OaiChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OaiChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<OaiToolCall>,
    /// Legacy single-call field still returned by some compatible servers.
    function_call: Option<OaiFunctionCall>,
}

#[derive(Deserialize)]
struct OaiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// Convert conversation messages to the wire format.
/// A call and its result are paired through a synthetic `call_<n>` id.
fn to_wire_messages(messages: &[ChatMessage]) -> Vec<OaiMessage> {
    let mut pending_id: Option<String> = None;
    messages
        .iter()
        .enumerate()
        .map(|(i, m)| match m {
            ChatMessage::System { content } => plain("system", content),
            ChatMessage::User { content } => plain("user", content),
            ChatMessage::Assistant { content } => plain("assistant", content),
            ChatMessage::AssistantFunctionCall { call } => {
                let id = format!("call_{i}");
                pending_id = Some(id.clone());
                OaiMessage {
                    role: "assistant",
                    content: None,
                    tool_calls: Some(vec![OaiToolCall {
                        id,
                        r#type: function_type(),
                        function: OaiFunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                        },
                    }]),
                    tool_call_id: None,
                }
            }
            ChatMessage::Function { name, content } => match pending_id.take() {
                Some(id) => OaiMessage {
                    role: "tool",
                    content: Some(content.clone()),
                    tool_calls: None,
                    tool_call_id: Some(id),
                },
                // A result without a preceding call is replayed as context.
                None => plain("user", &format!("Result of `{name}`: {content}")),
            },
        })
        .collect()
}

fn plain(role: &'static str, content: &str) -> OaiMessage {
    OaiMessage { role, content: Some(content.to_owned()), tool_calls: None, tool_call_id: None }
}

fn from_wire_response(api: OaiResponse) -> Result<CompletionResponse, LlmError> {
    let choice = api
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse("no choices".into()))?;

    let function_call = choice
        .message
        .tool_calls
        .into_iter()
        .next()
        .map(|c| c.function)
        .or(choice.message.function_call)
        .map(|f| FunctionCall::new(f.name, f.arguments));

    let (input_tokens, output_tokens) = api
        .usage
        .map(|u| (u.prompt_tokens, u.completion_tokens))
        .unwrap_or((0, 0));

    Ok(CompletionResponse {
        content: choice.message.content,
        function_call,
        finish_reason: FinishReason::from_wire(choice.finish_reason.as_deref()),
        input_tokens,
        output_tokens,
    })
}

// ── Provider ──

/// HTTP-based LLM provider for OpenAI-compatible chat completion APIs.
pub struct HttpProvider {
    kind: ProviderKind,
    model: String,
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpProvider {
    /// Build from model name + API key + optional base URL override.
    pub fn new(model: String, api_key: String, base_url: Option<String>) -> Self {
        let kind = ProviderKind::from_model(&model);
        let base = base_url.unwrap_or_else(|| kind.default_base_url().to_owned());
        Self {
            kind,
            model,
            client: reqwest::Client::new(),
            base_url: base.trim_end_matches('/').to_owned(),
            api_key,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn complete_openai(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let tool_choice = match (request.functions.is_empty(), request.require_call) {
            (true, _) => None,
            (false, true) => Some("required"),
            (false, false) => Some("auto"),
        };
        let body = OaiRequest {
            model: request.model.unwrap_or_else(|| self.model.clone()),
            messages: to_wire_messages(&request.messages),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            tools: request.functions.iter().map(OaiTool::from).collect(),
            tool_choice,
        };

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(check_error(status, text));
        }

        let api: OaiResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        from_wire_response(api)
    }
}

/// Parse error response, returning RateLimited for 429.
fn check_error(status: reqwest::StatusCode, body: String) -> LlmError {
    if status.as_u16() == 429 {
        LlmError::RateLimited
    } else if status.is_server_error() {
        LlmError::Unavailable(format!("{status}: {body}"))
    } else {
        LlmError::RequestFailed(format!("{status}: {body}"))
    }
}

impl LlmProvider for HttpProvider {
    fn name(&self) -> &str {
        match self.kind {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Google => "google",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::Unknown => "unknown",
        }
    }

    fn complete(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>> {
        Box::pin(self.complete_openai(request))
    }
}

/// Build an LlmProvider from environment variables.
/// Reads `ROBO_LLM_API_KEY` and optionally `ROBO_LLM_BASE_URL`; `model` is the
/// default used when a request carries no override.
/// Returns `None` if the key is not set.
pub fn from_env(model: &str) -> Option<HttpProvider> {
    let api_key = std::env::var("ROBO_LLM_API_KEY").ok()?;
    let base_url = std::env::var("ROBO_LLM_BASE_URL").ok();
    Some(HttpProvider::new(model.to_owned(), api_key, base_url))
}
