//! Oracle interface: model selection, retry policy and structured-call validation.

pub mod prompts;
pub mod tokens;

use std::sync::Arc;
use std::time::Duration;

use robo_llm::provider::{ChatMessage, CompletionRequest, FunctionSchema, LlmError, LlmProvider};
use serde_json::{Map, Value};

use crate::config::RoboCfg;
use crate::error::OracleError;

/// A structured call whose arguments parsed as a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredCall {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl StructuredCall {
    /// Value of the first argument, in payload order.
    pub fn first_argument(&self) -> Option<&Value> {
        self.arguments.values().next()
    }

    /// Re-serialized argument payload, for the conversation log.
    pub fn arguments_json(&self) -> String {
        Value::Object(self.arguments.clone()).to_string()
    }
}

/// Accepted oracle answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Text(String),
    Call(StructuredCall),
}

impl Completion {
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text),
            Self::Call(_) => None,
        }
    }

    pub fn into_call(self) -> Option<StructuredCall> {
        match self {
            Self::Call(call) => Some(call),
            Self::Text(_) => None,
        }
    }
}

/// Wraps the inference service with sizing, retry and validation.
pub struct Oracle {
    provider: Arc<dyn LlmProvider>,
    standard_model: String,
    extended_model: String,
    context_frame_tokens: usize,
    max_retries: u32,
    timeout: Option<Duration>,
}

impl Oracle {
    pub fn new(provider: Arc<dyn LlmProvider>, cfg: &RoboCfg) -> Self {
        Self {
            provider,
            standard_model: cfg.standard_model.clone(),
            extended_model: cfg.extended_model.clone(),
            context_frame_tokens: cfg.context_frame_tokens,
            max_retries: cfg.max_retries.max(1),
            timeout: (cfg.oracle_timeout_secs > 0).then(|| Duration::from_secs(cfg.oracle_timeout_secs)),
        }
    }

    /// Standard model while the request fits the context frame, extended otherwise.
    pub fn select_model(&self, messages: &[ChatMessage], functions: &[FunctionSchema]) -> &str {
        if tokens::estimate_request(messages, functions) < self.context_frame_tokens {
            &self.standard_model
        } else {
            &self.extended_model
        }
    }

    /// Request a completion, retrying transport failures, malformed call
    /// arguments and (with `must_call`) plain-text answers.
    ///
    /// When every attempt fails with `must_call` set and no schemas offered,
    /// the last text answer is returned as a last resort. Otherwise exhaustion
    /// is reported as [`OracleError::Exhausted`].
    pub async fn process(
        &self,
        messages: &[ChatMessage],
        functions: &[FunctionSchema],
        must_call: bool,
    ) -> Result<Completion, OracleError> {
        let model = self.select_model(messages, functions).to_owned();
        let mut last_text: Option<String> = None;
        let mut last_reason = String::from("no attempt made");

        for attempt in 1..=self.max_retries {
            let request = CompletionRequest {
                model: Some(model.clone()),
                messages: messages.to_vec(),
                functions: functions.to_vec(),
                require_call: must_call,
                ..CompletionRequest::new(Vec::new())
            };

            let response = match self.send(request).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(attempt, max = self.max_retries, provider = self.provider.name(), error = %e, "getting completion failed");
                    last_reason = e.to_string();
                    continue;
                }
            };

            if let Some(call) = response.function_call {
                match call.parse_arguments() {
                    Ok(arguments) => {
                        return Ok(Completion::Call(StructuredCall { name: call.name, arguments }));
                    }
                    Err(e) => {
                        tracing::warn!(attempt, max = self.max_retries, function = %call.name, error = %e, "faulty JSON object returned");
                        last_reason = format!("faulty JSON object returned for `{}`: {e}", call.name);
                        continue;
                    }
                }
            }

            let content = response.content.unwrap_or_default();
            if must_call {
                tracing::warn!(attempt, max = self.max_retries, "expected function call");
                last_reason = "expected function call".into();
                last_text = Some(content);
                continue;
            }
            return Ok(Completion::Text(content));
        }

        if must_call && functions.is_empty() {
            if let Some(text) = last_text {
                return Ok(Completion::Text(text));
            }
        }
        Err(OracleError::Exhausted { attempts: self.max_retries, last_reason })
    }

    async fn send(&self, request: CompletionRequest) -> Result<robo_llm::provider::CompletionResponse, LlmError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.provider.complete(request))
                .await
                .unwrap_or(Err(LlmError::Timeout(limit.as_secs()))),
            None => self.provider.complete(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robo_llm::provider::{CompletionResponse, ScriptedProvider};
    use serde_json::json;

    fn oracle(provider: Arc<ScriptedProvider>) -> Oracle {
        Oracle::new(provider, &RoboCfg::default())
    }

    fn schema() -> FunctionSchema {
        FunctionSchema::new("grab", "Grab an object", json!({"type": "object"}))
    }

    #[tokio::test]
    async fn returns_text_on_stop() {
        let provider = Arc::new(ScriptedProvider::texts(["hello"]));
        let result = oracle(provider.clone()).process(&[ChatMessage::user("hi")], &[], false).await.unwrap();
        assert_eq!(result, Completion::Text("hello".into()));
        assert_eq!(provider.request_count(), 1);
    }

    #[tokio::test]
    async fn retries_malformed_arguments_until_valid() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(CompletionResponse::call("grab", "{broken")),
            Ok(CompletionResponse::call("grab", "[]")),
            Ok(CompletionResponse::call("grab", r#"{"object": "cup"}"#)),
        ]));
        let result = oracle(provider.clone()).process(&[ChatMessage::user("grab the cup")], &[schema()], true).await;
        let call = result.unwrap().into_call().unwrap();
        assert_eq!(call.name, "grab");
        assert_eq!(call.first_argument(), Some(&json!("cup")));
        assert_eq!(provider.request_count(), 3);
    }

    #[tokio::test]
    async fn exhausts_after_max_retries() {
        let provider = Arc::new(ScriptedProvider::new(
            (0..5).map(|_| Ok(CompletionResponse::call("grab", "not json"))).collect(),
        ));
        let result = oracle(provider.clone()).process(&[ChatMessage::user("grab")], &[schema()], true).await;
        assert!(matches!(result, Err(OracleError::Exhausted { attempts: 3, .. })));
        assert_eq!(provider.request_count(), 3);
    }

    #[tokio::test]
    async fn transport_failures_are_retried() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(LlmError::RateLimited),
            Err(LlmError::RequestFailed("502".into())),
            Ok(CompletionResponse::text("finally")),
        ]));
        let result = oracle(provider.clone()).process(&[ChatMessage::user("hi")], &[schema()], false).await;
        assert_eq!(result.unwrap(), Completion::Text("finally".into()));
        assert_eq!(provider.request_count(), 3);
    }

    #[tokio::test]
    async fn must_call_text_is_a_soft_failure() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(CompletionResponse::text("I would grab it")),
            Ok(CompletionResponse::call("grab", "{}")),
        ]));
        let result = oracle(provider.clone()).process(&[ChatMessage::user("grab")], &[schema()], true).await;
        assert!(matches!(result, Ok(Completion::Call(_))));
        assert_eq!(provider.request_count(), 2);
    }

    #[tokio::test]
    async fn must_call_without_schemas_falls_back_to_last_text() {
        let provider = Arc::new(ScriptedProvider::texts(["one", "two", "three"]));
        let result = oracle(provider.clone()).process(&[ChatMessage::user("x")], &[], true).await;
        assert_eq!(result.unwrap(), Completion::Text("three".into()));
        assert_eq!(provider.request_count(), 3);
    }

    #[tokio::test]
    async fn must_call_with_schemas_exhausts_on_text() {
        let provider = Arc::new(ScriptedProvider::texts(["one", "two", "three"]));
        let result = oracle(provider).process(&[ChatMessage::user("x")], &[schema()], true).await;
        assert!(matches!(result, Err(OracleError::Exhausted { .. })));
    }

    #[test]
    fn model_selection_by_size() {
        let cfg = RoboCfg { context_frame_tokens: 50, ..RoboCfg::default() };
        let oracle = Oracle::new(Arc::new(ScriptedProvider::default()), &cfg);
        let small = [ChatMessage::user("short")];
        assert_eq!(oracle.select_model(&small, &[]), "gpt-3.5-turbo-0613");
        let large = [ChatMessage::user("word ".repeat(100))];
        assert_eq!(oracle.select_model(&large, &[]), "gpt-3.5-turbo-16k");
    }

    #[tokio::test]
    async fn request_carries_selected_model_and_schemas() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(CompletionResponse::call("grab", "{}"))]));
        oracle(provider.clone()).process(&[ChatMessage::user("grab")], &[schema()], true).await.unwrap();
        let request = &provider.requests()[0];
        assert_eq!(request.model.as_deref(), Some("gpt-3.5-turbo-0613"));
        assert_eq!(request.functions.len(), 1);
        assert!(request.require_call);
    }
}
