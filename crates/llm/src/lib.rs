pub mod http;
pub mod provider;

pub use provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, FunctionCall,
    FunctionSchema, LlmError, LlmProvider, MockProvider, Role, ScriptedProvider,
};
