//! Recall, memorize and think episodes. Each one records its own COGNITION
//! activity on the task stack.

use robo_llm::provider::{ChatMessage, FunctionCall};
use serde_json::Value;

use super::functions::{self, CognitiveFunction, MEMORIZE_FUNCTIONS, RECALL_FUNCTIONS};
use super::orchestrator::Orchestrator;
use crate::memory::objects::UPDATE_FAILED;
use crate::memory::{Conversation, Task};
use crate::oracle::prompts::{MEMORIZE_OBJECT, QUESTION_ABOUT_CONTEXT};
use crate::oracle::{Completion, StructuredCall};
use crate::types::{ConversationType, TaskLabel, TaskStatus, Taxonomy, UserInputLabel};

const RECALL_FAILED: &str = "I have failed to recall the required information";

impl Orchestrator {
    /// Answer `text` from the robot's own memory.
    pub async fn recall(&mut self, text: &str) -> TaskStatus {
        let mut conversation = Conversation::new(ConversationType::Recalling);
        let result = self.recall_episode(text, &mut conversation).await;
        self.conversations.record(conversation);
        self.push_activity(text, result)
    }

    async fn recall_episode(&mut self, text: &str, conversation: &mut Conversation) -> Result<String, String> {
        let system = self.prompts.load(QUESTION_ABOUT_CONTEXT).map_err(|e| e.to_string())?;
        conversation.push(ChatMessage::system(system));
        conversation.push(ChatMessage::user(text));

        let offered = functions::schemas(RECALL_FUNCTIONS);
        let call = match self.oracle.process(&conversation.chat_messages(), &offered, true).await {
            Ok(Completion::Call(call)) => call,
            _ => return Err(RECALL_FAILED.into()),
        };
        let function = offered_function(&call, RECALL_FUNCTIONS)
            .map_err(|e| format!("I failed to execute the function for loading memory: {e}"))?;
        let loaded = self
            .run_loader(function, &call.arguments)
            .map_err(|e| format!("I failed to execute the function for loading memory: {e}"))?;
        record_call(conversation, &call, &loaded);

        match self.oracle.process(&conversation.chat_messages(), &[], false).await {
            Ok(Completion::Text(answer)) => {
                conversation.push(ChatMessage::assistant(answer.clone()));
                Ok(answer)
            }
            _ => Err(RECALL_FAILED.into()),
        }
    }

    /// Store the object knowledge contained in `text`.
    pub async fn memorize(&mut self, text: &str) -> TaskStatus {
        let mut conversation = Conversation::new(ConversationType::Memorizing);
        let result = self.memorize_episode(text, &mut conversation).await;
        self.conversations.record(conversation);
        self.push_activity(text, result)
    }

    async fn memorize_episode(&mut self, text: &str, conversation: &mut Conversation) -> Result<String, String> {
        let system = self.prompts.load(MEMORIZE_OBJECT).map_err(|e| e.to_string())?;
        conversation.push(ChatMessage::system(system));
        conversation.push(ChatMessage::user(self.load_environment_knowledge(&[])));
        conversation.push(ChatMessage::user(text));

        let offered = functions::schemas(MEMORIZE_FUNCTIONS);
        let call = match self.oracle.process(&conversation.chat_messages(), &offered, true).await {
            Ok(Completion::Call(call)) => call,
            _ => return Err(format!("I have failed to memorize this information: {text}")),
        };
        let function = offered_function(&call, MEMORIZE_FUNCTIONS)
            .map_err(|e| format!("I failed to execute the function for updating memory: {e}"))?;
        let response = self
            .run_loader(function, &call.arguments)
            .map_err(|e| format!("I failed to execute the function for updating memory: {e}"))?;
        record_call(conversation, &call, &response);

        if response == UPDATE_FAILED { Err(response) } else { Ok(response) }
    }

    /// Open-ended reasoning over `text` with no memory access.
    pub async fn think(&mut self, text: &str) -> TaskStatus {
        let mut conversation = Conversation::new(ConversationType::Chat);
        conversation.push(ChatMessage::user(text));
        let result = match self.oracle.process(&conversation.chat_messages(), &[], false).await {
            Ok(Completion::Text(answer)) => {
                conversation.push(ChatMessage::assistant(answer.clone()));
                Ok(answer)
            }
            _ => Err(format!("I have failed to think about your request '{text}'.")),
        };
        self.conversations.record(conversation);
        self.push_activity(text, result)
    }

    /// Run a function from the COGNITION subset. Failures come back as the
    /// reason string.
    pub(crate) async fn invoke_cognitive(&mut self, function: CognitiveFunction, call: &StructuredCall) -> Result<String, String> {
        match function {
            CognitiveFunction::Recall => {
                let text = first_text(call)?;
                let status = self.recall(&text).await;
                settled(status, self.last_conclusion())
            }
            CognitiveFunction::Think => {
                let text = first_text(call)?;
                let status = self.think(&text).await;
                settled(status, self.last_conclusion())
            }
            CognitiveFunction::ProcessComplexInput => {
                let Some(Value::Array(items)) = call.first_argument() else {
                    return Err("expected a list of sub-inputs".into());
                };
                let mut processed = 0;
                for item in items {
                    let phrase = item.get("phrase").and_then(Value::as_str).unwrap_or_default().trim().to_owned();
                    if phrase.is_empty() {
                        continue;
                    }
                    let label = item.get("label").and_then(Value::as_str).and_then(UserInputLabel::from_name);
                    self.process_tagged_input(label, &phrase).await;
                    processed += 1;
                }
                Ok(format!("I have processed {processed} sub-inputs."))
            }
            other => self.run_loader(other, &call.arguments),
        }
    }

    fn push_activity(&mut self, goal: &str, result: Result<String, String>) -> TaskStatus {
        let mut activity = Task::new(TaskLabel::Cognition, goal);
        activity.start();
        match result {
            Ok(answer) => activity.complete(answer, true),
            Err(reason) => {
                tracing::warn!(goal, %reason, "cognitive episode failed");
                activity.complete(reason, false);
            }
        }
        let status = activity.status;
        self.stack.push(activity);
        status
    }
}

/// The cognitive function named by `call`, if it was among those offered.
pub(crate) fn offered_function(call: &StructuredCall, offered: &[CognitiveFunction]) -> Result<CognitiveFunction, String> {
    CognitiveFunction::from_name(&call.name)
        .filter(|f| offered.contains(f))
        .ok_or_else(|| format!("`{}` is not an available function", call.name))
}

pub(crate) fn record_call(conversation: &mut Conversation, call: &StructuredCall, result: &str) {
    conversation.push(ChatMessage::function_call(FunctionCall::new(&call.name, call.arguments_json())));
    conversation.push(ChatMessage::function_result(&call.name, result));
}

fn first_text(call: &StructuredCall) -> Result<String, String> {
    call.first_argument()
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| format!("`{}` expects a text argument", call.name))
}

fn settled(status: TaskStatus, conclusion: String) -> Result<String, String> {
    if status == TaskStatus::Completed { Ok(conclusion) } else { Err(conclusion) }
}
