use robo_llm::provider::ChatMessage;

use super::functions::{self, ACT_FUNCTIONS};
use super::orchestrator::Orchestrator;
use super::recall::{offered_function, record_call};
use crate::capability::CapabilityKind;
use crate::io::Tone;
use crate::memory::Conversation;
use crate::oracle::Completion;
use crate::oracle::prompts::{ACT, QUESTION_ABOUT_CONTEXT};
use crate::types::{ConversationType, TaskLabel, TaskStatus};

/// Marker that fails a task when it appears anywhere in its conclusion.
pub const ERROR_MARKER: &str = "Error";

const INQUIRY_INSTRUCTION: &str = "You must formulate a question based on the user input.";
const WRONG_ACTION: &str = "I have failed to choose the correct action.";

/// Predicate recorded on physical tasks once their action has run.
pub const ACTION_SUCCEEDED: &str = "action succeeded";

impl Orchestrator {
    /// Execute the top task and record its conclusion. `None` when the top
    /// of the stack holds no open task.
    pub async fn act(&mut self) -> Option<TaskStatus> {
        let index = self.stack.len().checked_sub(1)?;
        let task = self.stack.get(index).filter(|t| !t.is_terminal())?;
        let (id, label, goal) = (task.id, task.label, task.goal.clone());
        self.stack.resume(index);

        let mut conversation = Conversation::new(ConversationType::Acting);
        let outcome = match label {
            TaskLabel::Cognition => self.act_cognitive(&goal, &mut conversation).await,
            TaskLabel::Inquiry => self.act_inquiry(&goal, &mut conversation).await,
            TaskLabel::Perception => self.act_perception(&goal).await,
            TaskLabel::Navigation | TaskLabel::Manipulation | TaskLabel::UserInput => {
                self.act_physical(label, &goal, &mut conversation).await
            }
        };
        self.conversations.record(conversation);

        let conclusion = outcome.unwrap_or_else(|reason| format!("Error: {reason}"));
        let success = !conclusion.contains(ERROR_MARKER);
        let task = self.stack.position(id).and_then(|i| self.stack.get_mut(i))?;
        if matches!(label, TaskLabel::Navigation | TaskLabel::Manipulation) {
            task.goal_predicates.insert(ACTION_SUCCEEDED.to_owned(), success);
        }
        task.complete(conclusion, success);
        tracing::info!(%label, %goal, status = %task.status, "acted");
        Some(task.status)
    }

    async fn act_cognitive(&mut self, goal: &str, conversation: &mut Conversation) -> Result<String, String> {
        let system = self.prompts.load(QUESTION_ABOUT_CONTEXT).map_err(|e| e.to_string())?;
        conversation.push(ChatMessage::system(system));
        conversation.push(ChatMessage::user(goal));

        let offered = functions::schemas(ACT_FUNCTIONS);
        let call = match self.oracle.process(&conversation.chat_messages(), &offered, true).await {
            Ok(Completion::Call(call)) => call,
            _ => return Err(WRONG_ACTION.into()),
        };
        let function =
            offered_function(&call, ACT_FUNCTIONS).map_err(|e| format!("I failed to execute `{}` because: {e}", call.name))?;
        let response = self
            .invoke_cognitive(function, &call)
            .await
            .map_err(|e| format!("I failed to execute `{}` because: {e}", call.name))?;
        record_call(conversation, &call, &response);
        Ok(response)
    }

    async fn act_inquiry(&mut self, goal: &str, conversation: &mut Conversation) -> Result<String, String> {
        conversation.push(ChatMessage::system(INQUIRY_INSTRUCTION));
        conversation.push(ChatMessage::user(goal));
        match self.oracle.process(&conversation.chat_messages(), &[], false).await {
            Ok(Completion::Text(question)) => {
                conversation.push(ChatMessage::assistant(question.clone()));
                self.say(Tone::Question, question.clone()).await;
                Ok(question)
            }
            _ => Err(format!("I have failed to ask the user about '{goal}'.")),
        }
    }

    /// Perception runs a recall episode and keeps only its conclusion.
    async fn act_perception(&mut self, goal: &str) -> Result<String, String> {
        self.recall(goal).await;
        let record = self.stack.pop().ok_or_else(|| "recall left no record".to_owned())?;
        match (record.status, record.conclusion) {
            (TaskStatus::Completed, Some(conclusion)) => Ok(conclusion),
            (_, conclusion) => Err(conclusion.unwrap_or_else(|| "recall failed".into())),
        }
    }

    async fn act_physical(&mut self, label: TaskLabel, goal: &str, conversation: &mut Conversation) -> Result<String, String> {
        let kinds = match label {
            TaskLabel::Manipulation => [CapabilityKind::Manipulation, CapabilityKind::Vision],
            _ => [CapabilityKind::Navigation, CapabilityKind::Vision],
        };
        let offered = self.capabilities.schemas_for(&kinds);
        if offered.is_empty() {
            return Err(format!("no capability can perform {label} actions"));
        }

        let system = self.prompts.load(ACT).map_err(|e| e.to_string())?;
        conversation.push(ChatMessage::system(system));
        conversation.push(ChatMessage::user(self.load_environment_knowledge(&[])));
        conversation.push(ChatMessage::user(self.load_body_status(&[])));
        conversation.push(ChatMessage::user(goal));

        let call = match self.oracle.process(&conversation.chat_messages(), &offered, true).await {
            Ok(Completion::Call(call)) => call,
            _ => return Err(WRONG_ACTION.into()),
        };
        if !offered.iter().any(|s| s.name == call.name) {
            return Err(format!("I failed to execute `{}` because: it is not an available action", call.name));
        }
        let response = self
            .capabilities
            .invoke(&call.name, &call.arguments)
            .await
            .map_err(|e| format!("I failed to execute `{}` because: {e}", call.name))?;
        record_call(conversation, &call, &response);
        Ok(response)
    }
}
