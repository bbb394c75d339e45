use robo_llm::provider::ChatMessage;

use super::orchestrator::Orchestrator;
use crate::memory::{Conversation, Task};
use crate::oracle::Completion;
use crate::oracle::prompts::DECISION_MAKING;
use crate::types::{ConversationType, TaskLabel};

/// Marker the oracle answers with once a goal is reached.
pub const DONE_SENTINEL: &str = "DONE";

const DECIDING_GOAL: &str = "Deciding what to do next...";
const DECISION_FAILED: &str = "I have failed to make a decision.";
const CLASSIFY_FAILED: &str = "I have failed to classify my decision.";

#[derive(Debug, Clone, PartialEq)]
pub enum DecisionOutcome {
    /// The subject task was completed with conclusion `Done`.
    Done,
    /// A sub-task was pushed at `index`.
    SubTask { index: usize, label: TaskLabel },
    /// The decision itself failed; the subject task is untouched.
    Failed { reason: String },
}

impl Orchestrator {
    /// Ask the oracle for the next step of the task at `index`.
    ///
    /// Each attempt is recorded as its own COGNITION activity on the stack,
    /// so the stack explains why a sub-task exists or why none was created.
    pub async fn decide(&mut self, index: usize) -> DecisionOutcome {
        let Some(subject) = self.stack.get(index) else {
            return DecisionOutcome::Failed { reason: format!("no task at index {index}") };
        };
        let subject_id = subject.id;
        let goal = subject.goal.clone();

        let mut activity = Task::new(TaskLabel::Cognition, DECIDING_GOAL);
        activity.start();
        let mut conversation = Conversation::new(ConversationType::Deciding);
        let answer = self.deliberate(&goal, &mut conversation).await;
        self.conversations.record(conversation);

        let outcome = match answer {
            Err(reason) => {
                activity.complete(reason.clone(), false);
                DecisionOutcome::Failed { reason }
            }
            Ok(text) if text.contains(DONE_SENTINEL) => {
                if let Some(task) = self.stack.position(subject_id).and_then(|i| self.stack.get_mut(i)) {
                    task.complete("Done", true);
                }
                activity.complete(format!("The task {goal} is complete"), true);
                DecisionOutcome::Done
            }
            Ok(text) => match self.label::<TaskLabel>(&text).await {
                Some(label) => {
                    activity.complete(format!("Decision: {text}"), true);
                    self.stack.push(activity);
                    let index = self.stack.push(Task::new(label, text.trim()));
                    tracing::info!(%label, goal = %text.trim(), "sub-task decided");
                    return DecisionOutcome::SubTask { index, label };
                }
                None => {
                    activity.complete(CLASSIFY_FAILED, false);
                    DecisionOutcome::Failed { reason: CLASSIFY_FAILED.into() }
                }
            },
        };

        tracing::info!(goal = %goal, ?outcome, "decision made");
        self.stack.push(activity);
        outcome
    }

    async fn deliberate(&mut self, goal: &str, conversation: &mut Conversation) -> Result<String, String> {
        let system = self.prompts.load(DECISION_MAKING).map_err(|e| {
            tracing::warn!(error = %e, "decision prompt unavailable");
            DECISION_FAILED.to_owned()
        })?;
        conversation.push(ChatMessage::system(system));
        conversation.push(ChatMessage::user(self.load_activity_logs(None, None)));
        conversation.push(ChatMessage::user(self.load_body_status(&[])));
        conversation.push(ChatMessage::user(self.load_advice()));
        conversation.push(ChatMessage::user(format!("Your current goal: {goal}")));

        match self.oracle.process(&conversation.chat_messages(), &[], false).await {
            Ok(Completion::Text(text)) => {
                conversation.push(ChatMessage::assistant(text.clone()));
                Ok(text)
            }
            Ok(Completion::Call(call)) => {
                tracing::warn!(function = %call.name, "unexpected function call while deciding");
                Err(DECISION_FAILED.into())
            }
            Err(e) => {
                tracing::warn!(error = %e, "no decision completion");
                Err(DECISION_FAILED.into())
            }
        }
    }
}
