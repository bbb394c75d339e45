use std::sync::Arc;

use robo_llm::provider::LlmProvider;
use uuid::Uuid;

use super::decision::DecisionOutcome;
use crate::capability::CapabilityRegistry;
use crate::config::RoboCfg;
use crate::io::{Operator, OutputMessage, Tone};
use crate::memory::{AdviceBook, ConversationLog, ObjectMemory, TaskStack};
use crate::oracle::Oracle;
use crate::oracle::prompts::PromptStore;
use crate::types::TaskStatus;

/// What one control step did.
#[derive(Debug, Clone, PartialEq)]
pub enum StepReport {
    /// No open task on the stack.
    Idle,
    Stepped {
        task: Uuid,
        outcome: DecisionOutcome,
        /// Status of the acted sub-task, when the decision produced one.
        acted: Option<TaskStatus>,
    },
}

/// Session-scoped owner of the task stack, advice, conversation history and
/// object knowledge. Every mutation of that state goes through `&mut self`.
pub struct Orchestrator {
    pub(crate) cfg: Arc<RoboCfg>,
    pub(crate) oracle: Oracle,
    pub(crate) prompts: PromptStore,
    pub(crate) capabilities: CapabilityRegistry,
    pub(crate) operator: Box<dyn Operator>,
    pub(crate) stack: TaskStack,
    pub(crate) advice: AdviceBook,
    pub(crate) conversations: ConversationLog,
    pub(crate) objects: ObjectMemory,
}

impl Orchestrator {
    pub fn new(
        cfg: Arc<RoboCfg>,
        provider: Arc<dyn LlmProvider>,
        capabilities: CapabilityRegistry,
        operator: Box<dyn Operator>,
    ) -> Self {
        let prompts = match &cfg.prompt_dir {
            Some(dir) => PromptStore::with_dir(dir),
            None => PromptStore::builtin(),
        };
        let oracle = Oracle::new(provider, &cfg);
        Self {
            cfg,
            oracle,
            prompts,
            capabilities,
            operator,
            stack: TaskStack::new(),
            advice: AdviceBook::new(),
            conversations: ConversationLog::new(),
            objects: ObjectMemory::new(),
        }
    }

    pub fn cfg(&self) -> &RoboCfg {
        &self.cfg
    }

    pub fn stack(&self) -> &TaskStack {
        &self.stack
    }

    pub fn advice(&self) -> &AdviceBook {
        &self.advice
    }

    pub fn conversations(&self) -> &ConversationLog {
        &self.conversations
    }

    pub fn objects(&self) -> &ObjectMemory {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut ObjectMemory {
        &mut self.objects
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    pub fn operator_mut(&mut self) -> &mut dyn Operator {
        self.operator.as_mut()
    }

    pub(crate) async fn say(&mut self, tone: Tone, content: impl Into<String>) {
        self.operator.say(OutputMessage::new(tone, content)).await;
    }

    /// Surface the conclusion of the top task, colored by its status.
    pub(crate) async fn say_conclusion(&mut self) {
        let Some(task) = self.stack.peek() else { return };
        let tone = if task.status == TaskStatus::Completed { Tone::Success } else { Tone::Error };
        let conclusion = task.conclusion.clone().unwrap_or_default();
        self.say(tone, conclusion).await;
    }

    /// Conclusion of the top task, empty when there is none.
    pub(crate) fn last_conclusion(&self) -> String {
        self.stack.peek().and_then(|t| t.conclusion.clone()).unwrap_or_default()
    }

    /// Start the most recent open task, pausing any other running one.
    pub fn activate_next(&mut self) -> Option<usize> {
        let index = self.stack.last_open_index()?;
        self.stack.resume(index);
        Some(index)
    }

    /// Make the task with `id` the running one again, if it is still open.
    pub(crate) fn reactivate(&mut self, id: Uuid) {
        if let Some(index) = self.stack.position(id) {
            if self.stack.get(index).is_some_and(|t| !t.is_terminal()) {
                self.stack.resume(index);
            }
        }
    }

    pub(crate) async fn announce_decision(&mut self, subject_goal: &str, index: usize) {
        let Some(task) = self.stack.get(index) else { return };
        let decision = format!("Decision ({}): {}", task.label, task.goal);
        self.say(Tone::Detail, format!("Current Goal: {subject_goal}")).await;
        self.say(Tone::Detail, decision).await;
    }

    /// One control step: decide on the most recent open task and act on the
    /// sub-task the decision produced.
    pub async fn step(&mut self) -> StepReport {
        let Some(index) = self.activate_next() else {
            return StepReport::Idle;
        };
        let Some(task) = self.stack.get(index) else {
            return StepReport::Idle;
        };
        let (id, goal) = (task.id, task.goal.clone());
        tracing::debug!(task = %id, label = %task.label, %goal, "stepping");

        let outcome = self.decide(index).await;
        let acted = match &outcome {
            DecisionOutcome::SubTask { index, .. } => {
                self.announce_decision(&goal, *index).await;
                let status = self.act().await;
                self.reactivate(id);
                status
            }
            DecisionOutcome::Failed { .. } => {
                self.say(Tone::Error, "Error: Decision making failed. Retrying...").await;
                None
            }
            DecisionOutcome::Done => None,
        };
        tracing::debug!(task = %id, ?outcome, ?acted, "step finished");
        StepReport::Stepped { task: id, outcome, acted }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::capability::CapabilityKind;
    use crate::capability::tests::EchoProvider;
    use crate::io::ScriptedOperator;
    use crate::io::operator::Transcript;
    use crate::memory::Task;
    use crate::types::TaskLabel;
    use robo_llm::provider::{CompletionResponse, LlmError, ScriptedProvider};

    pub(crate) struct Harness {
        pub orchestrator: Orchestrator,
        pub provider: Arc<ScriptedProvider>,
        pub transcript: Transcript,
    }

    /// Orchestrator with scripted oracle answers, scripted operator lines and
    /// one echo provider per capability kind.
    pub(crate) fn harness(responses: Vec<Result<CompletionResponse, LlmError>>, lines: &[&str]) -> Harness {
        let provider = Arc::new(ScriptedProvider::new(responses));
        let operator = ScriptedOperator::new(lines.iter().copied());
        let transcript = operator.transcript();
        let registry = CapabilityRegistry::new(vec![
            Box::new(EchoProvider {
                name: "wheels",
                kind: CapabilityKind::Navigation,
                functions: vec!["move_to_object"],
                reply: "I have moved to the table.",
            }),
            Box::new(EchoProvider {
                name: "arm",
                kind: CapabilityKind::Manipulation,
                functions: vec!["pick_up_object", "explode"],
                reply: "Error: the object is out of reach.",
            }),
            Box::new(EchoProvider {
                name: "camera",
                kind: CapabilityKind::Vision,
                functions: vec!["look_around_for_object"],
                reply: "I see a tomato on the table.",
            }),
        ])
        .unwrap();
        let orchestrator = Orchestrator::new(Arc::new(RoboCfg::default()), provider.clone(), registry, Box::new(operator));
        Harness { orchestrator, provider, transcript }
    }

    pub(crate) fn text(content: &str) -> Result<CompletionResponse, LlmError> {
        Ok(CompletionResponse::text(content))
    }

    pub(crate) fn call(name: &str, arguments: &str) -> Result<CompletionResponse, LlmError> {
        Ok(CompletionResponse::call(name, arguments))
    }

    #[tokio::test]
    async fn step_on_empty_stack_is_idle() {
        let mut h = harness(vec![], &[]);
        assert_eq!(h.orchestrator.step().await, StepReport::Idle);
        assert_eq!(h.provider.request_count(), 0);
    }

    #[tokio::test]
    async fn step_decides_and_acts_on_navigation() {
        let mut h = harness(
            vec![
                text("Go to the table."),
                text("NAVIGATION"),
                call("move_to_object", r#"{"name": "table"}"#),
            ],
            &[],
        );
        h.orchestrator.stack.push(Task::new(TaskLabel::UserInput, "Bring me the tomato."));

        let report = h.orchestrator.step().await;
        let StepReport::Stepped { outcome, acted, .. } = report else { panic!("expected a step") };
        assert!(matches!(outcome, DecisionOutcome::SubTask { label: TaskLabel::Navigation, .. }));
        assert_eq!(acted, Some(TaskStatus::Completed));

        let stack = &h.orchestrator.stack;
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.get(0).map(|t| t.status), Some(TaskStatus::InProgress));
        assert_eq!(stack.peek().and_then(|t| t.conclusion.as_deref()), Some("I have moved to the table."));
        assert_eq!(stack.in_progress_count(), 1);
        assert!(h.transcript.contains(Tone::Detail, "Current Goal: Bring me the tomato."));
        assert!(h.transcript.contains(Tone::Detail, "Decision (NAVIGATION): Go to the table."));
    }

    #[tokio::test]
    async fn step_reports_failed_decision() {
        let mut h = harness(vec![Err(LlmError::RateLimited), Err(LlmError::RateLimited), Err(LlmError::RateLimited)], &[]);
        h.orchestrator.stack.push(Task::new(TaskLabel::UserInput, "Bring me the tomato."));

        let report = h.orchestrator.step().await;
        assert!(matches!(report, StepReport::Stepped { outcome: DecisionOutcome::Failed { .. }, acted: None, .. }));
        assert!(h.transcript.contains(Tone::Error, "Decision making failed"));
        // The subject task survives a failed decision.
        assert_eq!(h.orchestrator.stack.get(0).map(|t| t.status), Some(TaskStatus::InProgress));
    }

    #[tokio::test]
    async fn step_resumes_most_recent_open_task() {
        let mut h = harness(vec![text("DONE")], &[]);
        h.orchestrator.stack.push(Task::new(TaskLabel::UserInput, "older"));
        h.orchestrator.stack.resume(0);
        h.orchestrator.stack.push(Task::new(TaskLabel::UserInput, "newer"));

        h.orchestrator.step().await;
        let stack = &h.orchestrator.stack;
        assert_eq!(stack.get(0).map(|t| t.status), Some(TaskStatus::Paused));
        assert_eq!(stack.get(1).map(|t| t.status), Some(TaskStatus::Completed));
        assert_eq!(stack.in_progress_count(), 0);
    }
}
