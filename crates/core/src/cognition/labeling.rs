//! Input segmentation, labelling and routing of operator input.

use robo_llm::provider::ChatMessage;

use super::orchestrator::Orchestrator;
use crate::io::Tone;
use crate::memory::{Advice, Conversation, Task};
use crate::oracle::Completion;
use crate::oracle::prompts::{LABEL_INPUT, SEGMENT_INPUT};
use crate::types::{AdviceLabel, ConversationType, TaskLabel, TaskStatus, Taxonomy, UserInputLabel};

const ABORTED: &str = "Aborted by operator";

/// What routing one labelled sentence did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEffect {
    TaskQueued,
    Answered(TaskStatus),
    AdviceRecorded,
    Memorized(TaskStatus),
    Aborted,
    Ignored,
}

/// Operator's answer to a pause-or-defer question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Pause,
    Defer,
}

impl Placement {
    fn parse(answer: &str) -> Option<Self> {
        match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" | "pause" => Some(Self::Pause),
            "n" | "no" | "defer" => Some(Self::Defer),
            _ => None,
        }
    }
}

impl Orchestrator {
    /// Classify `text` against taxonomy `T`. Unknown answers yield `None`.
    pub async fn label<T: Taxonomy>(&mut self, text: &str) -> Option<T> {
        let system = match self.prompts.load(LABEL_INPUT) {
            Ok(system) => system,
            Err(e) => {
                self.say(Tone::Error, format!("I failed to think of a label for your input: {e}")).await;
                return None;
            }
        };
        let mut conversation = Conversation::new(ConversationType::Labelling);
        conversation.push(ChatMessage::system(system));
        conversation.push(ChatMessage::user(T::prompt_content()));
        conversation.push(ChatMessage::assistant("OK, provide the text to be labelled"));
        conversation.push(ChatMessage::user(text));

        let label = match self.oracle.process(&conversation.chat_messages(), &[], false).await {
            Ok(Completion::Text(answer)) => {
                conversation.push(ChatMessage::assistant(answer.clone()));
                let label = T::from_name(&answer);
                if label.is_none() {
                    self.say(Tone::Error, format!("I assigned a bad label to your input: {}", answer.trim())).await;
                }
                label
            }
            Ok(Completion::Call(call)) => {
                self.say(Tone::Error, format!("I assigned a bad label to your input: {}", call.name)).await;
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "labelling failed");
                self.say(Tone::Error, format!("I failed to think of a label for your input: {text}")).await;
                None
            }
        };
        self.conversations.record(conversation);
        tracing::debug!(text, ?label, "labelled");
        label
    }

    /// Split raw operator input into sentences, label each one and route it.
    /// `None` when the input could not be segmented at all.
    pub async fn parse_user_input(&mut self, input: &str) -> Option<Vec<InputEffect>> {
        let system = match self.prompts.load(SEGMENT_INPUT) {
            Ok(system) => system,
            Err(e) => {
                self.say(Tone::Error, format!("I failed to parse user input: {e}")).await;
                return None;
            }
        };
        let mut conversation = Conversation::new(ConversationType::Labelling);
        conversation.push(ChatMessage::system(system));
        conversation.push(ChatMessage::user(input));

        let segmented = match self.oracle.process(&conversation.chat_messages(), &[], false).await {
            Ok(Completion::Text(content)) => {
                conversation.push(ChatMessage::assistant(content.clone()));
                Some(content)
            }
            _ => None,
        };
        self.conversations.record(conversation);
        let Some(content) = segmented else {
            self.say(Tone::Error, format!("I failed to parse user input: {input}")).await;
            return None;
        };

        let mut effects = Vec::new();
        for sentence in content.lines().map(str::trim).filter(|s| !s.is_empty()) {
            let label = self.label::<UserInputLabel>(sentence).await;
            effects.push(self.process_tagged_input(label, sentence).await);
        }
        Some(effects)
    }

    /// Route one labelled sentence.
    pub async fn process_tagged_input(&mut self, label: Option<UserInputLabel>, sentence: &str) -> InputEffect {
        let Some(label) = label else {
            self.say(Tone::Error, format!("I failed to label the input: {sentence}")).await;
            return InputEffect::Ignored;
        };
        match label {
            UserInputLabel::Task => {
                self.enqueue_task(Task::new(TaskLabel::UserInput, sentence)).await;
                InputEffect::TaskQueued
            }
            UserInputLabel::QuestionEnvKnowledge => {
                self.say(Tone::Info, "Let me recall from my own memory.").await;
                let status = self.recall(sentence).await;
                self.say_conclusion().await;
                InputEffect::Answered(status)
            }
            UserInputLabel::QuestionGenKnowledge => {
                self.say(Tone::Info, "Let me recall from my general knowledge.").await;
                let status = self.think(sentence).await;
                self.say_conclusion().await;
                InputEffect::Answered(status)
            }
            UserInputLabel::Methodology | UserInputLabel::Limitation => {
                let kind = if label == UserInputLabel::Methodology {
                    AdviceLabel::Methodology
                } else {
                    AdviceLabel::Limitation
                };
                self.advice.add(Advice::new(kind, sentence));
                self.say(Tone::Info, format!("I have acknowledged your advice: {sentence}.")).await;
                InputEffect::AdviceRecorded
            }
            UserInputLabel::ObjectInformation => {
                let status = self.memorize(sentence).await;
                self.say_conclusion().await;
                InputEffect::Memorized(status)
            }
            UserInputLabel::Abort => {
                self.abort_active().await;
                InputEffect::Aborted
            }
            UserInputLabel::Uncertain => {
                self.say(Tone::Info, format!("I don't know what to do with this input: {sentence}")).await;
                InputEffect::Ignored
            }
        }
    }

    /// Queue an operator task. When another task is running, the operator
    /// chooses between pausing it and deferring the new one beneath it.
    pub async fn enqueue_task(&mut self, task: Task) -> usize {
        let Some(running) = self.stack.in_progress_index() else {
            return self.stack.push(task);
        };
        let current_goal = self.stack.get(running).map(|t| t.goal.clone()).unwrap_or_default();
        self.say(Tone::Info, format!("Should I put the current task on hold: '{current_goal}'?")).await;

        let mut placement = None;
        for _ in 0..self.cfg.confirm_max_prompts {
            let Some(answer) = self.operator.ask("Your command (y/n): ").await else {
                break;
            };
            placement = Placement::parse(&answer);
            if placement.is_some() {
                break;
            }
            self.say(Tone::Error, "I don't understand your command.").await;
        }

        match placement {
            Some(Placement::Pause) => {
                self.stack.pause(running);
                let index = self.stack.push(task);
                self.stack.resume(index);
                tracing::info!(paused = %current_goal, "running task paused for new task");
                index
            }
            Some(Placement::Defer) => self.stack.defer_beneath(running, task),
            None => {
                tracing::warn!(goal = %task.goal, "no valid placement answer, deferring new task");
                self.say(Tone::Info, "I will finish the current task first.").await;
                self.stack.defer_beneath(running, task)
            }
        }
    }

    /// Fail the most recent open task on the operator's request.
    pub async fn abort_active(&mut self) -> bool {
        let Some(task) = self.stack.last_open_index().and_then(|i| self.stack.get_mut(i)) else {
            self.say(Tone::Info, "There is no task to abort.").await;
            return false;
        };
        task.complete(ABORTED, false);
        let goal = task.goal.clone();
        tracing::info!(%goal, "task aborted by operator");
        self.say(Tone::Info, format!("I have aborted the task: {goal}")).await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cognition::orchestrator::tests::{Harness, harness, text};
    use robo_llm::provider::LlmError;

    fn running(h: &mut Harness, goal: &str) {
        let index = h.orchestrator.stack.push(Task::new(TaskLabel::UserInput, goal));
        h.orchestrator.stack.resume(index);
    }

    fn goals(h: &Harness) -> Vec<(String, TaskStatus)> {
        h.orchestrator.stack.iter().map(|t| (t.goal.clone(), t.status)).collect()
    }

    #[tokio::test]
    async fn label_maps_exact_names() {
        let mut h = harness(vec![text(" TASK \n"), text("task")], &[]);
        assert_eq!(h.orchestrator.label::<UserInputLabel>("Pick up the cup.").await, Some(UserInputLabel::Task));
        assert_eq!(h.orchestrator.label::<UserInputLabel>("Pick up the cup.").await, None);
        assert!(h.transcript.contains(Tone::Error, "bad label"));
        assert_eq!(h.orchestrator.conversations.count_of(ConversationType::Labelling), 2);
    }

    #[tokio::test]
    async fn label_sends_taxonomy_then_text() {
        let mut h = harness(vec![text("COGNITION")], &[]);
        h.orchestrator.label::<TaskLabel>("Estimate the weight.").await;
        let request = &h.provider.requests()[0];
        assert_eq!(request.messages.len(), 4);
        assert!(request.messages[1].text().contains("COGNITION = "));
        assert_eq!(request.messages[3].text(), "Estimate the weight.");
    }

    #[tokio::test]
    async fn label_failure_yields_none() {
        let mut h = harness(vec![Err(LlmError::RateLimited), Err(LlmError::RateLimited), Err(LlmError::RateLimited)], &[]);
        assert_eq!(h.orchestrator.label::<UserInputLabel>("hmm").await, None);
        assert!(h.transcript.contains(Tone::Error, "failed to think of a label"));
    }

    #[tokio::test]
    async fn pause_answer_runs_new_task_above_old() {
        let mut h = harness(vec![], &["pause"]);
        running(&mut h, "old");
        h.orchestrator.enqueue_task(Task::new(TaskLabel::UserInput, "new")).await;
        assert_eq!(
            goals(&h),
            vec![(String::from("old"), TaskStatus::Paused), (String::from("new"), TaskStatus::InProgress)]
        );
    }

    #[tokio::test]
    async fn defer_answer_rotates_new_task_beneath() {
        let mut h = harness(vec![], &["n"]);
        running(&mut h, "old");
        h.orchestrator.enqueue_task(Task::new(TaskLabel::UserInput, "new")).await;
        assert_eq!(goals(&h), vec![(String::from("new"), TaskStatus::New), (String::from("old"), TaskStatus::InProgress)]);
    }

    #[tokio::test]
    async fn invalid_answers_reprompt_then_defer() {
        let mut h = harness(vec![], &["maybe", "later", "YES"]);
        running(&mut h, "old");
        h.orchestrator.enqueue_task(Task::new(TaskLabel::UserInput, "new")).await;
        assert_eq!(goals(&h)[1], (String::from("new"), TaskStatus::InProgress));
        assert_eq!(h.transcript.messages().iter().filter(|m| m.content == "I don't understand your command.").count(), 2);

        let mut h = harness(vec![], &["a", "b", "c", "y"]);
        running(&mut h, "old");
        h.orchestrator.enqueue_task(Task::new(TaskLabel::UserInput, "new")).await;
        assert_eq!(goals(&h), vec![(String::from("new"), TaskStatus::New), (String::from("old"), TaskStatus::InProgress)]);
        // The fourth line was never consumed.
        assert_eq!(h.orchestrator.operator.try_next().as_deref(), Some("y"));
    }

    #[tokio::test]
    async fn closed_input_defers() {
        let mut h = harness(vec![], &[]);
        running(&mut h, "old");
        h.orchestrator.enqueue_task(Task::new(TaskLabel::UserInput, "new")).await;
        assert_eq!(goals(&h)[0].0, "new");
    }

    #[tokio::test]
    async fn idle_stack_pushes_without_asking() {
        let mut h = harness(vec![], &["y"]);
        h.orchestrator.enqueue_task(Task::new(TaskLabel::UserInput, "only")).await;
        assert_eq!(h.orchestrator.stack.len(), 1);
        assert!(!h.transcript.contains(Tone::Question, "Your command"));
    }

    #[tokio::test]
    async fn advice_is_recorded() {
        let mut h = harness(vec![], &[]);
        let effect = h
            .orchestrator
            .process_tagged_input(Some(UserInputLabel::Limitation), "You cannot use the knife.")
            .await;
        assert_eq!(effect, InputEffect::AdviceRecorded);
        assert_eq!(h.orchestrator.advice.len(), 1);
        assert!(h.transcript.contains(Tone::Info, "acknowledged your advice"));
    }

    #[tokio::test]
    async fn uncertain_and_unlabelled_input_change_nothing() {
        let mut h = harness(vec![], &[]);
        assert_eq!(h.orchestrator.process_tagged_input(Some(UserInputLabel::Uncertain), "blah").await, InputEffect::Ignored);
        assert_eq!(h.orchestrator.process_tagged_input(None, "blah").await, InputEffect::Ignored);
        assert!(h.orchestrator.stack.is_empty());
        assert!(h.orchestrator.advice.is_empty());
    }

    #[tokio::test]
    async fn abort_fails_the_topmost_open_task() {
        let mut h = harness(vec![], &[]);
        running(&mut h, "cook");
        assert_eq!(h.orchestrator.process_tagged_input(Some(UserInputLabel::Abort), "stop").await, InputEffect::Aborted);
        let task = h.orchestrator.stack.peek().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.conclusion.as_deref(), Some(ABORTED));
        assert!(!h.orchestrator.abort_active().await);
    }

    #[tokio::test]
    async fn parse_segments_and_routes_each_sentence() {
        let mut h = harness(
            vec![
                text("Pick up the tomato.\n\nYou should use both hands."),
                text("TASK"),
                text("METHODOLOGY"),
            ],
            &[],
        );
        let effects = h.orchestrator.parse_user_input("Pick up the tomato, you should use both hands.").await;
        assert_eq!(effects, Some(vec![InputEffect::TaskQueued, InputEffect::AdviceRecorded]));
        assert_eq!(h.orchestrator.stack.peek().map(|t| t.goal.as_str()), Some("Pick up the tomato."));
        assert_eq!(h.provider.request_count(), 3);
    }

    #[tokio::test]
    async fn parse_without_completion_reports_error() {
        let mut h = harness(vec![Err(LlmError::RateLimited), Err(LlmError::RateLimited), Err(LlmError::RateLimited)], &[]);
        assert_eq!(h.orchestrator.parse_user_input("hello").await, None);
        assert!(h.transcript.contains(Tone::Error, "failed to parse user input"));
        assert!(h.orchestrator.stack.is_empty());
    }
}
