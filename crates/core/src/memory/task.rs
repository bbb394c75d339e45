use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::types::{TaskLabel, TaskStatus};

/// One goal on the task stack.
///
/// Mutated only through [`Task::start`], [`Task::pause`] and [`Task::complete`].
/// Elapsed time is accumulated per running segment, so repeated transitions
/// never count the same interval twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub label: TaskLabel,
    pub goal: String,
    pub status: TaskStatus,
    pub conclusion: Option<String>,
    /// Named conditions the task must satisfy; `false` entries are unmet.
    pub goal_predicates: BTreeMap<String, bool>,
    pub created_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub stop_time: Option<DateTime<Utc>>,
    accumulated_ms: i64,
    /// Start of the current running segment, `None` while not running.
    running_since: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(label: TaskLabel, goal: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label,
            goal: goal.into(),
            status: TaskStatus::New,
            conclusion: None,
            goal_predicates: BTreeMap::new(),
            created_at: Utc::now(),
            start_time: None,
            stop_time: None,
            accumulated_ms: 0,
            running_since: None,
        }
    }

    /// Start or resume the task. No-op if it is already running.
    pub fn start(&mut self) {
        if self.status == TaskStatus::InProgress {
            return;
        }
        let now = Utc::now();
        if self.start_time.is_none() {
            self.start_time = Some(now);
        }
        self.running_since = Some(now);
        self.status = TaskStatus::InProgress;
    }

    /// Suspend a running task. Tasks in any other status are left alone.
    pub fn pause(&mut self) {
        if self.status != TaskStatus::InProgress {
            return;
        }
        self.close_segment();
        self.status = TaskStatus::Paused;
    }

    /// Record the final verdict. Calling it again updates the verdict but
    /// adds no elapsed time.
    pub fn complete(&mut self, conclusion: impl Into<String>, success: bool) {
        if self.start_time.is_none() {
            self.start_time = Some(self.created_at);
        }
        self.close_segment();
        self.conclusion = Some(conclusion.into());
        self.status = if success { TaskStatus::Completed } else { TaskStatus::Failed };
    }

    /// Stop the running segment. `stop_time` moves only when a segment
    /// actually closes, or when it was never set.
    fn close_segment(&mut self) {
        let now = Utc::now();
        if let Some(since) = self.running_since.take() {
            self.accumulated_ms += (now - since).num_milliseconds().max(0);
            self.stop_time = Some(now);
        } else if self.stop_time.is_none() {
            self.stop_time = Some(now);
        }
    }

    /// Total time spent running, including the segment in progress.
    pub fn accumulated_duration(&self) -> chrono::Duration {
        let running = self
            .running_since
            .map(|since| (Utc::now() - since).num_milliseconds().max(0))
            .unwrap_or(0);
        chrono::Duration::milliseconds(self.accumulated_ms + running)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether any goal predicate is known to be unmet.
    pub fn has_unmet_predicates(&self) -> bool {
        self.goal_predicates.values().any(|met| !met)
    }

    /// When the task entered the activity log.
    pub fn logged_at(&self) -> DateTime<Utc> {
        self.start_time.unwrap_or(self.created_at)
    }

    /// Single activity-log entry for this task.
    pub fn context_line(&self) -> String {
        match self.label {
            TaskLabel::UserInput => format!("User: {}", self.goal),
            label => format!(
                "{label} Action: {}\nConclusion: {}\nStatus {}",
                self.goal,
                self.conclusion.as_deref().unwrap_or("None"),
                self.status,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_is_not_started() {
        let task = Task::new(TaskLabel::Navigation, "Go to the table.");
        assert_eq!(task.status, TaskStatus::New);
        assert!(task.start_time.is_none());
        assert_eq!(task.accumulated_duration(), chrono::Duration::zero());
    }

    #[test]
    fn start_is_idempotent_while_running() {
        let mut task = Task::new(TaskLabel::UserInput, "Pick up the tomato.");
        task.start();
        let first = task.start_time;
        task.start();
        assert_eq!(task.start_time, first);
        assert_eq!(task.status, TaskStatus::InProgress);
    }

    #[test]
    fn complete_twice_does_not_double_count() {
        let mut task = Task::new(TaskLabel::Cognition, "Recall the cup.");
        task.start();
        std::thread::sleep(std::time::Duration::from_millis(15));
        task.complete("The cup is red.", true);
        let after_first = task.accumulated_duration();
        std::thread::sleep(std::time::Duration::from_millis(15));
        task.complete("The cup is red.", true);
        assert_eq!(task.accumulated_duration(), after_first);
        assert!(after_first >= chrono::Duration::milliseconds(10));
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[test]
    fn second_complete_keeps_stop_time() {
        let mut task = Task::new(TaskLabel::Navigation, "Go to the fridge.");
        task.start();
        task.complete("Error: the fridge is blocked.", false);
        let stopped = task.stop_time;
        assert!(stopped.is_some());
        std::thread::sleep(std::time::Duration::from_millis(5));
        task.complete("I have moved to the fridge.", true);
        assert_eq!(task.stop_time, stopped);
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.conclusion.as_deref(), Some("I have moved to the fridge."));
    }

    #[test]
    fn completing_an_unstarted_task_sets_stop_time() {
        let mut task = Task::new(TaskLabel::Cognition, "Think.");
        task.complete("Done", true);
        assert!(task.stop_time.is_some());
        assert_eq!(task.start_time, Some(task.created_at));
    }

    #[test]
    fn pause_then_resume_accumulates_only_running_segments() {
        let mut task = Task::new(TaskLabel::UserInput, "Cut the tomato.");
        task.start();
        std::thread::sleep(std::time::Duration::from_millis(10));
        task.pause();
        let paused = task.accumulated_duration();
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(task.accumulated_duration(), paused);
        assert_eq!(task.status, TaskStatus::Paused);
        task.start();
        task.complete("Done", true);
        assert!(task.accumulated_duration() >= paused);
    }

    #[test]
    fn pause_ignores_non_running_tasks() {
        let mut task = Task::new(TaskLabel::UserInput, "Open the fridge.");
        task.pause();
        assert_eq!(task.status, TaskStatus::New);
        task.complete("Error: fridge missing", false);
        task.pause();
        assert_eq!(task.status, TaskStatus::Failed);
    }

    #[test]
    fn context_lines() {
        let user = Task::new(TaskLabel::UserInput, "Pick up the tomato.");
        assert_eq!(user.context_line(), "User: Pick up the tomato.");

        let mut nav = Task::new(TaskLabel::Navigation, "Go to the table.");
        nav.complete("I moved to the table.", true);
        assert_eq!(
            nav.context_line(),
            "NAVIGATION Action: Go to the table.\nConclusion: I moved to the table.\nStatus Completed"
        );
    }

    #[test]
    fn unmet_predicates() {
        let mut task = Task::new(TaskLabel::Manipulation, "Pick up the cup.");
        assert!(!task.has_unmet_predicates());
        task.goal_predicates.insert("holding cup".into(), false);
        assert!(task.has_unmet_predicates());
    }
}
