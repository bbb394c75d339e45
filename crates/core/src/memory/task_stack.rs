use uuid::Uuid;

use super::task::Task;
use crate::types::TaskStatus;

/// Nested goals, most recent last. Terminal tasks stay on the stack as history.
///
/// At most one task is `InProgress` at any time: [`TaskStack::resume`] pauses
/// every other running task before starting its target.
#[derive(Debug, Default)]
pub struct TaskStack {
    tasks: Vec<Task>,
}

impl TaskStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a task and return its index.
    pub fn push(&mut self, task: Task) -> usize {
        self.tasks.push(task);
        self.tasks.len() - 1
    }

    pub fn pop(&mut self) -> Option<Task> {
        self.tasks.pop()
    }

    pub fn peek(&self) -> Option<&Task> {
        self.tasks.last()
    }

    pub fn get(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Task> {
        self.tasks.get_mut(index)
    }

    /// Pause the task at `index`. Returns false if there is no such task.
    pub fn pause(&mut self, index: usize) -> bool {
        match self.tasks.get_mut(index) {
            Some(task) => {
                task.pause();
                true
            }
            None => false,
        }
    }

    /// Make the task at `index` the single running task.
    pub fn resume(&mut self, index: usize) -> bool {
        if index >= self.tasks.len() {
            return false;
        }
        for (i, task) in self.tasks.iter_mut().enumerate() {
            if i != index && task.status == TaskStatus::InProgress {
                task.pause();
            }
        }
        self.tasks[index].start();
        true
    }

    /// Place `task` directly beneath the task at `index`, which keeps its
    /// position above the new one. For the top task this is the rotation
    /// pop current, push new, push current back. Returns the new task's index.
    pub fn defer_beneath(&mut self, index: usize, task: Task) -> usize {
        let index = index.min(self.tasks.len());
        self.tasks.insert(index, task);
        index
    }

    pub fn position(&self, id: Uuid) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    /// Most recent task that is neither completed nor failed.
    pub fn last_open_index(&self) -> Option<usize> {
        self.tasks.iter().rposition(|t| !t.is_terminal())
    }

    /// Index of the running task, if any.
    pub fn in_progress_index(&self) -> Option<usize> {
        self.tasks.iter().position(|t| t.status == TaskStatus::InProgress)
    }

    pub fn in_progress_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.status == TaskStatus::InProgress).count()
    }

    pub fn open_count(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_terminal()).count()
    }

    pub fn has_open_tasks(&self) -> bool {
        self.last_open_index().is_some()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskLabel;

    fn user_task(goal: &str) -> Task {
        Task::new(TaskLabel::UserInput, goal)
    }

    #[test]
    fn push_pop_peek() {
        let mut stack = TaskStack::new();
        assert!(stack.peek().is_none());
        assert_eq!(stack.push(user_task("a")), 0);
        assert_eq!(stack.push(user_task("b")), 1);
        assert_eq!(stack.peek().map(|t| t.goal.as_str()), Some("b"));
        assert_eq!(stack.pop().map(|t| t.goal), Some("b".to_string()));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn resume_keeps_a_single_task_running() {
        let mut stack = TaskStack::new();
        stack.push(user_task("a"));
        stack.push(user_task("b"));
        stack.push(user_task("c"));

        assert!(stack.resume(0));
        assert!(stack.resume(2));
        assert!(stack.resume(1));
        assert_eq!(stack.in_progress_count(), 1);
        assert_eq!(stack.in_progress_index(), Some(1));
        assert_eq!(stack.get(0).map(|t| t.status), Some(TaskStatus::Paused));
        assert_eq!(stack.get(2).map(|t| t.status), Some(TaskStatus::Paused));
        assert!(!stack.resume(7));
    }

    #[test]
    fn defer_beneath_top_rotates() {
        let mut stack = TaskStack::new();
        stack.push(user_task("base"));
        stack.push(user_task("current"));
        stack.resume(1);

        let index = stack.defer_beneath(1, user_task("new"));
        assert_eq!(index, 1);
        let goals: Vec<_> = stack.iter().map(|t| t.goal.as_str()).collect();
        assert_eq!(goals, ["base", "new", "current"]);
        assert_eq!(stack.peek().map(|t| t.status), Some(TaskStatus::InProgress));
    }

    #[test]
    fn defer_beneath_buried_task_keeps_history_above() {
        let mut stack = TaskStack::new();
        stack.push(user_task("current"));
        let mut record = Task::new(TaskLabel::Cognition, "Deciding what to do next...");
        record.complete("Decision: Go to the table.", true);
        stack.push(record);

        stack.defer_beneath(0, user_task("new"));
        let goals: Vec<_> = stack.iter().map(|t| t.goal.as_str()).collect();
        assert_eq!(goals, ["new", "current", "Deciding what to do next..."]);
    }

    #[test]
    fn defer_on_empty_stack_pushes() {
        let mut stack = TaskStack::new();
        assert_eq!(stack.defer_beneath(0, user_task("only")), 0);
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn position_by_id() {
        let mut stack = TaskStack::new();
        let task = user_task("find me");
        let id = task.id;
        stack.push(user_task("other"));
        stack.push(task);
        assert_eq!(stack.position(id), Some(1));
        assert_eq!(stack.position(Uuid::new_v4()), None);
    }

    #[test]
    fn last_open_skips_terminal_tasks() {
        let mut stack = TaskStack::new();
        stack.push(user_task("open"));
        let mut done = user_task("done");
        done.complete("Done", true);
        stack.push(done);
        let mut failed = user_task("failed");
        failed.complete("Error: nope", false);
        stack.push(failed);

        assert_eq!(stack.last_open_index(), Some(0));
        assert_eq!(stack.open_count(), 1);
        assert!(stack.has_open_tasks());
    }

    #[test]
    fn pause_out_of_range() {
        let mut stack = TaskStack::new();
        assert!(!stack.pause(0));
    }
}
