//! Context loaders: the robot's memory rendered as oracle-readable text.

use chrono::Utc;
use serde_json::{Map, Value};

use super::functions::CognitiveFunction;
use super::orchestrator::Orchestrator;
use crate::capability::CapabilityKind;

impl Orchestrator {
    pub fn load_environment_knowledge(&self, attributes: &[String]) -> String {
        self.objects.describe(attributes)
    }

    /// Status of the providers of `components`, all providers when empty.
    pub fn load_body_status(&self, components: &[CapabilityKind]) -> String {
        let kinds = if components.is_empty() { CapabilityKind::ALL } else { components };
        let mut status = String::from("Current Robot State:\n");
        for line in self.capabilities.status_of(kinds) {
            status.push_str(&line);
            status.push('\n');
        }
        status
    }

    /// The `frame_size` most recent tasks logged within `time_span_secs`,
    /// oldest first. Negative spans fall back to the configured window, and a
    /// span reaching past the representable past covers every task.
    pub fn load_activity_logs(&self, time_span_secs: Option<i64>, frame_size: Option<usize>) -> String {
        let secs = time_span_secs.filter(|s| *s >= 0).unwrap_or(self.cfg.max_timespan_secs);
        let cutoff = chrono::Duration::try_seconds(secs).and_then(|span| Utc::now().checked_sub_signed(span));
        let frame = frame_size.unwrap_or(self.stack.len());

        let mut recent: Vec<String> = self
            .stack
            .iter()
            .rev()
            .filter(|t| cutoff.is_none_or(|cutoff| t.logged_at() >= cutoff))
            .take(frame)
            .map(|t| t.context_line())
            .collect();
        recent.reverse();

        let mut logs = String::from("Task History:\n");
        for line in recent {
            logs.push_str(&line);
            logs.push('\n');
        }
        logs
    }

    pub fn load_advice(&self) -> String {
        self.advice.render()
    }

    /// Run a synchronous memory function with its parsed arguments.
    pub(crate) fn run_loader(&mut self, function: CognitiveFunction, args: &Map<String, Value>) -> Result<String, String> {
        match function {
            CognitiveFunction::UpdateObject => self.objects.update(args).map(str::to_owned).map_err(|e| e.to_string()),
            CognitiveFunction::MemorizeObject => {
                self.objects.memorize(args).map(str::to_owned).map_err(|e| e.to_string())
            }
            CognitiveFunction::LoadEnvironmentKnowledge => {
                Ok(self.load_environment_knowledge(&string_list(args.values().next())))
            }
            CognitiveFunction::LoadBodyStatus => {
                let kinds: Vec<CapabilityKind> = string_list(args.values().next())
                    .iter()
                    .filter_map(|c| CapabilityKind::from_component(c))
                    .collect();
                Ok(self.load_body_status(&kinds))
            }
            CognitiveFunction::LoadActivityLogs => {
                let time_span = args.get("time_span").and_then(Value::as_i64);
                let frame_size = args.get("frame_size").and_then(Value::as_u64).map(|n| n as usize);
                Ok(self.load_activity_logs(time_span, frame_size))
            }
            other => Err(format!("`{}` is not a memory function", other.name())),
        }
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::to_owned).collect(),
        Some(Value::String(single)) => vec![single.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cognition::orchestrator::tests::{call, harness, text};
    use crate::memory::{Advice, Task};
    use crate::types::{AdviceLabel, TaskLabel, TaskStatus};
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn body_status_defaults_to_every_provider() {
        let h = harness(vec![], &[]);
        let all = h.orchestrator.load_body_status(&[]);
        assert!(all.starts_with("Current Robot State:\n"));
        assert!(all.contains("wheels ready") && all.contains("arm ready") && all.contains("camera ready"));

        let arm_only = h.orchestrator.load_body_status(&[CapabilityKind::Manipulation]);
        assert_eq!(arm_only, "Current Robot State:\narm ready\n");
    }

    #[test]
    fn activity_logs_respect_frame_size_and_order() {
        let mut h = harness(vec![], &[]);
        for goal in ["first", "second", "third"] {
            h.orchestrator.stack.push(Task::new(TaskLabel::UserInput, goal));
        }
        let logs = h.orchestrator.load_activity_logs(None, Some(2));
        assert_eq!(logs, "Task History:\nUser: second\nUser: third\n");
    }

    #[test]
    fn activity_logs_drop_tasks_outside_the_time_span() {
        let mut h = harness(vec![], &[]);
        let mut old = Task::new(TaskLabel::Navigation, "Go to the sink.");
        old.created_at = Utc::now() - chrono::Duration::seconds(600);
        h.orchestrator.stack.push(old);
        h.orchestrator.stack.push(Task::new(TaskLabel::UserInput, "Wash the cup."));

        let logs = h.orchestrator.load_activity_logs(None, None);
        assert!(!logs.contains("sink"));
        assert!(logs.contains("User: Wash the cup."));
        assert!(h.orchestrator.load_activity_logs(Some(3600), None).contains("NAVIGATION Action: Go to the sink."));
    }

    #[test]
    fn activity_logs_survive_out_of_range_spans() {
        let mut h = harness(vec![], &[]);
        let mut old = Task::new(TaskLabel::Navigation, "Go to the sink.");
        old.created_at = Utc::now() - chrono::Duration::seconds(600);
        h.orchestrator.stack.push(old);

        let o = &h.orchestrator;
        assert!(o.load_activity_logs(Some(i64::MAX), None).contains("Go to the sink."));
        assert!(o.load_activity_logs(Some(10_000_000_000_000), None).contains("Go to the sink."));
        // Negative spans use the configured window, which excludes the old task.
        assert_eq!(o.load_activity_logs(Some(-5), None), "Task History:\n");
        assert_eq!(o.load_activity_logs(Some(i64::MIN), None), "Task History:\n");
    }

    #[tokio::test]
    async fn recall_with_huge_time_span_does_not_panic() {
        let mut h = harness(
            vec![call("load_activity_logs", r#"{"time_span": 10000000000000}"#), text("You moved to the sink.")],
            &[],
        );
        h.orchestrator.stack.push(Task::new(TaskLabel::Navigation, "Go to the sink."));
        assert_eq!(h.orchestrator.recall("What did I do?").await, TaskStatus::Completed);
        let conclusion = h.orchestrator.stack.peek().and_then(|t| t.conclusion.clone());
        assert_eq!(conclusion.as_deref(), Some("You moved to the sink."));
    }

    #[test]
    fn advice_renders_both_sections() {
        let mut h = harness(vec![], &[]);
        h.orchestrator.advice.add(Advice::new(AdviceLabel::Limitation, "Do not touch the knife."));
        let advice = h.orchestrator.load_advice();
        assert!(advice.contains("No advice provided"));
        assert!(advice.contains("Limitations\nDo not touch the knife."));
    }

    #[test]
    fn run_loader_dispatches_memory_functions() {
        let mut h = harness(vec![], &[]);
        let o = &mut h.orchestrator;
        let memorized = o.run_loader(CognitiveFunction::MemorizeObject, &args(json!({"name": "tomato", "color": "red"})));
        assert_eq!(memorized.as_deref(), Ok("I have memorized this object."));

        let env = o.run_loader(CognitiveFunction::LoadEnvironmentKnowledge, &args(json!({"attributes": ["color"]})));
        assert!(env.unwrap().contains("red"));

        let body = o.run_loader(CognitiveFunction::LoadBodyStatus, &args(json!({"attributes": ["navigator"]})));
        assert_eq!(body.as_deref(), Ok("Current Robot State:\nwheels ready\n"));

        let missing = o.run_loader(CognitiveFunction::UpdateObject, &args(json!({"name": "plate"})));
        assert_eq!(missing.as_deref(), Ok("I have failed to update the knowledge of this object."));

        assert!(o.run_loader(CognitiveFunction::Think, &Map::new()).is_err());
    }
}
