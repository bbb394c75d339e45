use std::collections::HashMap;
use std::sync::Arc;

use robo_llm::provider::LlmProvider;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::loop_control::{self, IdleClock, TickMode};
use super::shutdown::ShutdownGuard;
use crate::capability::CapabilityRegistry;
use crate::cognition::{DecisionOutcome, InputEffect, Orchestrator};
use crate::config::RoboCfg;
use crate::error::TransitionError;
use crate::io::input::{self, InputSender};
use crate::io::output::{self, OutputReceiver};
use crate::io::{ChannelOperator, Tone};
use crate::session::{Guards, SessionEvent, SessionMachine, SessionState};
use crate::types::{ConversationType, TaskLabel, TaskStatus};

const CHANNEL_BUFFER: usize = 64;

const HELP: &str = "Commands:
  /tasks          show the task stack
  /objects        show remembered objects
  /advice         show recorded advice
  /conversations  count recorded conversations
  /quit           end the session
Anything else is sent to the robot.";

/// Drives the session machine one tick at a time. Each state handler does
/// its side effects through the orchestrator and then fires the event that
/// leaves the state.
pub struct Runtime {
    cfg: Arc<RoboCfg>,
    orchestrator: Orchestrator,
    machine: SessionMachine,
    shutdown: ShutdownGuard,
    idle: IdleClock,
    tick_count: u64,
    mode: TickMode,
    /// Operator line waiting to be routed.
    pending: Option<String>,
    /// A question is out to the operator; open tasks wait for the reply.
    awaiting_reply: bool,
    /// The current Communicating visit already spoke.
    communicated: bool,
    /// Task the last decision was about.
    subject: Option<Uuid>,
    /// Label of the sub-task about to be executed.
    action: Option<TaskLabel>,
    /// Failed attempts per subject task since its last successful decision.
    troubleshoot: HashMap<Uuid, u32>,
}

impl Runtime {
    pub fn new(cfg: Arc<RoboCfg>, orchestrator: Orchestrator) -> Self {
        let idle = IdleClock::new(cfg.idle_timeout_secs);
        Self {
            cfg,
            orchestrator,
            machine: SessionMachine::new(),
            shutdown: ShutdownGuard::new(),
            idle,
            tick_count: 0,
            mode: TickMode::Normal,
            pending: None,
            awaiting_reply: false,
            communicated: false,
            subject: None,
            action: None,
            troubleshoot: HashMap::new(),
        }
    }

    /// Runtime talking to its operator over a fresh pair of channels.
    pub fn with_channels(
        cfg: Arc<RoboCfg>,
        provider: Arc<dyn LlmProvider>,
        capabilities: CapabilityRegistry,
    ) -> (Self, InputSender, OutputReceiver) {
        let (input_tx, input_rx) = input::channel(CHANNEL_BUFFER);
        let (output_tx, output_rx) = output::channel(CHANNEL_BUFFER);
        let operator = ChannelOperator::new(input_rx, output_tx);
        let orchestrator = Orchestrator::new(cfg.clone(), provider, capabilities, Box::new(operator));
        (Self::new(cfg, orchestrator), input_tx, output_rx)
    }

    /// Returns the cancellation token for spawning child tasks.
    pub fn token(&self) -> CancellationToken {
        self.shutdown.token()
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator {
        &mut self.orchestrator
    }

    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    pub fn machine(&self) -> &SessionMachine {
        &self.machine
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Main loop. Returns once the session shuts down or the token is cancelled.
    pub async fn run(&mut self) {
        self.shutdown.spawn_signal_listener();
        let token = self.shutdown.token();

        tracing::info!(functions = ?self.orchestrator.capabilities().function_names(), "robo session started");

        loop {
            let interval = self.mode.interval(&self.cfg);

            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!(tick_count = self.tick_count, "shutdown signal received, exiting session loop");
                    break;
                },
                _ = tokio::time::sleep(interval) => {
                    self.tick().await;
                    if self.machine.is_terminal() {
                        self.shutdown.trigger("session reached its terminal state");
                        break;
                    }
                },
            }
        }

        self.orchestrator.say(Tone::Info, "Shutting down.").await;
        tracing::info!(
            tasks = self.orchestrator.stack().len(),
            open = self.orchestrator.stack().open_count(),
            conversations = self.orchestrator.conversations().len(),
            "robo session stopped"
        );
    }

    /// Advance the machine until a handler ends the tick or the transition
    /// budget runs out.
    pub async fn tick(&mut self) {
        self.tick_count += 1;
        let span = tracing::info_span!("tick", n = self.tick_count, state = %self.machine.state());
        let budget = self.cfg.max_transitions_per_tick.max(1);

        async {
            for _ in 0..budget {
                match self.advance().await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "illegal session transition");
                        self.machine.recover();
                        break;
                    }
                }
            }
        }
        .instrument(span)
        .await;

        self.mode = loop_control::next_mode(self.machine.state(), self.has_runnable_task());
    }

    /// Run the handler of the current state. `Ok(false)` ends the tick.
    async fn advance(&mut self) -> Result<bool, TransitionError> {
        use SessionEvent as E;
        use SessionState as S;

        match self.machine.state() {
            S::Idle => self.on_idle().await,
            S::DecisionMaking => self.on_decision_making().await,
            S::Waiting => self.fire(E::Resume, &Guards::default()),
            S::LoadingFunctionality => {
                let guards = Guards { action: self.action, ..Guards::default() };
                self.fire(E::Act, &guards)
            }
            S::Manipulating | S::Perceiving | S::Reasoning => self.on_acting().await,
            S::ErrorHandling => self.on_error_handling().await,
            S::Communicating => self.on_communicating().await,
            S::KeepingInMind => self.fire(E::Memorize, &Guards::default()),
            S::Evaluating => {
                let guards = Guards { has_open_task: self.has_runnable_task(), ..Guards::default() };
                let event = if guards.has_open_task { E::Decide } else { E::Memorize };
                self.fire(event, &guards)
            }
            S::Memorizing => {
                self.consolidate();
                self.fire(E::Sleep, &Guards::default())?;
                Ok(false)
            }
            S::ShuttingDown => Ok(false),
        }
    }

    fn fire(&mut self, event: SessionEvent, guards: &Guards) -> Result<bool, TransitionError> {
        self.machine.fire(event, guards)?;
        Ok(true)
    }

    fn has_runnable_task(&self) -> bool {
        !self.awaiting_reply && self.orchestrator.stack().has_open_tasks()
    }

    async fn on_idle(&mut self) -> Result<bool, TransitionError> {
        self.poll_input().await;
        let closed = self.orchestrator.operator_mut().is_closed();
        let guards = Guards {
            has_input: self.pending.is_some(),
            has_open_task: self.has_runnable_task(),
            idle_timeout: self.idle.timed_out() || closed,
            ..Guards::default()
        };

        if guards.has_input || guards.has_open_task {
            return self.fire(SessionEvent::ProcessInput, &guards);
        }
        if guards.idle_timeout {
            tracing::info!(idle_secs = self.idle.idle_for().as_secs(), closed, "nothing left to do");
            self.fire(SessionEvent::Shutdown, &guards)?;
        }
        Ok(false)
    }

    async fn on_decision_making(&mut self) -> Result<bool, TransitionError> {
        self.idle.touch();
        self.poll_input().await;

        let mut guards = Guards::default();
        let mut routed = false;
        if let Some(line) = self.pending.take() {
            self.awaiting_reply = false;
            routed = true;
            let effects = self.orchestrator.parse_user_input(&line).await.unwrap_or_default();
            tracing::debug!(?effects, "operator input routed");
            guards.is_abort = effects.contains(&InputEffect::Aborted);
        }

        if !guards.is_abort {
            if self.has_runnable_task() {
                self.decide_next(&mut guards).await;
            } else if routed {
                guards.is_dialogue = true;
            } else {
                guards.task_done = true;
            }
        }

        let next = self.machine.fire(SessionEvent::Decide, &guards)?;
        // Waiting holds until the next tick so the backoff interval applies.
        Ok(next != SessionState::Waiting)
    }

    async fn decide_next(&mut self, guards: &mut Guards) {
        let Some(index) = self.orchestrator.activate_next() else {
            guards.task_done = true;
            return;
        };
        let Some(task) = self.orchestrator.stack().get(index) else {
            guards.task_done = true;
            return;
        };
        let (id, goal) = (task.id, task.goal.clone());
        self.subject = Some(id);

        match self.orchestrator.decide(index).await {
            DecisionOutcome::Done => {
                self.troubleshoot.remove(&id);
                guards.task_done = true;
            }
            DecisionOutcome::SubTask { index, label } => {
                self.orchestrator.announce_decision(&goal, index).await;
                if label == TaskLabel::Inquiry {
                    guards.is_dialogue = true;
                } else {
                    self.action = Some(label);
                    guards.is_task = true;
                }
            }
            DecisionOutcome::Failed { reason } => {
                tracing::warn!(task = %id, %reason, "decision failed, backing off");
                self.orchestrator.say(Tone::Error, "Error: Decision making failed. Retrying...").await;
                guards.is_pause = true;
            }
        }
    }

    async fn on_acting(&mut self) -> Result<bool, TransitionError> {
        let state = self.machine.state();
        let status = self.orchestrator.act().await;
        if let Some(id) = self.subject {
            self.orchestrator.reactivate(id);
        }
        let unmet = status != Some(TaskStatus::Completed);

        match state {
            SessionState::Manipulating | SessionState::Perceiving if unmet => {
                let guards = Guards { goal_predicates_unsatisfied: true, ..Guards::default() };
                self.fire(SessionEvent::Troubleshoot, &guards)
            }
            SessionState::Reasoning => self.fire(SessionEvent::Acknowledge, &Guards::default()),
            _ => self.fire(SessionEvent::SelfReflect, &Guards::default()),
        }
    }

    async fn on_error_handling(&mut self) -> Result<bool, TransitionError> {
        let Some(id) = self.subject else {
            return self.fire(SessionEvent::RetryAction, &Guards::default());
        };
        let attempts = self.troubleshoot.entry(id).or_insert(0);
        *attempts += 1;
        let attempts = *attempts;

        if attempts <= self.cfg.max_troubleshoot_attempts {
            tracing::info!(task = %id, attempts, "action failed, deciding again");
            return self.fire(SessionEvent::RetryAction, &Guards::default());
        }

        self.troubleshoot.remove(&id);
        let goal = self
            .orchestrator
            .stack()
            .position(id)
            .and_then(|i| self.orchestrator.stack().get(i))
            .map(|t| t.goal.clone())
            .unwrap_or_default();
        tracing::warn!(task = %id, attempts, "giving up, asking the operator");
        self.orchestrator.say(Tone::Question, format!("I could not complete '{goal}'. How should I proceed?")).await;
        self.awaiting_reply = true;
        self.communicated = true;
        self.fire(SessionEvent::AskForAdvice, &Guards::default())
    }

    async fn on_communicating(&mut self) -> Result<bool, TransitionError> {
        if !self.communicated {
            self.communicated = true;
            let inquiry = self
                .orchestrator
                .stack()
                .peek()
                .is_some_and(|t| t.label == TaskLabel::Inquiry && !t.is_terminal());
            if inquiry {
                let status = self.orchestrator.act().await;
                if let Some(id) = self.subject {
                    self.orchestrator.reactivate(id);
                }
                self.awaiting_reply = status == Some(TaskStatus::Completed);
            }
        }

        if self.awaiting_reply {
            self.poll_input().await;
            if self.pending.is_none() && self.orchestrator.operator_mut().is_closed() {
                tracing::warn!("operator input closed while waiting for a reply");
                self.awaiting_reply = false;
            }
        }

        if !self.awaiting_reply {
            self.communicated = false;
            return self.fire(SessionEvent::Acknowledge, &Guards::default());
        }

        let guards = Guards { advice_received: self.pending.is_some(), ..Guards::default() };
        let next = self.machine.fire(SessionEvent::WaitForAdvice, &guards)?;
        if next == SessionState::Communicating {
            return Ok(false);
        }
        self.communicated = false;
        Ok(true)
    }

    fn consolidate(&mut self) {
        let stack = self.orchestrator.stack();
        let open: Vec<Uuid> = stack.iter().filter(|t| !t.is_terminal()).map(|t| t.id).collect();
        self.troubleshoot.retain(|id, _| open.contains(id));
        tracing::info!(
            tasks = stack.len(),
            open = open.len(),
            objects = self.orchestrator.objects().len(),
            advice = self.orchestrator.advice().len(),
            conversations = self.orchestrator.conversations().len(),
            "session memory consolidated"
        );
    }

    /// Move the next operator line into `pending`, running slash commands on the way.
    async fn poll_input(&mut self) {
        while self.pending.is_none() {
            let Some(line) = self.orchestrator.operator_mut().try_next() else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.idle.touch();
            if line.starts_with('/') {
                let command = line.to_owned();
                self.run_command(&command).await;
                continue;
            }
            self.pending = Some(line.to_owned());
        }
    }

    async fn run_command(&mut self, line: &str) {
        let command = line.split_whitespace().next().unwrap_or(line);
        let reply = match command {
            "/tasks" => self.render_tasks(),
            "/objects" => self.orchestrator.load_environment_knowledge(&[]),
            "/advice" => self.orchestrator.load_advice(),
            "/conversations" => self.render_conversations(),
            "/help" => HELP.to_owned(),
            "/quit" => {
                self.shutdown.trigger("operator quit");
                return;
            }
            other => {
                self.orchestrator.say(Tone::Error, format!("Unknown command: {other}. Type /help.")).await;
                return;
            }
        };
        self.orchestrator.say(Tone::Detail, reply).await;
    }

    fn render_tasks(&self) -> String {
        let stack = self.orchestrator.stack();
        if stack.is_empty() {
            return "No tasks.".into();
        }
        let mut out = String::from("Tasks (oldest first):\n");
        for (i, task) in stack.iter().enumerate() {
            out.push_str(&format!("{i}. [{}] {}: {}", task.status, task.label, task.goal));
            if let Some(conclusion) = &task.conclusion {
                out.push_str(&format!(" -> {conclusion}"));
            }
            out.push('\n');
        }
        out
    }

    fn render_conversations(&self) -> String {
        let log = self.orchestrator.conversations();
        let kinds = [
            ConversationType::Chat,
            ConversationType::Labelling,
            ConversationType::Recalling,
            ConversationType::Deciding,
            ConversationType::Memorizing,
            ConversationType::Acting,
        ];
        let counts: Vec<String> = kinds.iter().map(|k| format!("{k:?}: {}", log.count_of(*k))).collect();
        format!("Conversations ({}): {}", log.len(), counts.join(", "))
    }
}
