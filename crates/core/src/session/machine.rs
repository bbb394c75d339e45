use std::collections::VecDeque;
use std::fmt;

use crate::error::TransitionError;
use crate::types::TaskLabel;

const HISTORY_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    DecisionMaking,
    LoadingFunctionality,
    Communicating,
    Waiting,
    Manipulating,
    Perceiving,
    Reasoning,
    KeepingInMind,
    Evaluating,
    ErrorHandling,
    Memorizing,
    ShuttingDown,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        self == Self::ShuttingDown
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEvent {
    ProcessInput,
    Decide,
    Resume,
    Act,
    AskForAdvice,
    WaitForAdvice,
    Acknowledge,
    Troubleshoot,
    RetryAction,
    SelfReflect,
    Memorize,
    Sleep,
    Shutdown,
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Facts about the session that select among outgoing edges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Guards {
    /// An operator line is waiting to be routed.
    pub has_input: bool,
    /// A non-terminal task can be worked on.
    pub has_open_task: bool,
    /// The last input aborted a task.
    pub is_abort: bool,
    /// The decision could not be made; back off until the next tick.
    pub is_pause: bool,
    /// The operator must be talked to before work continues.
    pub is_dialogue: bool,
    /// The decision produced an executable sub-task.
    pub is_task: bool,
    /// The decision declared the subject task done.
    pub task_done: bool,
    /// The operator replied while the robot was waiting for advice.
    pub advice_received: bool,
    /// Type of the sub-task about to be executed.
    pub action: Option<TaskLabel>,
    /// The last physical action left a goal predicate unmet.
    pub goal_predicates_unsatisfied: bool,
    /// The session has been idle for the configured timeout.
    pub idle_timeout: bool,
}

/// Next state for `event` fired in `state`. Pure; the runtime owns side effects.
pub fn transition(state: SessionState, event: SessionEvent, g: &Guards) -> Result<SessionState, TransitionError> {
    use SessionEvent as E;
    use SessionState as S;

    let next = match (state, event) {
        (S::ShuttingDown, _) => None,
        (S::Idle, E::Shutdown) if g.idle_timeout && !g.has_input && !g.has_open_task => Some(S::ShuttingDown),
        (S::Idle, E::ProcessInput) => Some(if g.has_input || g.has_open_task { S::DecisionMaking } else { S::Idle }),

        (S::DecisionMaking, E::Decide) => Some(if g.is_abort {
            S::Memorizing
        } else if g.is_pause {
            S::Waiting
        } else if g.is_dialogue {
            S::Communicating
        } else if g.is_task {
            S::LoadingFunctionality
        } else {
            S::Evaluating
        }),
        (S::Waiting, E::Resume) => Some(S::DecisionMaking),
        (S::Waiting, E::AskForAdvice) => Some(S::Communicating),

        (S::LoadingFunctionality, E::Act) => match g.action {
            Some(TaskLabel::Manipulation | TaskLabel::Navigation) => Some(S::Manipulating),
            Some(TaskLabel::Perception) => Some(S::Perceiving),
            Some(_) => Some(S::Reasoning),
            None => None,
        },

        (S::Manipulating | S::Perceiving, E::Troubleshoot) if g.goal_predicates_unsatisfied => Some(S::ErrorHandling),
        (S::Manipulating | S::Perceiving | S::Reasoning, E::SelfReflect) => Some(S::Evaluating),
        (S::Reasoning | S::Communicating, E::Acknowledge) => Some(S::KeepingInMind),

        (S::ErrorHandling, E::RetryAction) => Some(S::DecisionMaking),
        (S::ErrorHandling, E::AskForAdvice) => Some(S::Communicating),
        (S::Communicating, E::WaitForAdvice) => {
            Some(if g.advice_received { S::DecisionMaking } else { S::Communicating })
        }

        (S::Evaluating, E::Decide) if g.has_open_task => Some(S::DecisionMaking),
        (S::KeepingInMind | S::Evaluating, E::Memorize) => Some(S::Memorizing),
        (S::Memorizing, E::Sleep) => Some(S::Idle),
        _ => None,
    };
    next.ok_or_else(|| TransitionError { from: state.to_string(), event: event.to_string() })
}

/// Current session state plus a bounded trail of the transitions taken.
#[derive(Debug)]
pub struct SessionMachine {
    state: SessionState,
    history: VecDeque<(SessionState, SessionEvent, SessionState)>,
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMachine {
    pub fn new() -> Self {
        Self { state: SessionState::Idle, history: VecDeque::with_capacity(HISTORY_LEN) }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn fire(&mut self, event: SessionEvent, guards: &Guards) -> Result<SessionState, TransitionError> {
        let next = transition(self.state, event, guards)?;
        tracing::debug!(from = %self.state, %event, to = %next, "session transition");
        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back((self.state, event, next));
        self.state = next;
        Ok(next)
    }

    /// Return to `Idle` after an illegal transition.
    pub fn recover(&mut self) {
        tracing::warn!(from = %self.state, "session machine reset to Idle");
        self.state = SessionState::Idle;
    }

    pub fn history(&self) -> impl Iterator<Item = &(SessionState, SessionEvent, SessionState)> {
        self.history.iter()
    }
}
