use std::time::{Duration, Instant};

use crate::config::RoboCfg;
use crate::session::SessionState;

/// Tick frequency mode based on session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickMode {
    /// Work is queued; tick again right away.
    Busy,
    Normal,
    /// A decision just failed; give the oracle time to recover.
    Backoff,
}

impl TickMode {
    pub fn interval(self, cfg: &RoboCfg) -> Duration {
        match self {
            Self::Busy => Duration::ZERO,
            Self::Normal => Duration::from_millis(cfg.tick_ms),
            Self::Backoff => Duration::from_millis(cfg.backoff_ms),
        }
    }
}

/// Determines the next tick mode from where the session stopped.
pub fn next_mode(state: SessionState, has_runnable_task: bool) -> TickMode {
    match state {
        SessionState::Waiting => TickMode::Backoff,
        SessionState::Idle if has_runnable_task => TickMode::Busy,
        _ => TickMode::Normal,
    }
}

/// Tracks how long the session has gone without input or work.
#[derive(Debug)]
pub struct IdleClock {
    last_activity: Instant,
    limit: Option<Duration>,
}

impl IdleClock {
    /// `limit_secs == 0` never times out.
    pub fn new(limit_secs: u64) -> Self {
        Self { last_activity: Instant::now(), limit: (limit_secs > 0).then(|| Duration::from_secs(limit_secs)) }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    pub fn timed_out(&self) -> bool {
        self.limit.is_some_and(|limit| self.idle_for() >= limit)
    }
}
