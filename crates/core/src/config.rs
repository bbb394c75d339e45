use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// All orchestrator parameters. Built from defaults overlaid with `ROBO_*`
/// environment variables at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoboCfg {
    // oracle
    pub max_retries: u32,
    pub context_frame_tokens: usize,
    pub standard_model: String,
    pub extended_model: String,
    /// Per-call deadline in seconds. 0 disables it.
    pub oracle_timeout_secs: u64,

    // activity log window
    pub max_timespan_secs: i64,

    // operator negotiation
    pub confirm_max_prompts: u32,

    // session loop
    pub tick_ms: u64,
    /// Tick interval while backing off after a failed decision.
    pub backoff_ms: u64,
    /// Seconds without input or open work before the session shuts down. 0 disables it.
    pub idle_timeout_secs: u64,
    pub max_transitions_per_tick: usize,
    pub max_troubleshoot_attempts: u32,

    /// Directory whose prompt files override the built-in templates.
    pub prompt_dir: Option<PathBuf>,
}

impl Default for RoboCfg {
    fn default() -> Self {
        Self {
            max_retries: 3,
            context_frame_tokens: 8129,
            standard_model: "gpt-3.5-turbo-0613".into(),
            extended_model: "gpt-3.5-turbo-16k".into(),
            oracle_timeout_secs: 60,
            max_timespan_secs: 120,
            confirm_max_prompts: 3,
            tick_ms: 200,
            backoff_ms: 2000,
            idle_timeout_secs: 120,
            max_transitions_per_tick: 32,
            max_troubleshoot_attempts: 3,
            prompt_dir: None,
        }
    }
}

impl RoboCfg {
    /// Load config from `ROBO_<KEY>` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let map: HashMap<String, String> = std::env::vars()
            .filter_map(|(k, v)| k.strip_prefix("ROBO_").map(|key| (key.to_ascii_lowercase(), v)))
            .collect();
        Self::from_map(&map)
    }

    pub fn from_map(m: &HashMap<String, String>) -> Self {
        let d = Self::default();
        Self {
            max_retries: get_or(m, "max_retries", d.max_retries).max(1),
            context_frame_tokens: get_or(m, "context_frame_tokens", d.context_frame_tokens),
            standard_model: get_or(m, "standard_model", d.standard_model),
            extended_model: get_or(m, "extended_model", d.extended_model),
            oracle_timeout_secs: get_or(m, "oracle_timeout_secs", d.oracle_timeout_secs),
            max_timespan_secs: get_or(m, "max_timespan_secs", d.max_timespan_secs),
            confirm_max_prompts: get_or(m, "confirm_max_prompts", d.confirm_max_prompts),
            tick_ms: get_or(m, "tick_ms", d.tick_ms),
            backoff_ms: get_or(m, "backoff_ms", d.backoff_ms),
            idle_timeout_secs: get_or(m, "idle_timeout_secs", d.idle_timeout_secs),
            max_transitions_per_tick: get_or(m, "max_transitions_per_tick", d.max_transitions_per_tick),
            max_troubleshoot_attempts: get_or(m, "max_troubleshoot_attempts", d.max_troubleshoot_attempts),
            prompt_dir: m.get("prompt_dir").filter(|v| !v.is_empty()).map(PathBuf::from),
        }
    }

    /// Key, current value and description of every tunable, for display.
    pub fn to_entries(&self) -> Vec<(&str, String, &str)> {
        vec![
            ("max_retries", self.max_retries.to_string(), "Oracle attempts per request"),
            ("context_frame_tokens", self.context_frame_tokens.to_string(), "Token estimate above which the extended model is used"),
            ("standard_model", self.standard_model.clone(), "Model for requests within the context frame"),
            ("extended_model", self.extended_model.clone(), "Model for requests exceeding the context frame"),
            ("oracle_timeout_secs", self.oracle_timeout_secs.to_string(), "Per-call oracle deadline, 0 disables"),
            ("max_timespan_secs", self.max_timespan_secs.to_string(), "Default activity log window in seconds"),
            ("confirm_max_prompts", self.confirm_max_prompts.to_string(), "Pause/defer confirmation attempts"),
            ("tick_ms", self.tick_ms.to_string(), "Session tick interval ms"),
            ("backoff_ms", self.backoff_ms.to_string(), "Tick interval ms after a failed decision"),
            ("idle_timeout_secs", self.idle_timeout_secs.to_string(), "Idle seconds before shutdown, 0 disables"),
            ("max_transitions_per_tick", self.max_transitions_per_tick.to_string(), "Session transitions allowed per tick"),
            ("max_troubleshoot_attempts", self.max_troubleshoot_attempts.to_string(), "Retries before asking the operator for advice"),
            (
                "prompt_dir",
                self.prompt_dir.as_ref().map(|p| p.display().to_string()).unwrap_or_default(),
                "Prompt override directory",
            ),
        ]
    }
}

fn get_or<T: std::str::FromStr>(map: &HashMap<String, String>, key: &str, default: T) -> T {
    map.get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
