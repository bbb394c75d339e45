//! Session-level control graph sequencing the orchestrator's work.

pub mod machine;

pub use machine::{Guards, SessionEvent, SessionMachine, SessionState, transition};
