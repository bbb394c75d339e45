mod context;
pub mod decision;
mod dispatch;
pub mod functions;
pub mod labeling;
mod orchestrator;
mod recall;

pub use decision::{DONE_SENTINEL, DecisionOutcome};
pub use dispatch::{ACTION_SUCCEEDED, ERROR_MARKER};
pub use functions::CognitiveFunction;
pub use labeling::InputEffect;
pub use orchestrator::{Orchestrator, StepReport};
