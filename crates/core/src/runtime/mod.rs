mod loop_control;
mod scheduler;
mod shutdown;

pub use loop_control::{IdleClock, TickMode};
pub use scheduler::Runtime;
pub use shutdown::ShutdownGuard;
