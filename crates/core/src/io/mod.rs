pub mod input;
pub mod operator;
pub mod output;

pub use operator::{ChannelOperator, Operator, ScriptedOperator};
pub use output::{OutputMessage, Tone};
