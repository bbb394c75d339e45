pub mod advice;
pub mod conversation;
pub mod objects;
pub mod task;
pub mod task_stack;

pub use advice::{Advice, AdviceBook};
pub use conversation::{Conversation, ConversationLog, Message};
pub use objects::{ObjectKnowledge, ObjectMemory};
pub use task::Task;
pub use task_stack::TaskStack;
