use std::path::PathBuf;

/// Oracle request that produced no usable completion.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("no completion after {attempts} attempts: {last_reason}")]
    Exhausted { attempts: u32, last_reason: String },
}

/// Prompt template could not be served.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("prompt name `{0}` does not end with .txt")]
    InvalidName(String),
    #[error("prompt `{name}` not found")]
    NotFound { name: String },
    #[error("prompt `{name}` could not be read from {}: {reason}", path.display())]
    Unreadable { name: String, path: PathBuf, reason: String },
}

/// Structured payload that is not well-formed for its consumer.
#[derive(Debug, thiserror::Error)]
pub enum ParsingError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` has an invalid value: {reason}")]
    InvalidField { field: String, reason: String },
}

/// Capability surface rejected at startup.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("function `{0}` is declared by more than one provider")]
    Duplicate(String),
    #[error("function `{0}` shadows a cognitive function")]
    Reserved(String),
    #[error("provider `{0}` declares a function with an empty name")]
    EmptyName(String),
}

/// Fault raised by a capability provider while executing an action.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("missing argument `{0}`")]
    MissingArgument(String),
    #[error("{0}")]
    Failed(String),
}

/// Session event fired from a state that has no edge for it.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("no transition from {from} on {event}")]
pub struct TransitionError {
    pub from: String,
    pub event: String,
}
