pub mod capability;
pub mod cognition;
pub mod config;
pub mod error;
pub mod io;
pub mod memory;
pub mod oracle;
pub mod runtime;
pub mod session;
pub mod types;
