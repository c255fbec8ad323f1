//! Shared types for the shadow-agent daemon: configuration and the error
//! taxonomy used across crates.

pub mod config;
pub mod error;

pub use config::AgentConfig;
pub use error::AgentError;
