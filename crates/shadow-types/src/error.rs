//! Error types shared across the shadow-agent crates.

/// Errors that can occur in the shadow-agent runtime.
///
/// Each variant corresponds to a failure class with its own recovery
/// policy: transport errors are fatal only at bind time, protocol errors
/// yield one `ERROR` response line, plugin errors are logged and reflected
/// in the operation's result, and command errors surface as a failed
/// `CommandResult`.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("plugin load error: {0}")]
    PluginLoad(String),

    #[error("plugin unload error: {0}")]
    PluginUnload(String),

    #[error("command execution error: {0}")]
    CommandExecution(String),

    #[error("configuration error: {0}")]
    Config(String),
}
