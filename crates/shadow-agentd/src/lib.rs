//! Shadow agent daemon: a local control-plane listening on a Unix socket.
//!
//! Clients send one authenticated request line per connection
//! (`"<TOKEN> <command> [args]"`) and receive one response line
//! (`"OK: ..."` or `"ERROR: ..."`). Commands are resolved through a
//! dynamic registry whose contents can be extended at runtime by loading
//! plugin libraries.
//!
//! # Architecture
//!
//! - [`registry::CommandRegistry`]: name -> command map, the single source
//!   of truth for dispatch
//! - [`plugins::PluginManager`]: loads/unloads plugin libraries and keeps
//!   the registry in sync with them
//! - [`server`]: socket listener and per-connection protocol handling
//! - [`commands`]: the built-in command set registered at startup

pub mod commands;
pub mod plugins;
pub mod registry;
pub mod server;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use shadow_types::AgentConfig;

use crate::plugins::PluginManager;
use crate::registry::CommandRegistry;

/// Everything a connection handler needs, constructed once at startup and
/// passed explicitly. The daemon keeps no global state.
pub struct AgentContext {
    /// Daemon configuration.
    pub config: AgentConfig,
    /// Live command registry.
    pub registry: Arc<CommandRegistry>,
    /// Plugin lifecycle manager.
    pub plugins: Arc<PluginManager>,
    /// When the daemon started.
    pub started_at: Instant,
    /// Cooperative shutdown signal for the accept loop.
    pub shutdown: Arc<AtomicBool>,
}

impl AgentContext {
    /// Build a context from configuration, wiring the registry into the
    /// plugin manager.
    pub fn new(config: AgentConfig) -> Self {
        let registry = Arc::new(CommandRegistry::new());
        let plugins = Arc::new(PluginManager::new(
            Arc::clone(&registry),
            config.plugins_dir.clone(),
        ));
        Self {
            config,
            registry,
            plugins,
            started_at: Instant::now(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }
}
