//! Built-in commands registered at startup.
//!
//! Built-ins share the dispatch path with plugin commands but are not
//! owned by any plugin record, so `unload`/`reload-plugins` never remove
//! them.

mod core;
mod plugin_admin;
mod system;

use std::sync::Arc;
use std::time::Instant;

use shadow_plugin_api::Command;

use crate::plugins::PluginManager;
use crate::registry::CommandRegistry;

pub use self::core::{HelpCommand, PingCommand, StatusCommand};
pub use self::plugin_admin::{
    ListPluginsCommand, LoadCommand, ReloadPluginsCommand, UnloadCommand,
};
pub use self::system::{RebootCommand, ShutdownCommand};

/// Register the full built-in command set.
pub async fn register_builtins(
    registry: &Arc<CommandRegistry>,
    plugins: &Arc<PluginManager>,
    started_at: Instant,
) {
    let builtins: Vec<Arc<dyn Command>> = vec![
        Arc::new(PingCommand),
        Arc::new(HelpCommand::new(Arc::clone(registry))),
        Arc::new(StatusCommand::new(
            Arc::clone(registry),
            Arc::clone(plugins),
            started_at,
        )),
        Arc::new(LoadCommand::new(Arc::clone(plugins))),
        Arc::new(UnloadCommand::new(Arc::clone(plugins))),
        Arc::new(ListPluginsCommand::new(Arc::clone(plugins))),
        Arc::new(ReloadPluginsCommand::new(Arc::clone(plugins))),
        Arc::new(ShutdownCommand),
        Arc::new(RebootCommand),
    ];

    for command in builtins {
        registry.register(command).await;
    }
}
