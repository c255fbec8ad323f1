//! Plugin management commands: `load`, `unload`, `plugins`,
//! `reload-plugins`.
//!
//! These share the normal dispatch path, so the protocol surface and the
//! management surface go through the same registry.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use shadow_plugin_api::{Command, CommandResult};
use tracing::info;

use crate::plugins::PluginManager;

/// Load a plugin library from a path.
pub struct LoadCommand {
    plugins: Arc<PluginManager>,
}

impl LoadCommand {
    pub fn new(plugins: Arc<PluginManager>) -> Self {
        Self { plugins }
    }
}

#[async_trait]
impl Command for LoadCommand {
    fn name(&self) -> &str {
        "load"
    }

    fn description(&self) -> &str {
        "load a plugin library file"
    }

    async fn execute(&self, args: &[String]) -> CommandResult {
        let Some(path) = args.first().filter(|p| !p.is_empty()) else {
            return CommandResult::fail("specify a plugin library path to load");
        };
        let path = PathBuf::from(path);

        info!(path = %path.display(), "load requested");
        match self.plugins.load(&path).await {
            Ok(true) => CommandResult::ok(format!("plugin loaded: {}", path.display())),
            Ok(false) => CommandResult::fail(format!(
                "no usable plugin in {}",
                path.display()
            )),
            Err(e) => CommandResult::fail(e.to_string()),
        }
    }
}

/// Unload a plugin by name.
pub struct UnloadCommand {
    plugins: Arc<PluginManager>,
}

impl UnloadCommand {
    pub fn new(plugins: Arc<PluginManager>) -> Self {
        Self { plugins }
    }
}

#[async_trait]
impl Command for UnloadCommand {
    fn name(&self) -> &str {
        "unload"
    }

    fn description(&self) -> &str {
        "unload a plugin by name"
    }

    async fn execute(&self, args: &[String]) -> CommandResult {
        let Some(name) = args.first().filter(|n| !n.is_empty()) else {
            return CommandResult::fail("specify the plugin name to unload");
        };

        info!(plugin = %name, "unload requested");
        match self.plugins.unload(name).await {
            Ok(true) => CommandResult::ok(format!("plugin unloaded: {name}")),
            Ok(false) => CommandResult::fail(format!("plugin not found: {name}")),
            Err(e) => CommandResult::fail(e.to_string()),
        }
    }
}

/// List loaded plugins with their commands.
pub struct ListPluginsCommand {
    plugins: Arc<PluginManager>,
}

impl ListPluginsCommand {
    pub fn new(plugins: Arc<PluginManager>) -> Self {
        Self { plugins }
    }
}

#[async_trait]
impl Command for ListPluginsCommand {
    fn name(&self) -> &str {
        "plugins"
    }

    fn description(&self) -> &str {
        "list loaded plugins"
    }

    async fn execute(&self, _args: &[String]) -> CommandResult {
        let snapshot = self.plugins.snapshot().await;
        if snapshot.is_empty() {
            return CommandResult::ok("no plugins loaded");
        }

        let entries: Vec<String> = snapshot
            .iter()
            .map(|p| {
                format!(
                    "[{}] v{} - {} (commands: {}; loaded at {})",
                    p.name,
                    p.version,
                    p.description,
                    if p.commands.is_empty() {
                        "none".to_string()
                    } else {
                        p.commands.join(", ")
                    },
                    p.loaded_at.format("%Y-%m-%d %H:%M:%S"),
                )
            })
            .collect();

        CommandResult::ok(format!(
            "{} plugins loaded: {}",
            snapshot.len(),
            entries.join("; ")
        ))
    }
}

/// Unload every plugin and rescan the plugin directory.
pub struct ReloadPluginsCommand {
    plugins: Arc<PluginManager>,
}

impl ReloadPluginsCommand {
    pub fn new(plugins: Arc<PluginManager>) -> Self {
        Self { plugins }
    }
}

#[async_trait]
impl Command for ReloadPluginsCommand {
    fn name(&self) -> &str {
        "reload-plugins"
    }

    fn description(&self) -> &str {
        "reload all plugins from the plugin directory"
    }

    async fn execute(&self, _args: &[String]) -> CommandResult {
        info!("plugin reload requested");
        let (unloaded, loaded) = self.plugins.reload_all().await;
        CommandResult::ok(format!(
            "plugins reloaded: {unloaded} unloaded, {loaded} loaded"
        ))
    }
}
