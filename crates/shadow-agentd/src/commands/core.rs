//! Heartbeat, help, and status commands.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use shadow_plugin_api::{Command, CommandResult};

use crate::plugins::PluginManager;
use crate::registry::CommandRegistry;

/// Heartbeat check.
pub struct PingCommand;

#[async_trait]
impl Command for PingCommand {
    fn name(&self) -> &str {
        "ping"
    }

    fn description(&self) -> &str {
        "heartbeat check"
    }

    async fn execute(&self, _args: &[String]) -> CommandResult {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        CommandResult::ok(format!("pong - {now}"))
    }
}

/// Lists every registered command with its description.
///
/// Reads a live registry snapshot, so commands contributed by plugins
/// appear as soon as they are loaded.
pub struct HelpCommand {
    registry: Arc<CommandRegistry>,
}

impl HelpCommand {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Command for HelpCommand {
    fn name(&self) -> &str {
        "help"
    }

    fn description(&self) -> &str {
        "list available commands"
    }

    async fn execute(&self, _args: &[String]) -> CommandResult {
        let commands = self.registry.list().await;
        let listing: Vec<String> = commands
            .iter()
            .map(|c| format!("{} - {}", c.name(), c.description()))
            .collect();
        CommandResult::ok(format!("available commands: {}", listing.join(", ")))
    }
}

/// Reports daemon uptime, process info, and plugin/command counts.
pub struct StatusCommand {
    registry: Arc<CommandRegistry>,
    plugins: Arc<PluginManager>,
    started_at: Instant,
}

impl StatusCommand {
    pub fn new(
        registry: Arc<CommandRegistry>,
        plugins: Arc<PluginManager>,
        started_at: Instant,
    ) -> Self {
        Self {
            registry,
            plugins,
            started_at,
        }
    }
}

#[async_trait]
impl Command for StatusCommand {
    fn name(&self) -> &str {
        "status"
    }

    fn description(&self) -> &str {
        "show daemon status"
    }

    async fn execute(&self, _args: &[String]) -> CommandResult {
        let uptime = self.started_at.elapsed();
        let hours = uptime.as_secs() / 3600;
        let minutes = (uptime.as_secs() % 3600) / 60;
        let seconds = uptime.as_secs() % 60;

        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());

        CommandResult::ok(format!(
            "uptime {hours}h {minutes}m {seconds}s, pid {}, host {host}, platform {}/{}, {} plugins, {} commands",
            std::process::id(),
            std::env::consts::OS,
            std::env::consts::ARCH,
            self.plugins.count().await,
            self.registry.len().await,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::FixedCommand;
    use std::path::PathBuf;

    fn parts() -> (Arc<CommandRegistry>, Arc<PluginManager>) {
        let registry = Arc::new(CommandRegistry::new());
        let plugins = Arc::new(PluginManager::new(
            Arc::clone(&registry),
            PathBuf::from("/nonexistent"),
        ));
        (registry, plugins)
    }

    #[tokio::test]
    async fn ping_replies_pong_with_timestamp() {
        let result = PingCommand.execute(&[]).await;
        assert!(result.success);
        assert!(result.message.starts_with("pong - "));
        // timestamp format: "pong - YYYY-MM-DD HH:MM:SS"
        assert_eq!(result.message.len(), "pong - ".len() + 19);
    }

    #[tokio::test]
    async fn help_lists_registered_commands() {
        let (registry, _plugins) = parts();
        registry.register(FixedCommand::new("ping", "pong")).await;
        registry.register(FixedCommand::new("zz", "z")).await;

        let help = HelpCommand::new(Arc::clone(&registry));
        let result = help.execute(&[]).await;
        assert!(result.success);
        assert!(result.message.starts_with("available commands: "));
        assert!(result.message.contains("ping - "));
        assert!(result.message.contains("zz - "));
    }

    #[tokio::test]
    async fn help_reflects_live_registry() {
        let (registry, _plugins) = parts();
        let help = HelpCommand::new(Arc::clone(&registry));

        registry.register(FixedCommand::new("late", "x")).await;
        assert!(help.execute(&[]).await.message.contains("late"));

        registry.unregister("late").await;
        assert!(!help.execute(&[]).await.message.contains("late"));
    }

    #[tokio::test]
    async fn status_reports_counts() {
        let (registry, plugins) = parts();
        registry.register(FixedCommand::new("one", "1")).await;

        let status = StatusCommand::new(registry, plugins, Instant::now());
        let result = status.execute(&[]).await;
        assert!(result.success);
        assert!(result.message.contains("0 plugins"));
        assert!(result.message.contains("1 commands"));
        assert!(result.message.contains(&format!("pid {}", std::process::id())));
    }
}
