//! Example shadow-agent plugin contributing host information commands.
//!
//! Built as a cdylib and loaded at runtime; also usable as a regular
//! crate for tests.

use std::sync::Arc;

use async_trait::async_trait;
use shadow_plugin_api::{Command, CommandResult, Plugin, PluginRegistrar};
use tracing::info;

/// Reports how long the host has been up (from `/proc/uptime`).
pub struct UptimeCommand;

#[async_trait]
impl Command for UptimeCommand {
    fn name(&self) -> &str {
        "uptime"
    }

    fn description(&self) -> &str {
        "show host uptime"
    }

    async fn execute(&self, _args: &[String]) -> CommandResult {
        let raw = match std::fs::read_to_string("/proc/uptime") {
            Ok(raw) => raw,
            Err(e) => return CommandResult::fail(format!("cannot read host uptime: {e}")),
        };

        let Some(seconds) = raw
            .split_whitespace()
            .next()
            .and_then(|s| s.parse::<f64>().ok())
        else {
            return CommandResult::fail("unexpected /proc/uptime format");
        };

        let total = seconds as u64;
        CommandResult::ok(format!(
            "host up {}d {}h {}m {}s",
            total / 86_400,
            (total % 86_400) / 3600,
            (total % 3600) / 60,
            total % 60
        ))
    }
}

/// Reports the host's name.
pub struct HostnameCommand;

#[async_trait]
impl Command for HostnameCommand {
    fn name(&self) -> &str {
        "hostname"
    }

    fn description(&self) -> &str {
        "show the host name"
    }

    async fn execute(&self, _args: &[String]) -> CommandResult {
        match hostname::get() {
            Ok(name) => CommandResult::ok(name.to_string_lossy().into_owned()),
            Err(e) => CommandResult::fail(format!("cannot resolve hostname: {e}")),
        }
    }
}

/// The plugin itself: identity plus the command set above.
pub struct SysInfoPlugin;

#[async_trait]
impl Plugin for SysInfoPlugin {
    fn name(&self) -> &str {
        "sys-info"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &str {
        "host uptime and hostname commands"
    }

    fn commands(&self) -> Vec<Arc<dyn Command>> {
        vec![Arc::new(UptimeCommand), Arc::new(HostnameCommand)]
    }

    async fn initialize(&self) -> anyhow::Result<()> {
        info!(plugin = self.name(), "sys-info plugin initialized");
        Ok(())
    }

    async fn cleanup(&self) -> anyhow::Result<()> {
        info!(plugin = self.name(), "sys-info plugin cleaned up");
        Ok(())
    }
}

fn register(registrar: &mut dyn PluginRegistrar) {
    registrar.register(Box::new(SysInfoPlugin));
}

shadow_plugin_api::declare_plugins!(register);

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plugin_identity() {
        let plugin = SysInfoPlugin;
        assert_eq!(plugin.name(), "sys-info");
        assert_eq!(plugin.commands().len(), 2);
        assert!(plugin.initialize().await.is_ok());
        assert!(plugin.cleanup().await.is_ok());
    }

    #[tokio::test]
    async fn hostname_resolves() {
        let result = HostnameCommand.execute(&[]).await;
        assert!(result.success);
        assert!(!result.message.is_empty());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn uptime_reads_proc() {
        let result = UptimeCommand.execute(&[]).await;
        assert!(result.success, "unexpected: {:?}", result.error);
        assert!(result.message.starts_with("host up "));
    }
}
