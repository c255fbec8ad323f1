//! System power commands: `shutdown` and `reboot`.
//!
//! Each tries a list of candidate commands in order (with and without
//! sudo, systemctl before the legacy tools) and stops at the first that
//! exits zero. Failures are logged per attempt; only when every candidate
//! fails does the command report an error.

use async_trait::async_trait;
use shadow_plugin_api::{Command, CommandResult};
use tracing::{debug, info, warn};

const SHUTDOWN_CANDIDATES: &[&[&str]] = &[
    &["sudo", "/usr/bin/systemctl", "poweroff"],
    &["sudo", "/sbin/shutdown", "-h", "now"],
    &["sudo", "/sbin/poweroff"],
    &["/usr/bin/systemctl", "poweroff"],
    &["/sbin/shutdown", "-h", "now"],
    &["/sbin/poweroff"],
];

const REBOOT_CANDIDATES: &[&[&str]] = &[
    &["sudo", "/usr/bin/systemctl", "reboot"],
    &["sudo", "/sbin/reboot"],
    &["/usr/bin/systemctl", "reboot"],
    &["/sbin/reboot"],
];

async fn try_candidates(candidates: &[&[&str]], success_message: &str) -> CommandResult {
    for candidate in candidates {
        let (program, args) = (candidate[0], &candidate[1..]);
        debug!(command = %candidate.join(" "), "attempting system command");

        match tokio::process::Command::new(program).args(args).output().await {
            Ok(output) if output.status.success() => {
                info!(command = %candidate.join(" "), "system command succeeded");
                return CommandResult::ok(success_message);
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!(
                    command = %candidate.join(" "),
                    status = ?output.status.code(),
                    stderr = %stderr.trim(),
                    "system command failed"
                );
            }
            Err(e) => {
                debug!(command = %candidate.join(" "), error = %e, "failed to spawn");
            }
        }
    }

    CommandResult::fail("all candidate commands failed, check sudo permissions")
}

/// Power the system off.
pub struct ShutdownCommand;

#[async_trait]
impl Command for ShutdownCommand {
    fn name(&self) -> &str {
        "shutdown"
    }

    fn description(&self) -> &str {
        "power the system off"
    }

    async fn execute(&self, _args: &[String]) -> CommandResult {
        info!("shutdown requested");
        try_candidates(SHUTDOWN_CANDIDATES, "system is powering off").await
    }
}

/// Reboot the system.
pub struct RebootCommand;

#[async_trait]
impl Command for RebootCommand {
    fn name(&self) -> &str {
        "reboot"
    }

    fn description(&self) -> &str {
        "reboot the system"
    }

    async fn execute(&self, _args: &[String]) -> CommandResult {
        info!("reboot requested");
        try_candidates(REBOOT_CANDIDATES, "system is rebooting").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exhausted_candidates_report_failure() {
        // nonexistent binaries: every spawn fails, so the result is a
        // clean error rather than a panic or partial state
        let candidates: &[&[&str]] = &[
            &["/nonexistent/bin/one"],
            &["/nonexistent/bin/two", "-x"],
        ];
        let result = try_candidates(candidates, "unused").await;
        assert!(!result.success);
        assert!(result.error_text().contains("all candidate commands failed"));
    }

    #[tokio::test]
    async fn first_successful_candidate_wins() {
        let candidates: &[&[&str]] = &[
            &["/nonexistent/bin/one"],
            &["/bin/true"],
            &["/nonexistent/bin/never-reached"],
        ];
        let result = try_candidates(candidates, "done").await;
        assert!(result.success);
        assert_eq!(result.message, "done");
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_success() {
        let candidates: &[&[&str]] = &[&["/bin/false"]];
        let result = try_candidates(candidates, "unused").await;
        assert!(!result.success);
    }
}
