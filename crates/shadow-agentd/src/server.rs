//! Unix socket listener and per-connection protocol handling.
//!
//! Each connection carries exactly one exchange: read one request line,
//! authenticate it against the shared token, dispatch through the command
//! registry, write one response line (`OK: ...` / `ERROR: ...`), close.

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use shadow_types::AgentError;

use crate::AgentContext;

/// Cap on request size. Requests are single command lines; anything
/// larger is a protocol violation, not a legitimate request.
const MAX_REQUEST_BYTES: u64 = 64 * 1024;

/// Read cap for the buffered reader, above the request limit so an
/// oversized line surfaces as a too-long line rather than a silently
/// truncated one.
const READ_CAP_BYTES: u64 = 2 * MAX_REQUEST_BYTES;

/// The bound control socket.
pub struct Listener {
    listener: UnixListener,
}

impl Listener {
    /// Remove any stale socket file, bind, and widen permissions so any
    /// local account can connect (authentication happens per request via
    /// the shared token, not via filesystem access).
    pub fn bind(socket_path: &Path) -> Result<Self, AgentError> {
        // Unconditional remove avoids a TOCTOU race with exists()+remove()
        match std::fs::remove_file(socket_path) {
            Ok(()) => {
                info!(path = %socket_path.display(), "removed stale socket file");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(AgentError::Transport(format!(
                    "failed to remove stale socket {}: {e}",
                    socket_path.display()
                )));
            }
        }

        let listener = UnixListener::bind(socket_path).map_err(|e| {
            AgentError::Transport(format!("failed to bind {}: {e}", socket_path.display()))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) =
                std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o666))
            {
                warn!(
                    path = %socket_path.display(),
                    error = %e,
                    "failed to widen socket permissions"
                );
            }
        }

        info!(path = %socket_path.display(), "control socket listening");
        Ok(Self { listener })
    }
}

/// Run the accept loop until the context's shutdown flag is set.
///
/// Every accepted connection is handled in its own spawned task; the
/// acceptor never awaits a handler's result. Accept errors are logged and
/// the loop continues. On shutdown the socket file is removed; already
/// accepted connections finish unforced.
pub async fn run(listener: Listener, ctx: Arc<AgentContext>) {
    let limiter = Arc::new(Semaphore::new(ctx.config.max_connections));

    loop {
        if ctx.shutdown.load(Ordering::Relaxed) {
            break;
        }

        // Accept with a timeout so the shutdown flag is observed promptly
        let accept =
            tokio::time::timeout(Duration::from_secs(1), listener.listener.accept()).await;

        match accept {
            Ok(Ok((stream, _addr))) => match Arc::clone(&limiter).try_acquire_owned() {
                Ok(permit) => {
                    let ctx = Arc::clone(&ctx);
                    tokio::spawn(async move {
                        handle_connection(stream, ctx).await;
                        drop(permit);
                    });
                }
                Err(_) => {
                    warn!("connection limit reached, rejecting connection");
                    tokio::spawn(async move {
                        let mut stream = stream;
                        let _ = stream.write_all(b"ERROR: too many connections\n").await;
                    });
                }
            },
            Ok(Err(e)) => {
                warn!(error = %e, "accept failed");
            }
            Err(_) => {
                // timeout, re-check shutdown
            }
        }
    }

    let _ = std::fs::remove_file(&ctx.config.socket_path);
    info!("control socket stopped");
}

/// Handle one connection: one request, one response, close.
///
/// Every exit path writes at most one response line and drops the stream;
/// no failure here can reach the accept loop.
async fn handle_connection(stream: UnixStream, ctx: Arc<AgentContext>) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader.take(READ_CAP_BYTES)).lines();

    let response = match lines.next_line().await {
        Ok(Some(line)) if line.len() as u64 > MAX_REQUEST_BYTES => {
            warn!(bytes = line.len(), "request line too large");
            "ERROR: request too large".to_string()
        }
        Ok(Some(line)) => dispatch(&line, &ctx).await,
        Ok(None) => {
            debug!("connection closed without a request");
            "ERROR: empty request".to_string()
        }
        Err(e) => {
            warn!(error = %e, "failed to read request line");
            "ERROR: malformed request".to_string()
        }
    };

    // Responses are exactly one line regardless of what a command put in
    // its message.
    let mut response = response.replace('\n', " ");
    response.push('\n');
    if let Err(e) = writer.write_all(response.as_bytes()).await {
        warn!(error = %e, "failed to write response");
    }
    let _ = writer.flush().await;
    // stream halves drop here, closing the connection unconditionally
}

/// Parse, authenticate, and dispatch one request line.
///
/// Request format: `"<TOKEN> <command> [argument-string]"`. The token must
/// equal the configured secret exactly; the command is matched
/// case-insensitively; the remainder is split on single spaces with no
/// quoting. No registry or plugin state is touched before the token check
/// passes.
pub(crate) async fn dispatch(line: &str, ctx: &AgentContext) -> String {
    if line.trim().is_empty() {
        return "ERROR: empty request".to_string();
    }

    let mut parts = line.splitn(3, ' ');
    let token = parts.next().unwrap_or_default();
    let command_name = match parts.next() {
        Some(name) if !name.is_empty() => name,
        _ => {
            debug!("request rejected: missing command field");
            return "ERROR: authentication failed, expected '<TOKEN> <command> [args]'"
                .to_string();
        }
    };

    if token != ctx.config.token {
        debug!("request rejected: bad token");
        return "ERROR: authentication failed, expected '<TOKEN> <command> [args]'".to_string();
    }

    let args: Vec<String> = parts
        .next()
        .map(|rest| rest.split(' ').map(str::to_string).collect())
        .unwrap_or_default();

    let command = match ctx.registry.lookup(command_name).await {
        Some(command) => command,
        None => {
            debug!(command = %command_name, "unknown command");
            return format!("ERROR: unknown command '{command_name}', try 'help'");
        }
    };

    info!(command = %command_name, args = args.len(), "dispatching command");

    // The Arc keeps the command alive for the whole execution even if it
    // is unregistered concurrently; client disconnects do not cancel it.
    let result = command.execute(&args).await;
    if result.success {
        format!("OK: {}", result.message)
    } else {
        format!("ERROR: {}", result.error_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::FixedCommand;
    use shadow_types::AgentConfig;

    fn test_ctx() -> Arc<AgentContext> {
        let config = AgentConfig {
            token: "SHADOW".to_string(),
            ..AgentConfig::default()
        };
        Arc::new(AgentContext::new(config))
    }

    #[tokio::test]
    async fn dispatch_ok() {
        let ctx = test_ctx();
        ctx.registry.register(FixedCommand::new("ping", "pong")).await;

        let response = dispatch("SHADOW ping", &ctx).await;
        assert_eq!(response, "OK: pong");
    }

    #[tokio::test]
    async fn dispatch_command_is_case_insensitive() {
        let ctx = test_ctx();
        ctx.registry.register(FixedCommand::new("ping", "pong")).await;

        let response = dispatch("SHADOW PiNg", &ctx).await;
        assert_eq!(response, "OK: pong");
    }

    #[tokio::test]
    async fn dispatch_empty_request() {
        let ctx = test_ctx();
        assert_eq!(dispatch("", &ctx).await, "ERROR: empty request");
        assert_eq!(dispatch("   ", &ctx).await, "ERROR: empty request");
    }

    #[tokio::test]
    async fn dispatch_missing_command_field() {
        let ctx = test_ctx();
        let response = dispatch("SHADOW", &ctx).await;
        assert!(response.starts_with("ERROR: authentication failed"));
    }

    #[tokio::test]
    async fn dispatch_wrong_token() {
        let ctx = test_ctx();
        ctx.registry.register(FixedCommand::new("ping", "pong")).await;

        let response = dispatch("WRONGTOKEN ping", &ctx).await;
        assert!(response.starts_with("ERROR: authentication failed"));
    }

    #[tokio::test]
    async fn dispatch_token_match_is_exact() {
        let ctx = test_ctx();
        ctx.registry.register(FixedCommand::new("ping", "pong")).await;

        // case differences or padding are not accepted
        assert!(dispatch("shadow ping", &ctx).await.starts_with("ERROR:"));
        assert!(dispatch("SHADOWX ping", &ctx).await.starts_with("ERROR:"));
    }

    #[tokio::test]
    async fn dispatch_unknown_command() {
        let ctx = test_ctx();
        let response = dispatch("SHADOW nosuch", &ctx).await;
        assert_eq!(response, "ERROR: unknown command 'nosuch', try 'help'");
    }

    #[tokio::test]
    async fn dispatch_passes_argument_vector() {
        struct ArgsEcho;

        #[async_trait::async_trait]
        impl shadow_plugin_api::Command for ArgsEcho {
            fn name(&self) -> &str {
                "args"
            }
            fn description(&self) -> &str {
                "echo arg count and values"
            }
            async fn execute(&self, args: &[String]) -> shadow_plugin_api::CommandResult {
                shadow_plugin_api::CommandResult::ok(format!(
                    "{}:{}",
                    args.len(),
                    args.join(",")
                ))
            }
        }

        let ctx = test_ctx();
        ctx.registry.register(Arc::new(ArgsEcho)).await;

        // remainder split on single spaces, no quoting
        let response = dispatch("SHADOW args one two three", &ctx).await;
        assert_eq!(response, "OK: 3:one,two,three");

        // doubled space yields an empty argument; no quoting or collapsing
        let response = dispatch("SHADOW args a  b", &ctx).await;
        assert_eq!(response, "OK: 3:a,,b");

        let response = dispatch("SHADOW args", &ctx).await;
        assert_eq!(response, "OK: 0:");
    }

    #[tokio::test]
    async fn dispatch_failure_formats_error_line() {
        struct AlwaysFails;

        #[async_trait::async_trait]
        impl shadow_plugin_api::Command for AlwaysFails {
            fn name(&self) -> &str {
                "broken"
            }
            fn description(&self) -> &str {
                "always fails"
            }
            async fn execute(&self, _args: &[String]) -> shadow_plugin_api::CommandResult {
                shadow_plugin_api::CommandResult::fail("it broke")
            }
        }

        let ctx = test_ctx();
        ctx.registry.register(Arc::new(AlwaysFails)).await;
        assert_eq!(dispatch("SHADOW broken", &ctx).await, "ERROR: it broke");
    }

    #[tokio::test]
    async fn wrong_token_never_reaches_the_registry() {
        let ctx = test_ctx();
        // no commands registered; a lookup would still be observable via
        // load-style side effects, so assert nothing changed
        let response = dispatch("WRONGTOKEN load /tmp/x.so", &ctx).await;
        assert!(response.starts_with("ERROR: authentication failed"));
        assert_eq!(ctx.plugins.count().await, 0);
        assert!(ctx.registry.is_empty().await);
    }
}
