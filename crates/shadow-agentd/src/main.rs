use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use shadow_agentd::{commands, server, AgentContext};
use shadow_types::AgentConfig;

/// Local control-plane agent: token-authenticated commands over a Unix
/// socket, extensible at runtime via plugin libraries.
#[derive(Parser, Debug)]
#[command(name = "shadow-agentd", version, about)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "agent.toml")]
    config: PathBuf,

    /// Override the socket path from the config file
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Override the shared token from the config file
    #[arg(long)]
    token: Option<String>,

    /// Override the plugin directory from the config file
    #[arg(long)]
    plugins_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = AgentConfig::load(&cli.config);
    if let Some(socket) = cli.socket {
        config.socket_path = socket;
    }
    if let Some(token) = cli.token {
        config.token = token;
    }
    if let Some(plugins_dir) = cli.plugins_dir {
        config.plugins_dir = plugins_dir;
    }

    info!(
        socket = %config.socket_path.display(),
        plugins_dir = %config.plugins_dir.display(),
        "shadow agent starting"
    );

    let ctx = Arc::new(AgentContext::new(config));

    let loaded = ctx.plugins.load_all().await;
    info!(plugins = loaded, "startup plugin scan complete");

    commands::register_builtins(&ctx.registry, &ctx.plugins, ctx.started_at).await;
    let names: Vec<String> = ctx
        .registry
        .list()
        .await
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    info!(commands = %names.join(", "), "command set ready");

    // Bind failure is the one fatal transport error
    let listener =
        server::Listener::bind(&ctx.config.socket_path).context("failed to start listener")?;

    let shutdown = Arc::clone(&ctx.shutdown);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, stopping");
                shutdown.store(true, Ordering::Relaxed);
            }
            Err(e) => warn!(error = %e, "failed to install interrupt handler"),
        }
    });

    server::run(listener, ctx).await;

    info!("shadow agent stopped");
    Ok(())
}
