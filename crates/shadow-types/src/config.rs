//! Daemon configuration, loaded from `agent.toml`.
//!
//! Every field has a built-in default so a missing or partial file is
//! never fatal: an absent or unreadable config falls back to defaults
//! entirely, a present file fills in only the fields it names.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Top-level configuration for the shadow-agent daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentConfig {
    /// Filesystem path of the Unix socket the daemon listens on.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    /// Shared secret a client must present verbatim on every request.
    #[serde(default = "default_token")]
    pub token: String,
    /// Directory scanned (recursively) for plugin libraries at startup
    /// and on `reload-plugins`.
    #[serde(default = "default_plugins_dir")]
    pub plugins_dir: PathBuf,
    /// Maximum number of concurrently handled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/shadow-agent.sock")
}

fn default_token() -> String {
    "SHADOW".to_string()
}

fn default_plugins_dir() -> PathBuf {
    PathBuf::from("plugins")
}

fn default_max_connections() -> usize {
    64
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            token: default_token(),
            plugins_dir: default_plugins_dir(),
            max_connections: default_max_connections(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing, unreadable, or unparsable file yields the built-in
    /// defaults with a warning; it never aborts startup.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "config file not found, using defaults");
                return Self::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read config, using defaults");
                return Self::default();
            }
        };

        match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to parse config, using defaults");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.socket_path, PathBuf::from("/tmp/shadow-agent.sock"));
        assert_eq!(config.token, "SHADOW");
        assert_eq!(config.plugins_dir, PathBuf::from("plugins"));
        assert_eq!(config.max_connections, 64);
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let config = AgentConfig::load(Path::new("/nonexistent/agent.toml"));
        assert_eq!(config, AgentConfig::default());
    }

    #[test]
    fn load_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
socket_path = "/run/shadow/agent.sock"
token = "SECRET"
plugins_dir = "/opt/shadow/plugins"
max_connections = 8
"#
        )
        .unwrap();

        let config = AgentConfig::load(file.path());
        assert_eq!(config.socket_path, PathBuf::from("/run/shadow/agent.sock"));
        assert_eq!(config.token, "SECRET");
        assert_eq!(config.plugins_dir, PathBuf::from("/opt/shadow/plugins"));
        assert_eq!(config.max_connections, 8);
    }

    #[test]
    fn load_partial_file_fills_remaining_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"token = "OTHER""#).unwrap();

        let config = AgentConfig::load(file.path());
        assert_eq!(config.token, "OTHER");
        assert_eq!(config.socket_path, PathBuf::from("/tmp/shadow-agent.sock"));
    }

    #[test]
    fn load_invalid_toml_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not valid toml [").unwrap();

        let config = AgentConfig::load(file.path());
        assert_eq!(config, AgentConfig::default());
    }

    #[test]
    fn toml_roundtrip() {
        let config = AgentConfig::default();
        let serialized = toml::to_string(&config).unwrap();
        let parsed: AgentConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed, config);
    }
}
