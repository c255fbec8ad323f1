//! The command registry: authoritative name -> command mapping.
//!
//! Names are case-insensitive; at most one command is bound to a name at
//! any instant. Registration never overwrites an existing binding.

use std::collections::HashMap;
use std::sync::Arc;

use shadow_plugin_api::Command;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Dynamic registry of dispatchable commands.
///
/// Mutations take the write lock, so a registration or removal is visible
/// to every subsequent lookup immediately.
pub struct CommandRegistry {
    commands: RwLock<HashMap<String, Arc<dyn Command>>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: RwLock::new(HashMap::new()),
        }
    }

    /// Register a command.
    ///
    /// Returns false and leaves the registry unchanged if another command
    /// already holds the name (case-insensitively).
    pub async fn register(&self, command: Arc<dyn Command>) -> bool {
        let key = command.name().to_lowercase();
        let mut commands = self.commands.write().await;
        if commands.contains_key(&key) {
            warn!(command = %key, "command already registered, keeping existing binding");
            return false;
        }
        debug!(command = %key, description = command.description(), "registered command");
        commands.insert(key, command);
        true
    }

    /// Remove a command by name. Returns false if the name is not bound.
    pub async fn unregister(&self, name: &str) -> bool {
        let key = name.to_lowercase();
        let mut commands = self.commands.write().await;
        if commands.remove(&key).is_none() {
            warn!(command = %key, "cannot unregister unknown command");
            return false;
        }
        debug!(command = %key, "unregistered command");
        true
    }

    /// Case-insensitive lookup.
    pub async fn lookup(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.read().await.get(&name.to_lowercase()).cloned()
    }

    /// Whether a name is currently bound.
    pub async fn contains(&self, name: &str) -> bool {
        self.commands.read().await.contains_key(&name.to_lowercase())
    }

    /// Snapshot of all registered commands, sorted by name.
    pub async fn list(&self) -> Vec<Arc<dyn Command>> {
        let commands = self.commands.read().await;
        let mut all: Vec<Arc<dyn Command>> = commands.values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    /// Number of registered commands.
    pub async fn len(&self) -> usize {
        self.commands.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.commands.read().await.is_empty()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}
