//! Plugin lifecycle management.
//!
//! The manager owns the set of loaded plugins and keeps the command
//! registry consistent with them: loading a module registers the commands
//! its plugins contribute, unloading removes exactly those names again.
//! Every mutation happens under one lock, so concurrent `load`/`unload`
//! commands serialize instead of corrupting the bookkeeping.

pub mod loader;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use libloading::Library;
use serde::Serialize;
use shadow_plugin_api::Plugin;
use shadow_types::AgentError;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::registry::CommandRegistry;

/// Bookkeeping for one loaded plugin.
///
/// Replaced wholesale on reload, never partially updated.
pub struct PluginRecord {
    /// The live plugin instance.
    pub plugin: Arc<dyn Plugin>,
    /// The command names (lowercased) this plugin actually got registered.
    /// Commands dropped due to name collisions are not listed here.
    pub command_names: Vec<String>,
    /// When the record was created.
    pub loaded_at: DateTime<Utc>,
    /// The module file the plugin came from.
    pub source: PathBuf,
    /// Keeps the backing library mapped while the plugin is alive.
    library: Option<Arc<Library>>,
}

/// Read-only view of a loaded plugin, for `plugins`/`status` output.
#[derive(Debug, Clone, Serialize)]
pub struct PluginSummary {
    pub name: String,
    pub version: String,
    pub description: String,
    pub commands: Vec<String>,
    pub loaded_at: DateTime<Utc>,
}

/// Owns loaded plugins and drives load/unload/reload against the registry.
pub struct PluginManager {
    registry: Arc<CommandRegistry>,
    plugins_dir: PathBuf,
    /// Plugin identity (lowercased name) -> record. The lock is held for
    /// the whole of each load/unload mutation.
    plugins: Mutex<HashMap<String, PluginRecord>>,
    /// Libraries whose records were replaced or removed. Command handles
    /// from an in-flight execution may still point into them, so their
    /// code is kept mapped for the lifetime of the process.
    retired_libraries: std::sync::Mutex<Vec<Arc<Library>>>,
}

impl PluginManager {
    pub fn new(registry: Arc<CommandRegistry>, plugins_dir: PathBuf) -> Self {
        Self {
            registry,
            plugins_dir,
            plugins: Mutex::new(HashMap::new()),
            retired_libraries: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// The directory scanned by [`load_all`](Self::load_all).
    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    /// Load one plugin module file.
    ///
    /// Returns `Ok(true)` iff at least one plugin from the module
    /// initialized and contributed at least one registered command;
    /// partial success (some commands dropped on collision, some sibling
    /// plugins skipped) still counts.
    pub async fn load(&self, path: &Path) -> Result<bool, AgentError> {
        if !path.is_file() {
            return Err(AgentError::PluginLoad(format!(
                "module not found: {}",
                path.display()
            )));
        }

        let module = loader::load_declared_plugins(path)?;
        let library = Arc::new(module.library);
        Ok(self
            .install_plugins(path, module.plugins, Some(library))
            .await)
    }

    /// Register a batch of plugin instances originating from `source`.
    ///
    /// Each instance is handled independently: an `initialize` failure
    /// skips that instance only, and a command name collision drops that
    /// single command while the rest of the plugin proceeds.
    pub(crate) async fn install_plugins(
        &self,
        source: &Path,
        plugins: Vec<Box<dyn Plugin>>,
        library: Option<Arc<Library>>,
    ) -> bool {
        let mut records = self.plugins.lock().await;
        let mut any_usable = false;

        for plugin in plugins {
            let plugin: Arc<dyn Plugin> = Arc::from(plugin);
            let name = plugin.name().to_string();

            if let Err(e) = plugin.initialize().await {
                warn!(plugin = %name, error = %e, "plugin initialization failed, skipping");
                continue;
            }

            let mut command_names = Vec::new();
            for command in plugin.commands() {
                let command_name = command.name().to_lowercase();
                if self.registry.register(command).await {
                    command_names.push(command_name);
                } else {
                    warn!(
                        plugin = %name,
                        command = %command_name,
                        "command name collision, dropping this command"
                    );
                }
            }

            if !command_names.is_empty() {
                any_usable = true;
            }

            info!(
                plugin = %name,
                version = plugin.version(),
                commands = command_names.len(),
                "plugin loaded"
            );

            let record = PluginRecord {
                plugin,
                command_names,
                loaded_at: Utc::now(),
                source: source.to_path_buf(),
                library: library.clone(),
            };

            let key = name.to_lowercase();
            if let Some(old) = records.insert(key, record) {
                // Known hazard, preserved deliberately: the superseded
                // instance's cleanup() is not called, and any of its
                // commands that stayed registered keep shadowing the new
                // ones.
                warn!(
                    plugin = %name,
                    old_source = %old.source.display(),
                    "replacing already-loaded plugin without running its cleanup"
                );
                if let Some(lib) = old.library {
                    self.retire_library(lib);
                }
            }
        }

        any_usable
    }

    /// Unload a plugin by name.
    ///
    /// `cleanup()` runs first: if it fails, the record and every one of
    /// its registered commands stay exactly as they were. Only after a
    /// successful cleanup are the plugin's commands unregistered and the
    /// record removed. Returns `Ok(false)` for an unknown name.
    pub async fn unload(&self, name: &str) -> Result<bool, AgentError> {
        let mut records = self.plugins.lock().await;
        let key = name.to_lowercase();

        let plugin = match records.get(&key) {
            Some(record) => Arc::clone(&record.plugin),
            None => {
                warn!(plugin = %name, "cannot unload unknown plugin");
                return Ok(false);
            }
        };

        if let Err(e) = plugin.cleanup().await {
            warn!(plugin = %name, error = %e, "plugin cleanup failed, leaving plugin loaded");
            return Err(AgentError::PluginUnload(format!(
                "cleanup failed for '{name}': {e}"
            )));
        }

        if let Some(record) = records.remove(&key) {
            for command_name in &record.command_names {
                self.registry.unregister(command_name).await;
            }
            if let Some(lib) = record.library {
                self.retire_library(lib);
            }
            info!(
                plugin = %name,
                commands = record.command_names.len(),
                "plugin unloaded"
            );
        }

        Ok(true)
    }

    /// Scan the plugin directory recursively and load every module found.
    ///
    /// Per-module failures are logged and do not abort the scan. A missing
    /// directory is created and yields an empty scan. Returns the number
    /// of modules that loaded successfully.
    pub async fn load_all(&self) -> usize {
        if !self.plugins_dir.is_dir() {
            match std::fs::create_dir_all(&self.plugins_dir) {
                Ok(()) => {
                    info!(dir = %self.plugins_dir.display(), "created plugin directory");
                }
                Err(e) => {
                    warn!(
                        dir = %self.plugins_dir.display(),
                        error = %e,
                        "cannot create plugin directory"
                    );
                }
            }
            return 0;
        }

        let mut modules = Vec::new();
        collect_modules(&self.plugins_dir, &mut modules);
        modules.sort();

        info!(
            dir = %self.plugins_dir.display(),
            modules = modules.len(),
            "scanning plugin directory"
        );

        let mut loaded = 0;
        for module in modules {
            match self.load(&module).await {
                Ok(true) => loaded += 1,
                Ok(false) => {
                    warn!(module = %module.display(), "module contributed no usable plugins");
                }
                Err(e) => {
                    warn!(module = %module.display(), error = %e, "failed to load plugin module");
                }
            }
        }
        loaded
    }

    /// Unload every tracked plugin, then rescan the plugin directory.
    ///
    /// A plugin whose cleanup fails stays loaded; the subsequent scan may
    /// then replace its record without cleanup (the same preserved hazard
    /// as a duplicate `load`). Returns `(unloaded, loaded)` counts.
    pub async fn reload_all(&self) -> (usize, usize) {
        let names: Vec<String> = self.plugins.lock().await.keys().cloned().collect();

        let mut unloaded = 0;
        for name in names {
            match self.unload(&name).await {
                Ok(true) => unloaded += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(plugin = %name, error = %e, "unload failed during reload, plugin stays loaded");
                }
            }
        }

        let loaded = self.load_all().await;
        (unloaded, loaded)
    }

    /// Whether a plugin with this name is currently tracked.
    pub async fn is_loaded(&self, name: &str) -> bool {
        self.plugins.lock().await.contains_key(&name.to_lowercase())
    }

    /// Number of tracked plugins.
    pub async fn count(&self) -> usize {
        self.plugins.lock().await.len()
    }

    /// Summaries of all tracked plugins, sorted by name.
    pub async fn snapshot(&self) -> Vec<PluginSummary> {
        let records = self.plugins.lock().await;
        let mut summaries: Vec<PluginSummary> = records
            .values()
            .map(|record| PluginSummary {
                name: record.plugin.name().to_string(),
                version: record.plugin.version().to_string(),
                description: record.plugin.description().to_string(),
                commands: record.command_names.clone(),
                loaded_at: record.loaded_at,
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    /// Keep a library mapped after its record is gone. Command handles
    /// cloned out of the registry by in-flight executions may still point
    /// into its code.
    fn retire_library(&self, library: Arc<Library>) {
        if let Ok(mut retired) = self.retired_libraries.lock() {
            retired.push(library);
        }
    }
}

/// Recursively collect plugin library files under `dir`.
fn collect_modules(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot read plugin directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_modules(&path, out);
        } else if loader::is_plugin_library(&path) {
            out.push(path);
        }
    }
}
