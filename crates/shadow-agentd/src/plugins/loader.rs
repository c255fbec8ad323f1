//! Dynamic module loading through `libloading`.
//!
//! A plugin library exports a `SHADOW_PLUGIN_DECLARATION` static (via
//! `shadow_plugin_api::declare_plugins!`). The loader opens the library,
//! verifies the compiler and API version markers, and runs the declared
//! registration entry point to collect plugin instances.

use std::path::Path;

use libloading::Library;
use shadow_plugin_api::{
    Plugin, PluginDeclaration, PluginRegistrar, API_VERSION, DECLARATION_SYMBOL, RUSTC_VERSION,
};
use shadow_types::AgentError;
use tracing::debug;

/// A successfully opened plugin module.
///
/// The library must stay alive for as long as any plugin or command it
/// produced is reachable; dropping it unmaps the code they point into.
pub struct LoadedModule {
    pub library: Library,
    pub plugins: Vec<Box<dyn Plugin>>,
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModule")
            .field("library", &self.library)
            .field("plugins", &self.plugins.len())
            .finish()
    }
}

struct Collector {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginRegistrar for Collector {
    fn register(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }
}

/// Whether a path looks like a loadable plugin library on this platform.
pub fn is_plugin_library(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext == std::env::consts::DLL_EXTENSION)
}

/// Open `path` and collect every plugin its declaration registers.
///
/// Fails if the library cannot be opened, lacks the declaration symbol,
/// was built by a different compiler or plugin API version, or registers
/// no plugins at all.
pub fn load_declared_plugins(path: &Path) -> Result<LoadedModule, AgentError> {
    // SAFETY: loading a library runs its initializers; we only load files
    // whose declaration matches our compiler and API version exactly.
    let library = unsafe { Library::new(path) }.map_err(|e| {
        AgentError::PluginLoad(format!("failed to open {}: {e}", path.display()))
    })?;

    let declaration = unsafe {
        library
            .get::<*const PluginDeclaration>(DECLARATION_SYMBOL)
            .map_err(|e| {
                AgentError::PluginLoad(format!(
                    "{} exports no plugin declaration: {e}",
                    path.display()
                ))
            })?
            .read()
    };

    if declaration.rustc_version != RUSTC_VERSION {
        return Err(AgentError::PluginLoad(format!(
            "{}: compiler mismatch (plugin: {}, host: {})",
            path.display(),
            declaration.rustc_version,
            RUSTC_VERSION
        )));
    }
    if declaration.api_version != API_VERSION {
        return Err(AgentError::PluginLoad(format!(
            "{}: plugin API mismatch (plugin: {}, host: {})",
            path.display(),
            declaration.api_version,
            API_VERSION
        )));
    }

    let mut collector = Collector {
        plugins: Vec::new(),
    };
    (declaration.register)(&mut collector);

    if collector.plugins.is_empty() {
        return Err(AgentError::PluginLoad(format!(
            "{}: declaration registered no plugins",
            path.display()
        )));
    }

    debug!(
        path = %path.display(),
        plugins = collector.plugins.len(),
        "loaded plugin module"
    );

    Ok(LoadedModule {
        library,
        plugins: collector.plugins,
    })
}
