//! Capability contracts shared between the shadow-agent daemon and its plugins.
//!
//! A plugin is a cdylib that exports a [`PluginDeclaration`] through the
//! [`declare_plugins!`] macro. The daemon opens the library, checks the
//! compiler and API version markers, and runs the registration entry point
//! to collect [`Plugin`] instances. Each plugin contributes [`Command`]s
//! that become dispatchable over the control socket.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Compiler version this crate was built with.
///
/// Rust has no stable ABI, so the daemon and its plugins must be built by
/// the same compiler. The loader rejects any library whose declaration
/// carries a different value.
pub const RUSTC_VERSION: &str = env!("SHADOW_RUSTC_VERSION");

/// Version of the plugin API itself. Bumped on any breaking change to the
/// traits or the declaration layout.
pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Symbol name of the exported declaration static.
pub const DECLARATION_SYMBOL: &[u8] = b"SHADOW_PLUGIN_DECLARATION\0";

/// Outcome of a command execution.
///
/// Exactly one of `message` / `error` is meaningful: `message` when
/// `success` is true, `error` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub message: String,
    pub error: Option<String>,
}

impl CommandResult {
    /// A successful result carrying a human-readable message.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
        }
    }

    /// A failed result carrying a human-readable error.
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: String::new(),
            error: Some(error.into()),
        }
    }

    /// The error text, or an empty string for successful results.
    pub fn error_text(&self) -> &str {
        self.error.as_deref().unwrap_or("")
    }
}

/// A named, asynchronously executable capability.
///
/// Command names are matched case-insensitively by the registry; a command
/// is immutable once constructed.
#[async_trait]
pub trait Command: Send + Sync {
    /// Name used for dispatch (unique, case-insensitive).
    fn name(&self) -> &str;

    /// One-line description shown by `help`.
    fn description(&self) -> &str;

    /// Execute with the argument vector parsed from the request line.
    async fn execute(&self, args: &[String]) -> CommandResult;
}

/// A loadable unit supplying commands, with lifecycle hooks.
///
/// `initialize` runs once before the plugin's commands are registered;
/// `cleanup` runs before they are unregistered. Both default to no-ops.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Identity key. Two loads of the same name replace each other.
    fn name(&self) -> &str;

    /// Semantic version string.
    fn version(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// The commands this plugin contributes.
    fn commands(&self) -> Vec<Arc<dyn Command>>;

    /// Called once after instantiation, before command registration.
    async fn initialize(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called on unload, before the plugin's commands are unregistered.
    async fn cleanup(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Collects plugin instances from a module's registration entry point.
///
/// One module may register any number of plugins.
pub trait PluginRegistrar {
    fn register(&mut self, plugin: Box<dyn Plugin>);
}

/// The exported entry point of a plugin cdylib.
///
/// The `register` function uses the plain Rust ABI; safety comes from the
/// `rustc_version` check, not from a C-compatible layout.
pub struct PluginDeclaration {
    pub rustc_version: &'static str,
    pub api_version: &'static str,
    pub register: fn(&mut dyn PluginRegistrar),
}

/// Export a [`PluginDeclaration`] under the well-known symbol name.
///
/// ```ignore
/// fn register(registrar: &mut dyn PluginRegistrar) {
///     registrar.register(Box::new(MyPlugin));
/// }
///
/// shadow_plugin_api::declare_plugins!(register);
/// ```
#[macro_export]
macro_rules! declare_plugins {
    ($register:path) => {
        #[no_mangle]
        pub static SHADOW_PLUGIN_DECLARATION: $crate::PluginDeclaration =
            $crate::PluginDeclaration {
                rustc_version: $crate::RUSTC_VERSION,
                api_version: $crate::API_VERSION,
                register: $register,
            };
    };
}
