//! Loads the real sys-info plugin cdylib through the manager.
//!
//! The cdylib must be built before running these tests:
//!   cargo build -p shadow-sysinfo && cargo test --test test_plugin_cdylib -- --ignored

use std::path::PathBuf;
use std::sync::{Arc, Once};

use shadow_agentd::plugins::PluginManager;
use shadow_agentd::registry::CommandRegistry;

static BUILD_ONCE: Once = Once::new();

/// Ensure the plugin cdylib is built, then return its path.
fn sysinfo_cdylib() -> PathBuf {
    let workspace_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("crate dir should sit two levels under the workspace")
        .to_path_buf();

    BUILD_ONCE.call_once(|| {
        let status = std::process::Command::new("cargo")
            .args(["build", "-p", "shadow-sysinfo"])
            .current_dir(&workspace_root)
            .status()
            .expect("failed to invoke cargo build");
        assert!(status.success(), "cargo build -p shadow-sysinfo failed");
    });

    let lib = workspace_root.join("target").join("debug").join(format!(
        "{}shadow_sysinfo.{}",
        std::env::consts::DLL_PREFIX,
        std::env::consts::DLL_EXTENSION
    ));
    assert!(lib.exists(), "cdylib not found at {}", lib.display());
    lib
}

fn manager() -> (Arc<CommandRegistry>, PluginManager) {
    let registry = Arc::new(CommandRegistry::new());
    let manager = PluginManager::new(Arc::clone(&registry), PathBuf::from("/nonexistent"));
    (registry, manager)
}

#[tokio::test]
#[ignore] // builds the cdylib with cargo; run explicitly
async fn load_exposes_plugin_commands() {
    let (registry, manager) = manager();
    let loaded = manager.load(&sysinfo_cdylib()).await.expect("load");
    assert!(loaded);

    assert!(manager.is_loaded("sys-info").await);
    let hostname = registry.lookup("hostname").await.expect("hostname command");
    let result = hostname.execute(&[]).await;
    assert!(result.success);
    assert!(!result.message.is_empty());
}

#[tokio::test]
#[ignore] // builds the cdylib with cargo; run explicitly
async fn unload_removes_plugin_commands() {
    let (registry, manager) = manager();
    manager.load(&sysinfo_cdylib()).await.expect("load");
    assert!(registry.contains("uptime").await);
    assert!(registry.contains("hostname").await);

    assert!(manager.unload("sys-info").await.expect("unload"));
    assert!(!registry.contains("uptime").await);
    assert!(!registry.contains("hostname").await);
    assert!(!manager.is_loaded("sys-info").await);
}

#[tokio::test]
#[ignore] // builds the cdylib with cargo; run explicitly
async fn duplicate_load_keeps_single_record() {
    let (registry, manager) = manager();
    let lib = sysinfo_cdylib();

    assert!(manager.load(&lib).await.expect("first load"));
    // second load of the same identity: record replaced, old commands
    // stay bound so the new ones are dropped on collision
    let second = manager.load(&lib).await.expect("second load");
    assert!(!second, "second load should register no new commands");

    assert_eq!(manager.count().await, 1);
    assert!(registry.contains("uptime").await);
}
