use std::process::Command;

fn main() {
    // Bake the compiler version into the crate so the daemon can refuse
    // plugin cdylibs built with a different rustc (no stable Rust ABI).
    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let version = Command::new(rustc)
        .arg("--version")
        .output()
        .ok()
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=SHADOW_RUSTC_VERSION={version}");
}
