//! Build script for the glyphclick CLI
//!
//! Stamps the commit, build time and host into the binary for
//! `glyphclick --version`.

use std::env;
use std::process::Command;

fn main() {
    built::write_built_file().expect("Failed to acquire build-time information");

    let host = env::var("HOST").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=BUILT_HOST={}", host);
    println!("cargo:rustc-env=BUILT_GIT_COMMIT_HASH={}", commit_hash());
    println!(
        "cargo:rustc-env=BUILT_TIME_UTC={}",
        chrono::Utc::now().to_rfc3339()
    );
}

/// `GIT_COMMIT_HASH` when the release pipeline sets it, else ask git
fn commit_hash() -> String {
    if let Ok(hash) = env::var("GIT_COMMIT_HASH") {
        return hash;
    }
    Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|hash| hash.trim().to_string())
        .filter(|hash| !hash.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
