//! Build script for ivts-ts
//!
//! Stamps the binary with the revision it was built from, reported in the
//! startup banner and by `GET /health`:
//! - `IVTS_GIT_REVISION`: short commit hash, `-dirty` when the tree has
//!   uncommitted changes, `unknown` outside a git checkout
//! - `IVTS_BUILT_AT`: UTC build time, taken from `SOURCE_DATE_EPOCH` when set
//! - `IVTS_BUILD_PROFILE`: cargo profile (debug/release)

use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn built_at() -> String {
    let epoch = std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|raw| raw.parse::<i64>().ok())
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0));

    epoch
        .unwrap_or_else(chrono::Utc::now)
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

fn main() {
    let revision = match git(&["rev-parse", "--short=8", "HEAD"]) {
        Some(hash) => match git(&["status", "--porcelain", "--untracked-files=no"]) {
            Some(changes) if !changes.is_empty() => format!("{}-dirty", hash),
            _ => hash,
        },
        None => "unknown".to_string(),
    };

    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=IVTS_GIT_REVISION={}", revision);
    println!("cargo:rustc-env=IVTS_BUILT_AT={}", built_at());
    println!("cargo:rustc-env=IVTS_BUILD_PROFILE={}", profile);

    // Only rerun when the checkout moves, not on every build
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=../.git/index");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
}
