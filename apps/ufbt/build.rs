//! Build script for the ufbt CLI.
//!
//! Embeds the git commit the binary was built from, shown by `ufbt --version`.

use std::process::Command;

fn main() {
    let commit = git_output(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".into());
    println!("cargo:rustc-env=UFBT_GIT_COMMIT={commit}");

    if let Some(root) = git_output(&["rev-parse", "--show-toplevel"]) {
        println!("cargo:rerun-if-changed={root}/.git/HEAD");
    }
}

/// Runs git with `args` and returns trimmed stdout when it succeeds with output.
fn git_output(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if text.is_empty() { None } else { Some(text) }
}
