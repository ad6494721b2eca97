//! Rollback command for the ufbt CLI.
//!
//! Switches back to the most recently installed SDK kept in `sdks/`.

use anyhow::{Context, Result};

use crate::config::Config;

/// Executes the rollback command.
///
/// # Errors
///
/// Returns an error if no prior SDK is retained or the switch fails.
pub fn execute(config: &Config) -> Result<()> {
    let metadata = config
        .state
        .rollback()
        .context("Failed to roll back the SDK")?;
    println!(
        "Switched to SDK {} for {} from {}.",
        metadata.version, metadata.hw_target, metadata.source
    );
    Ok(())
}
