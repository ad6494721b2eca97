//! Launch command for the ufbt CLI.
//!
//! Builds one application, copies it to the device and starts it with the
//! SDK's `runfap.py`.

use anyhow::Result;
use clap::Args;

use super::build::build_selected;
use crate::config::Config;

/// Arguments for the launch command.
#[derive(Args, Debug, Default)]
pub struct LaunchArgs {
    /// Application to launch; required when the directory holds several.
    #[clap(long = "app-id")]
    pub app_id: Option<String>,
}

/// Executes the launch command.
///
/// # Errors
///
/// Returns an error if the build fails, or `runfap.py` exits with a non-zero
/// code (as `UfbtError::ProcessExitCode`).
pub async fn execute(args: &LaunchArgs, config: &Config) -> Result<()> {
    let (app, artifacts) = build_selected(config, args.app_id.as_deref()).await?;
    let scripts = config.sdk_scripts().await?;

    println!("Launching {} on the device...", app.app_id);
    scripts.launch(&artifacts.compact_elf, app.category.as_deref())?;
    Ok(())
}
