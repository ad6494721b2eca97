//! Build command for the ufbt CLI.
//!
//! Builds the applications in the application directory against the active
//! SDK and installs them into `dist/`. This is also what `ufbt` does without
//! a subcommand. An SDK is installed from the release channel first if none
//! is deployed.
//!
//! ## Usage
//!
//! ```bash
//! ufbt                        # Build every application
//! ufbt build --app-id snake   # Build one application
//! ```

use anyhow::{Context, Result};
use clap::Args;

use crate::builder::{BuildArtifactSet, BuildDriver, GnuArmToolchain};
use crate::config::Config;
use crate::project::{AppManifest, discover_apps, select_app};
use crate::sdk::configure;

/// Arguments for the build command.
#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    /// Build only the application with this id.
    #[clap(long = "app-id")]
    pub app_id: Option<String>,
}

/// Executes the build command.
///
/// # Errors
///
/// Returns an error if no SDK can be installed, no application can be
/// selected, or a build step fails.
pub async fn execute(args: &BuildArgs, config: &Config) -> Result<()> {
    if let Some(id) = args.app_id.as_deref() {
        build_selected(config, Some(id)).await?;
        return Ok(());
    }

    let apps = discover_apps(&config.app_dir)?;
    if !apps.iter().any(AppManifest::is_buildable) {
        select_app(&apps, None)?;
    }

    let driver = prepare_driver(config).await?;
    for artifacts in driver.build_all(&apps)? {
        print_artifacts(&artifacts);
    }
    Ok(())
}

/// Builds the one application `app_id` selects, for commands that act on a
/// single application.
///
/// # Errors
///
/// Returns an error if selection or the build fails.
pub async fn build_selected(config: &Config, app_id: Option<&str>) -> Result<(AppManifest, BuildArtifactSet)> {
    let apps = discover_apps(&config.app_dir)?;
    let app = select_app(&apps, app_id)?;
    let driver = prepare_driver(config).await?;
    let artifacts = driver.build(app)?;
    print_artifacts(&artifacts);
    Ok((app.clone(), artifacts))
}

async fn prepare_driver(config: &Config) -> Result<BuildDriver<GnuArmToolchain>> {
    let sdk = config.ensure_sdk().await?;
    let overlay = configure(&sdk).context("Failed to read the SDK build settings")?;
    let toolchain = GnuArmToolchain::new(&config.toolchain_root)?;
    let driver = BuildDriver::new(toolchain, overlay, &config.app_dir)?;
    Ok(driver)
}

fn print_artifacts(artifacts: &BuildArtifactSet) {
    println!(
        "{}: {} ({} bytes)",
        artifacts.app_id,
        artifacts.compact_elf.display(),
        artifacts.validation.size
    );
}

