//! Update command for the ufbt CLI.
//!
//! Installs or refreshes the SDK. Without a source flag the source recorded
//! by the previous update is reused.
//!
//! ## Usage
//!
//! ```bash
//! ufbt update                    # Refresh from the recorded source
//! ufbt update --channel dev      # Switch to the development channel
//! ufbt update --branch feature/x # Install a branch build
//! ufbt update --url https://...  # Install a specific archive
//! ufbt update --local sdk.zip    # Install a local archive or tree
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::config::Config;
use crate::sdk::{ChannelName, DeployOutcome, SourceOverrides};

/// Arguments for the update command.
#[derive(Args, Debug, Default)]
pub struct UpdateArgs {
    /// Update channel to install from.
    #[clap(
        long,
        short = 'c',
        value_parser = [ChannelName::DEV, ChannelName::RC, ChannelName::RELEASE],
        conflicts_with_all = ["branch", "url", "local"]
    )]
    pub channel: Option<String>,

    /// Firmware branch to install from.
    #[clap(long, short = 'b', conflicts_with_all = ["url", "local"])]
    pub branch: Option<String>,

    /// SDK archive URL.
    #[clap(long, short = 'u', conflicts_with = "local")]
    pub url: Option<String>,

    /// Local SDK archive or unpacked SDK directory.
    #[clap(long, short = 'l')]
    pub local: Option<PathBuf>,

    /// Channel directory (for --channel) or branch root (for --branch) URL.
    #[clap(long = "index-url")]
    pub index_url: Option<String>,

    /// Hardware target.
    #[clap(long = "hw-target", short = 't')]
    pub hw_target: Option<String>,

    /// Reinstall even if the SDK is up to date.
    #[clap(long, short = 'f', action = clap::ArgAction::SetTrue)]
    pub force: bool,
}

impl UpdateArgs {
    fn overrides(&self) -> SourceOverrides {
        SourceOverrides {
            channel: self.channel.as_deref().map(ChannelName::new),
            branch: self.branch.clone(),
            url: self.url.clone(),
            local: self.local.clone(),
            index_url: self.index_url.clone(),
            hw_target: self.hw_target.clone(),
            force: self.force,
        }
    }
}

/// Executes the update command.
///
/// # Errors
///
/// Returns an error if no source can be determined, the SDK cannot be
/// fetched, or the fetched SDK is unusable. The installed SDK is left
/// untouched in every failure case.
pub async fn execute(args: &UpdateArgs, config: &Config) -> Result<()> {
    let overrides = args.overrides();
    if !overrides.has_explicit_source() {
        tracing::info!("no source given, reusing the recorded one");
    }

    let mut bootstrapper = config.bootstrapper()?;
    match bootstrapper.update(&overrides).await? {
        DeployOutcome::Installed { metadata } => {
            println!(
                "Deployed SDK {} for {} from {}.",
                metadata.version, metadata.hw_target, metadata.source
            );
        }
        DeployOutcome::UpToDate { metadata } => {
            println!(
                "SDK {} for {} is up to date. Use --force to reinstall.",
                metadata.version, metadata.hw_target
            );
        }
    }
    Ok(())
}
