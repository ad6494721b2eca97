//! Clean and purge commands for the ufbt CLI.
//!
//! ## Usage
//!
//! ```bash
//! ufbt clean              # Remove installed SDKs
//! ufbt clean --downloads  # Remove downloaded archives only
//! ufbt clean --purge      # Remove the whole state directory
//! ufbt purge              # Same as clean --purge
//! ```

use anyhow::Result;
use clap::Args;

use crate::config::Config;

/// Arguments for the clean command.
#[derive(Args, Debug, Default)]
pub struct CleanArgs {
    /// Remove downloaded archives instead of installed SDKs.
    #[clap(long, action = clap::ArgAction::SetTrue)]
    pub downloads: bool,

    /// Remove the whole state directory.
    #[clap(long, action = clap::ArgAction::SetTrue)]
    pub purge: bool,
}

/// Executes the clean command.
///
/// # Errors
///
/// Returns an error if a directory cannot be removed.
pub fn execute(args: &CleanArgs, config: &Config) -> Result<()> {
    let paths = &config.state;

    if args.purge {
        println!("Removing ufbt state in {}...", paths.root.display());
        paths.purge()?;
    } else if args.downloads {
        println!("Removing downloads in {}...", paths.download.display());
        paths.clean_downloads()?;
    } else {
        println!("Removing SDKs in {}...", paths.root.display());
        paths.clean_sdks()?;
    }

    println!("Done.");
    Ok(())
}
