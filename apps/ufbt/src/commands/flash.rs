//! Flash command for the ufbt CLI.
//!
//! Writes the active SDK's firmware image to the device over SWD with
//! OpenOCD.

use anyhow::{Result, bail};

use crate::builder::{GnuArmToolchain, Toolchain};
use crate::config::Config;

/// Executes the flash command.
///
/// # Errors
///
/// Returns an error if the SDK has no firmware image, OpenOCD cannot be
/// found, or it exits with a non-zero code.
pub async fn execute(config: &Config) -> Result<()> {
    let sdk = config.ensure_sdk().await?;
    let firmware = sdk.firmware_elf();
    if !firmware.is_file() {
        bail!("SDK has no firmware image at {}", firmware.display());
    }

    let toolchain = GnuArmToolchain::new(&config.toolchain_root)?;
    println!("Flashing {}...", firmware.display());
    toolchain.flash(&firmware, &sdk.debug_dir())?;
    Ok(())
}
