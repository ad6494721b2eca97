//! Debug command for the ufbt CLI.
//!
//! Attaches GDB to the device through OpenOCD with the firmware symbols and
//! the debug ELFs from `dist/debug/` loaded.

use anyhow::{Result, bail};

use crate::builder::driver::DIST_DIR;
use crate::builder::{DebugSession, GnuArmToolchain, Toolchain};
use crate::config::Config;

/// Executes the debug command.
///
/// # Errors
///
/// Returns an error if the SDK has no firmware image, the debugger cannot be
/// found, or it exits with a non-zero code.
pub async fn execute(config: &Config) -> Result<()> {
    let sdk = config.ensure_sdk().await?;
    let firmware_elf = sdk.firmware_elf();
    if !firmware_elf.is_file() {
        bail!("SDK has no firmware image at {}", firmware_elf.display());
    }
    let debug_dir = sdk.debug_dir();
    let app_debug_dir = config.app_dir.join(DIST_DIR).join("debug");

    let toolchain = GnuArmToolchain::new(&config.toolchain_root)?;
    toolchain.debug_dump(&DebugSession {
        firmware_elf: &firmware_elf,
        debug_dir: &debug_dir,
        app_debug_dir: &app_debug_dir,
    })?;
    Ok(())
}
