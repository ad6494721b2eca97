//! Invocation-wide settings.
//!
//! Global flags and environment variables are resolved once into a
//! [`Config`] that every command receives.
//!
//! ## Environment Variables
//!
//! - `UFBT_HOME`: state directory (default `~/.ufbt`)
//! - `UFBT_WORK_DIR`: application directory (default: current directory)
//! - `FBT_TOOLCHAIN_PATH`: toolchain root (default: the state directory)

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;

use crate::builder::SdkScripts;
use crate::sdk::state::UFBT_HOME_ENV;
use crate::sdk::{Bootstrapper, InstalledSdk, SourceOverrides, StatePaths, http_client};

/// Flags accepted by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// ufbt state directory.
    #[clap(long = "ufbt-dir", short = 'd', env = UFBT_HOME_ENV, global = true)]
    pub ufbt_dir: Option<PathBuf>,

    /// Application directory to build.
    #[clap(long = "work-dir", env = "UFBT_WORK_DIR", global = true)]
    pub work_dir: Option<PathBuf>,

    /// Root of the managed toolchain.
    #[clap(long = "toolchain-path", env = "FBT_TOOLCHAIN_PATH", global = true)]
    pub toolchain_path: Option<PathBuf>,

    /// Print debug logs.
    #[clap(long, global = true, action = clap::ArgAction::SetTrue)]
    pub verbose: bool,

    /// Disable TLS certificate verification.
    #[clap(long = "no-check-certificate", global = true, action = clap::ArgAction::SetTrue)]
    pub no_check_certificate: bool,
}

/// Resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    /// State directory layout.
    pub state: StatePaths,
    /// Application directory.
    pub app_dir: PathBuf,
    /// Toolchain root.
    pub toolchain_root: PathBuf,
    /// Skip TLS certificate verification.
    pub insecure: bool,
}

impl Config {
    /// Resolves global flags against defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if neither a state directory nor the home directory
    /// is known, or the current directory cannot be read.
    pub fn from_args(args: &GlobalArgs) -> Result<Self> {
        let state = StatePaths::new(args.ufbt_dir.clone())?;
        let app_dir = match &args.work_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };
        let toolchain_root = args.toolchain_path.clone().unwrap_or_else(|| state.root.clone());
        Ok(Self {
            state,
            app_dir,
            toolchain_root,
            insecure: args.no_check_certificate,
        })
    }

    /// Creates a bootstrapper for the state directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn bootstrapper(&self) -> Result<Bootstrapper> {
        let client = http_client(self.insecure)?;
        Ok(Bootstrapper::new(self.state.clone(), client))
    }

    /// Returns the active SDK.
    ///
    /// # Errors
    ///
    /// Returns an error if no SDK is deployed.
    pub fn installed_sdk(&self) -> Result<InstalledSdk> {
        match self.state.installed_sdk() {
            Some(sdk) => Ok(sdk),
            None => bail!(
                "SDK is not deployed in {}. Run 'ufbt update' to install one.",
                self.state.root.display()
            ),
        }
    }

    /// Returns the active SDK, installing the release channel first when the
    /// state directory has none.
    ///
    /// # Errors
    ///
    /// Returns an error if the automatic installation fails.
    pub async fn ensure_sdk(&self) -> Result<InstalledSdk> {
        if let Some(sdk) = self.state.installed_sdk() {
            return Ok(sdk);
        }
        println!(
            "No SDK found in {}, installing the latest release...",
            self.state.root.display()
        );
        let outcome = self
            .bootstrapper()?
            .update(&SourceOverrides::default_release())
            .await
            .context("Failed to install the default SDK")?;
        println!("Installed SDK {}.", outcome.metadata().version);
        self.installed_sdk()
    }

    /// Returns the script adapter for the active SDK, installing one first
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if no SDK can be installed or it ships no scripts.
    pub async fn sdk_scripts(&self) -> Result<SdkScripts> {
        let sdk = self.ensure_sdk().await?;
        Ok(SdkScripts::new(sdk, &self.state.root, &self.toolchain_root)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toolchain_defaults_to_state_dir() {
        let args = GlobalArgs {
            ufbt_dir: Some(PathBuf::from("/tmp/ufbt-state")),
            work_dir: Some(PathBuf::from("/tmp/app")),
            ..GlobalArgs::default()
        };
        let config = Config::from_args(&args).unwrap();

        assert_eq!(config.state.root, PathBuf::from("/tmp/ufbt-state"));
        assert_eq!(config.toolchain_root, PathBuf::from("/tmp/ufbt-state"));
        assert_eq!(config.app_dir, PathBuf::from("/tmp/app"));
        assert!(!config.insecure);
    }

    #[test]
    fn explicit_toolchain_path() {
        let args = GlobalArgs {
            ufbt_dir: Some(PathBuf::from("/s")),
            toolchain_path: Some(PathBuf::from("/opt/fbt")),
            no_check_certificate: true,
            ..GlobalArgs::default()
        };
        let config = Config::from_args(&args).unwrap();

        assert_eq!(config.toolchain_root, PathBuf::from("/opt/fbt"));
        assert!(config.insecure);
    }

    #[test]
    fn installed_sdk_requires_deployment() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = Config::from_args(&GlobalArgs {
            ufbt_dir: Some(temp.path().to_path_buf()),
            ..GlobalArgs::default()
        })
        .unwrap();

        let err = config.installed_sdk().unwrap_err();
        assert!(err.to_string().contains("SDK is not deployed"));
    }
}
