//! Runs the Python tooling shipped inside an SDK.
//!
//! Commands ufbt does not implement natively are handed to the SDK's build
//! description through SCons. `launch` uses the SDK's `runfap.py`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::platform::HostPlatform;
use super::toolchain::{TOOLCHAIN_PATH_ENV, run, toolchain_bin_dir};
use crate::errors::{UfbtError, UfbtResult};
use crate::sdk::InstalledSdk;

/// Helper that installs and starts an application on the device.
const RUNFAP_SCRIPT: &str = "runfap.py";
/// Install directory on the device's SD card.
const DEVICE_APPS_DIR: &str = "/ext/apps";
/// Category for applications that declare none.
const DEFAULT_CATEGORY: &str = "Misc";

/// Adapter over an SDK's script distribution.
#[derive(Debug, Clone)]
pub struct SdkScripts {
    sdk: InstalledSdk,
    state_dir: PathBuf,
    toolchain_root: PathBuf,
    host: HostPlatform,
}

impl SdkScripts {
    /// Wraps the scripts of `sdk`.
    ///
    /// # Errors
    ///
    /// Returns [`UfbtError::Configuration`] if the SDK has no `scripts/ufbt`
    /// directory or the host is unsupported.
    pub fn new(sdk: InstalledSdk, state_dir: &Path, toolchain_root: &Path) -> UfbtResult<Self> {
        if !sdk.scripts_dir().is_dir() {
            return Err(UfbtError::configuration(
                "SDK is missing scripts distribution; it may be in an outdated format. \
                 Run `ufbt update` to install a current SDK",
            ));
        }
        Ok(Self {
            sdk,
            state_dir: state_dir.to_path_buf(),
            toolchain_root: toolchain_root.to_path_buf(),
            host: HostPlatform::detect()?,
        })
    }

    /// Builds the SCons invocation for `args` against the application in
    /// `app_dir`.
    #[must_use]
    pub fn scons_command(&self, app_dir: &Path, args: &[String]) -> Command {
        let mut cmd = self.python();
        cmd.args(["-m", "SCons", "-Q", "--warn=target-not-built", "-C"])
            .arg(self.sdk.scripts_dir())
            .arg(format!("UFBT_APP_DIR={}", app_dir.display()))
            .args(args);
        cmd
    }

    /// Runs SCons with `args`.
    ///
    /// # Errors
    ///
    /// Returns [`UfbtError::ProcessExitCode`] with SCons' exit code on
    /// failure.
    pub fn run_scons(&self, app_dir: &Path, args: &[String]) -> UfbtResult<()> {
        run(&mut self.scons_command(app_dir, args))
    }

    /// Builds the `runfap.py` invocation installing `fap` into `category`.
    #[must_use]
    pub fn runfap_command(&self, fap: &Path, category: Option<&str>) -> Command {
        let category = category.filter(|c| !c.is_empty()).unwrap_or(DEFAULT_CATEGORY);
        let mut cmd = self.python();
        cmd.arg(self.sdk.tools_dir().join(RUNFAP_SCRIPT))
            .arg(fap)
            .arg("--fap_dst_dir")
            .arg(format!("{DEVICE_APPS_DIR}/{category}"));
        cmd
    }

    /// Installs and starts `fap` on the connected device.
    ///
    /// # Errors
    ///
    /// Returns [`UfbtError::ProcessExitCode`] if `runfap.py` fails.
    pub fn launch(&self, fap: &Path, category: Option<&str>) -> UfbtResult<()> {
        run(&mut self.runfap_command(fap, category))
    }

    fn python(&self) -> Command {
        let mut cmd = Command::new(self.host.python());
        cmd.env("UFBT_HOME", &self.state_dir)
            .env("UFBT_STATE_DIR", &self.state_dir)
            .env(TOOLCHAIN_PATH_ENV, &self.toolchain_root);
        if let Some(path) = self.search_path() {
            cmd.env("PATH", path);
        }
        cmd
    }

    /// `PATH` with the managed toolchain in front, if it exists.
    fn search_path(&self) -> Option<OsString> {
        let bin_dir = toolchain_bin_dir(&self.toolchain_root, self.host);
        if !bin_dir.is_dir() {
            return None;
        }
        let existing = std::env::var_os("PATH").unwrap_or_default();
        let dirs = std::iter::once(bin_dir).chain(std::env::split_paths(&existing));
        std::env::join_paths(dirs).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    fn scripts(temp: &TempDir) -> SdkScripts {
        let sdk_root = temp.path().join("current");
        std::fs::create_dir_all(sdk_root.join("scripts/ufbt")).unwrap();
        SdkScripts::new(InstalledSdk::new(&sdk_root), temp.path(), temp.path()).unwrap()
    }

    #[test]
    fn missing_scripts_is_configuration_error() {
        let temp = TempDir::new().unwrap();
        let err = SdkScripts::new(InstalledSdk::new(temp.path()), temp.path(), temp.path()).unwrap_err();
        assert!(matches!(err, UfbtError::Configuration { .. }));
        assert!(err.to_string().contains("SDK is missing scripts distribution"));
    }

    #[test]
    fn scons_command_line() {
        let temp = TempDir::new().unwrap();
        let cmd = scripts(&temp).scons_command(Path::new("/work/app"), &["lint".into(), "-v".into()]);

        let scripts_dir = temp.path().join("current/scripts/ufbt");
        assert_eq!(
            args_of(&cmd),
            vec![
                "-m".to_string(),
                "SCons".into(),
                "-Q".into(),
                "--warn=target-not-built".into(),
                "-C".into(),
                scripts_dir.to_string_lossy().into_owned(),
                "UFBT_APP_DIR=/work/app".into(),
                "lint".into(),
                "-v".into(),
            ]
        );
        let envs: Vec<_> = cmd.get_envs().map(|(k, _)| k.to_string_lossy().into_owned()).collect();
        assert!(envs.contains(&"UFBT_STATE_DIR".to_string()));
        assert!(envs.contains(&TOOLCHAIN_PATH_ENV.to_string()));
    }

    #[test]
    fn runfap_command_line() {
        let temp = TempDir::new().unwrap();
        let scripts = scripts(&temp);

        let cmd = scripts.runfap_command(Path::new("/work/dist/snake.fap"), Some("Games"));
        let args = args_of(&cmd);
        assert!(args[0].ends_with("scripts/runfap.py"));
        assert_eq!(&args[1..], ["/work/dist/snake.fap", "--fap_dst_dir", "/ext/apps/Games"]);

        let cmd = scripts.runfap_command(Path::new("x.fap"), None);
        assert_eq!(args_of(&cmd).last().map(String::as_str), Some("/ext/apps/Misc"));
    }
}
