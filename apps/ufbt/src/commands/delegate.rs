//! Commands handed to the SDK's build description.
//!
//! `flash_usb`, `flash_blackmagic`, `blackmagic`, `cli`, `lint`, `format`,
//! `create` and `vscode_dist` are implemented by SCons scripts shipped with
//! the SDK. ufbt runs them with the application directory and passes any
//! trailing arguments through unchanged.
//!
//! ```bash
//! ufbt lint
//! ufbt create APPID=my_app
//! ufbt vscode_dist
//! ```

use anyhow::Result;
use clap::Args;

use crate::config::Config;

/// Trailing arguments for a delegated command.
#[derive(Args, Debug, Default)]
pub struct DelegateArgs {
    /// Arguments passed to the SDK scripts.
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Runs the SDK target `target` with the trailing arguments.
///
/// # Errors
///
/// Returns an error if no SDK can be installed, it ships no scripts, or the
/// interpreter exits with a non-zero code (as `UfbtError::ProcessExitCode`).
pub async fn execute(target: &str, args: &DelegateArgs, config: &Config) -> Result<()> {
    let scripts = config.sdk_scripts().await?;
    let argv = command_line(target, &args.args);
    tracing::debug!(?argv, "delegating to SDK scripts");
    scripts.run_scons(&config.app_dir, &argv)?;
    Ok(())
}

fn command_line(target: &str, args: &[String]) -> Vec<String> {
    std::iter::once(target.to_string())
        .chain(args.iter().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_precedes_trailing_arguments() {
        let argv = command_line("create", &["APPID=my_app".to_string(), "-j4".to_string()]);
        assert_eq!(argv, vec!["create", "APPID=my_app", "-j4"]);
    }
}
