#![warn(clippy::pedantic)]

//! # micro Flipper Build Tool (ufbt)
//!
//! The `ufbt` command builds Flipper Zero applications against a prebuilt
//! SDK. It installs and switches SDKs, builds applications found in the
//! current directory, and drives flashing and debugging.
//!
//! ## Subcommands
//!
//! - `update` - Install or refresh the SDK
//! - `status` - Show the active SDK
//! - `clean` / `purge` - Remove SDKs, downloads or all state
//! - `rollback` - Switch back to the previous SDK
//! - `build` - Build applications (the default)
//! - `launch` - Build and start an application on the device
//! - `flash` - Flash the SDK's firmware
//! - `debug` - Attach GDB to the device
//! - `flash_usb`, `flash_blackmagic`, `blackmagic`, `cli`, `lint`, `format`,
//!   `create`, `vscode_dist` - Run by the SDK's own scripts
//!
//! ## Examples
//!
//! Install the release SDK and build the application in the current
//! directory:
//! ```bash
//! ufbt update --channel release
//! ufbt
//! ```
//!
//! Build one of several applications and run it:
//! ```bash
//! ufbt launch --app-id snake_game
//! ```

mod builder;
mod commands;
mod config;
mod errors;
mod project;
mod sdk;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{build, clean, debug, delegate, flash, launch, rollback, status, update};
use config::{Config, GlobalArgs};
use errors::UfbtError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// micro Flipper Build Tool.
#[derive(Parser)]
#[command(
    name = "ufbt",
    author,
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("UFBT_GIT_COMMIT"), ")"),
    about = "Build Flipper Zero applications against a prebuilt SDK",
    after_help = "\
ENVIRONMENT VARIABLES:
    UFBT_HOME               State directory (default: ~/.ufbt)
    UFBT_WORK_DIR           Application directory (default: current directory)
    FBT_TOOLCHAIN_PATH      Toolchain root (default: the state directory)
    RUST_LOG                Log filter, e.g. ufbt=debug"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// The subcommand to execute; builds when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands for the ufbt CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Install or refresh the SDK.
    ///
    /// Without a source flag, the source of the previous update is reused.
    Update(update::UpdateArgs),

    /// Show the active SDK and state directories.
    Status(status::StatusArgs),

    /// Remove installed SDKs, downloads, or the whole state directory.
    Clean(clean::CleanArgs),

    /// Remove the whole state directory.
    Purge,

    /// Switch back to the previously installed SDK.
    Rollback,

    /// Build applications into dist/.
    Build(build::BuildArgs),

    /// Build an application, copy it to the device and start it.
    Launch(launch::LaunchArgs),

    /// Flash the SDK's firmware over SWD.
    Flash,

    /// Attach GDB to the device.
    Debug,

    /// Flash the SDK's firmware over USB.
    #[command(name = "flash_usb")]
    FlashUsb(delegate::DelegateArgs),

    /// Flash the SDK's firmware with a Black Magic probe.
    #[command(name = "flash_blackmagic")]
    FlashBlackmagic(delegate::DelegateArgs),

    /// Attach GDB through a Black Magic probe.
    Blackmagic(delegate::DelegateArgs),

    /// Open the device's serial console.
    Cli(delegate::DelegateArgs),

    /// Check application sources for formatting issues.
    Lint(delegate::DelegateArgs),

    /// Format application sources.
    Format(delegate::DelegateArgs),

    /// Create an application from the SDK template.
    Create(delegate::DelegateArgs),

    /// Install VSCode settings for the application.
    #[command(name = "vscode_dist")]
    VscodeDist(delegate::DelegateArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

/// Handles an error and returns the appropriate exit code.
///
/// For `ProcessExitCode` errors, returns the embedded exit code without
/// printing an error message (the subprocess already printed its output).
/// For all other errors, prints the error and returns exit code 1.
fn handle_error(e: &anyhow::Error) -> i32 {
    if let Some(UfbtError::ProcessExitCode { code }) = e.downcast_ref::<UfbtError>() {
        return *code;
    }
    eprintln!("Error: {e:?}");
    1
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);
    let config = Config::from_args(&cli.global)?;

    let Some(command) = cli.command else {
        return build::execute(&build::BuildArgs::default(), &config).await;
    };

    match command {
        Commands::Update(args) => update::execute(&args, &config).await,
        Commands::Status(args) => status::execute(&args, &config),
        Commands::Clean(args) => clean::execute(&args, &config),
        Commands::Purge => clean::execute(
            &clean::CleanArgs {
                purge: true,
                ..clean::CleanArgs::default()
            },
            &config,
        ),
        Commands::Rollback => rollback::execute(&config),
        Commands::Build(args) => build::execute(&args, &config).await,
        Commands::Launch(args) => launch::execute(&args, &config).await,
        Commands::Flash => flash::execute(&config).await,
        Commands::Debug => debug::execute(&config).await,
        Commands::FlashUsb(args) => delegate::execute("flash_usb", &args, &config).await,
        Commands::FlashBlackmagic(args) => {
            delegate::execute("flash_blackmagic", &args, &config).await
        }
        Commands::Blackmagic(args) => delegate::execute("blackmagic", &args, &config).await,
        Commands::Cli(args) => delegate::execute("cli", &args, &config).await,
        Commands::Lint(args) => delegate::execute("lint", &args, &config).await,
        Commands::Format(args) => delegate::execute("format", &args, &config).await,
        Commands::Create(args) => delegate::execute("create", &args, &config).await,
        Commands::VscodeDist(args) => delegate::execute("vscode_dist", &args, &config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delegated_commands_keep_trailing_arguments() {
        let cli = Cli::parse_from(["ufbt", "flash_usb", "--", "-v", "ARGS=1"]);
        match cli.command {
            Some(Commands::FlashUsb(args)) => assert_eq!(args.args, vec!["-v", "ARGS=1"]),
            _ => panic!("expected flash_usb"),
        }
        assert!(matches!(
            Cli::parse_from(["ufbt", "vscode_dist"]).command,
            Some(Commands::VscodeDist(_))
        ));
    }

    #[test]
    fn no_subcommand_builds() {
        let cli = Cli::parse_from(["ufbt"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn channel_values_are_restricted() {
        assert!(Cli::try_parse_from(["ufbt", "update", "--channel", "nightly"]).is_err());
        assert!(Cli::try_parse_from(["ufbt", "update", "--channel", "rc", "--branch", "dev"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["ufbt", "status", "--json", "--ufbt-dir", "/tmp/x", "--verbose"]);
        assert_eq!(cli.global.ufbt_dir.as_deref(), Some(std::path::Path::new("/tmp/x")));
        assert!(cli.global.verbose);
    }

    #[test]
    fn process_exit_code_is_forwarded() {
        let err: anyhow::Error = UfbtError::process_exit_code(7).into();
        assert_eq!(handle_error(&err), 7);
        assert_eq!(handle_error(&anyhow::anyhow!("boom")), 1);
    }
}
