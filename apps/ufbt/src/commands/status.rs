//! Status command for the ufbt CLI.
//!
//! Shows where ufbt keeps its state and which SDK is active.
//!
//! ## Output Format
//!
//! ```text
//! State dir:     /home/user/.ufbt
//! SDK dir:       /home/user/.ufbt/current
//! Download dir:  /home/user/.ufbt/download
//! Target:        f7
//! Version:       0.99.1
//! Mode:          channel
//! Details:       {"channel":"release"}
//! Installed:     2026-10-19 09:12:44 UTC
//! Retained SDKs:
//!   0.98.3 (f7, channel 'release')
//! ```
//!
//! With `--json` the same fields are printed as one JSON object. If no SDK
//! is deployed, `{"error": "SDK is not deployed"}` is printed instead and the
//! command exits with code 1.

use anyhow::{Result, bail};
use clap::Args;
use serde_json::{Value, json};

use crate::config::Config;
use crate::errors::UfbtError;
use crate::sdk::state::{RetainedSdk, SdkMetadata, StatePaths};

const NOT_DEPLOYED: &str = "SDK is not deployed";

/// Arguments for the status command.
#[derive(Args, Debug, Default)]
pub struct StatusArgs {
    /// Print machine-readable JSON.
    #[clap(long, action = clap::ArgAction::SetTrue)]
    pub json: bool,
}

/// Executes the status command.
///
/// # Errors
///
/// Returns an error if no SDK is deployed or the state is unreadable.
pub fn execute(args: &StatusArgs, config: &Config) -> Result<()> {
    let paths = &config.state;
    let Some(metadata) = paths.read_metadata()? else {
        if args.json {
            println!("{}", json!({ "error": NOT_DEPLOYED }));
            return Err(UfbtError::process_exit_code(1).into());
        }
        bail!("{NOT_DEPLOYED}. Run 'ufbt update' to install an SDK.");
    };
    let retained = paths.retained_sdks()?;

    if args.json {
        println!("{}", status_json(paths, &metadata, &retained));
        return Ok(());
    }

    println!("State dir:     {}", paths.root.display());
    println!("SDK dir:       {}", paths.current.display());
    println!("Download dir:  {}", paths.download.display());
    println!("Target:        {}", metadata.hw_target);
    println!("Version:       {}", metadata.version);
    println!("Mode:          {}", metadata.source.mode());
    println!("Details:       {}", source_details(&metadata));
    println!(
        "Installed:     {}",
        metadata.installed_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if !retained.is_empty() {
        println!("Retained SDKs:");
        for sdk in &retained {
            println!(
                "  {} ({}, {})",
                sdk.metadata.version, sdk.metadata.hw_target, sdk.metadata.source
            );
        }
    }
    Ok(())
}

/// Source fields without the `mode` tag.
fn source_details(metadata: &SdkMetadata) -> Value {
    let mut details = serde_json::to_value(&metadata.source).unwrap_or(Value::Null);
    if let Some(object) = details.as_object_mut() {
        object.remove("mode");
    }
    details
}

fn status_json(paths: &StatePaths, metadata: &SdkMetadata, retained: &[RetainedSdk]) -> Value {
    json!({
        "state_dir": paths.root,
        "sdk_dir": paths.current,
        "download_dir": paths.download,
        "target": metadata.hw_target,
        "version": metadata.version,
        "mode": metadata.source.mode(),
        "details": source_details(metadata),
        "installed_at": metadata.installed_at,
        "retained": retained
            .iter()
            .map(|sdk| json!({
                "dir": sdk.dir,
                "version": sdk.metadata.version,
                "target": sdk.metadata.hw_target,
                "mode": sdk.metadata.source.mode(),
            }))
            .collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::ChannelName;
    use crate::sdk::source::SdkSource;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn metadata() -> SdkMetadata {
        SdkMetadata {
            source: SdkSource::Channel {
                channel: ChannelName::release(),
                index_url: None,
            },
            version: "0.99.1".to_string(),
            hw_target: "f7".to_string(),
            installed_at: Utc.with_ymd_and_hms(2026, 10, 19, 9, 12, 44).unwrap(),
        }
    }

    #[test]
    fn json_has_status_fields() {
        let paths = StatePaths::with_root(PathBuf::from("/state"));
        let retained = vec![RetainedSdk {
            dir: PathBuf::from("/state/sdks/0.98.3-f7"),
            metadata: SdkMetadata {
                version: "0.98.3".to_string(),
                ..metadata()
            },
        }];

        let value = status_json(&paths, &metadata(), &retained);

        assert_eq!(value["target"], "f7");
        assert_eq!(value["mode"], "channel");
        assert_eq!(value["version"], "0.99.1");
        assert_eq!(value["details"], json!({ "channel": "release" }));
        assert_eq!(value["sdk_dir"], "/state/current");
        assert_eq!(value["retained"][0]["version"], "0.98.3");
    }

    #[test]
    fn details_omit_mode_tag() {
        let details = source_details(&SdkMetadata {
            source: SdkSource::Url {
                url: "https://example.com/sdk.zip".to_string(),
            },
            ..metadata()
        });
        assert_eq!(details, json!({ "url": "https://example.com/sdk.zip" }));
    }
}
