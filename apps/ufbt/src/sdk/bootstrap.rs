//! SDK installation.
//!
//! [`Bootstrapper::update`] moves through
//! `Idle -> Resolving -> Downloading -> Unpacking -> Swapping -> Done`, or to
//! `Failed` from any step after `Idle`. The SDK is unpacked into a fresh
//! directory under `sdks/` and only becomes active when `current` is
//! switched to it, so a failed run never changes the active SDK.

use chrono::Utc;
use std::fmt;
use std::path::{Path, PathBuf};

use super::archive::{copy_tree, extract_archive};
use super::download::download_to_dir;
use super::index::{ArtifactLocation, BRANCH_ROOT_URL, IndexClient, OFFICIAL_INDEX_URL, ResolvedArtifact};
use super::options::configure;
use super::source::{DeployTask, SdkSource, SourceOverrides, resolve_task};
use super::state::{InstalledSdk, RETAINED_SDKS, SdkMetadata, StatePaths};
use super::verify::verify_checksum;
use crate::errors::{UfbtError, UfbtResult};

/// Step of an update run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployPhase {
    /// Nothing started yet.
    Idle,
    /// Picking the source and looking it up in the index.
    Resolving,
    /// Fetching the archive.
    Downloading,
    /// Extracting and validating the archive in a staging directory.
    Unpacking,
    /// Writing metadata and switching `current`.
    Swapping,
    /// Finished successfully.
    Done,
    /// Aborted; the active SDK is unchanged.
    Failed,
}

impl fmt::Display for DeployPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::Downloading => "downloading",
            Self::Unpacking => "unpacking",
            Self::Swapping => "swapping",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a successful update run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// A new SDK was installed and activated.
    Installed {
        /// Metadata of the new SDK.
        metadata: SdkMetadata,
    },
    /// The active SDK already matched; nothing was changed.
    UpToDate {
        /// Metadata of the active SDK.
        metadata: SdkMetadata,
    },
}

impl DeployOutcome {
    /// Metadata of the SDK that is active after the run.
    #[must_use]
    pub fn metadata(&self) -> &SdkMetadata {
        match self {
            Self::Installed { metadata } | Self::UpToDate { metadata } => metadata,
        }
    }
}

/// Installs SDKs into a state directory.
#[derive(Debug)]
pub struct Bootstrapper {
    paths: StatePaths,
    client: reqwest::Client,
    index: IndexClient,
    phase: DeployPhase,
}

impl Bootstrapper {
    /// Creates a bootstrapper for `paths`, issuing requests through `client`.
    #[must_use]
    pub fn new(paths: StatePaths, client: reqwest::Client) -> Self {
        Self {
            paths,
            index: IndexClient::new(client.clone()),
            client,
            phase: DeployPhase::Idle,
        }
    }

    /// Installs the SDK selected by `overrides` and the persisted state.
    ///
    /// # Errors
    ///
    /// - [`UfbtError::Configuration`] if no source can be determined
    /// - [`UfbtError::NotFound`] if the index has no matching SDK
    /// - [`UfbtError::Download`] if fetching fails
    /// - [`UfbtError::CorruptArchive`] if the archive is unusable
    /// - [`UfbtError::MalformedSdk`] if its option manifest lacks a key
    pub async fn update(&mut self, overrides: &SourceOverrides) -> UfbtResult<DeployOutcome> {
        match self.run(overrides).await {
            Ok(outcome) => {
                self.transition(DeployPhase::Done);
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!("SDK update failed while {}: {e}", self.phase);
                self.transition(DeployPhase::Failed);
                Err(e)
            }
        }
    }

    async fn run(&mut self, overrides: &SourceOverrides) -> UfbtResult<DeployOutcome> {
        self.transition(DeployPhase::Resolving);
        let persisted = self.paths.read_metadata()?;
        let task = resolve_task(overrides, persisted.as_ref())?;
        tracing::info!("deploying SDK for {} from {}", task.hw_target, task.source);

        let artifact = self.index.resolve(&task.source, &task.hw_target).await?;

        if let Some(current) = persisted.filter(|current| !task.force && is_up_to_date(current, &task, &artifact)) {
            tracing::info!("SDK is up-to-date");
            return Ok(DeployOutcome::UpToDate { metadata: current });
        }

        self.transition(DeployPhase::Downloading);
        let archive = self.fetch(&artifact).await?;

        self.transition(DeployPhase::Unpacking);
        let staging = self
            .paths
            .new_staging_dir(&artifact.version, &task.hw_target);
        if let Err(e) = unpack(&archive, &staging) {
            discard(&staging);
            return Err(e);
        }

        self.transition(DeployPhase::Swapping);
        let metadata = SdkMetadata {
            source: task.source,
            version: artifact.version,
            hw_target: task.hw_target,
            installed_at: Utc::now(),
        };
        if let Err(e) = metadata
            .write_to(&staging)
            .and_then(|()| self.paths.activate(&staging))
        {
            discard(&staging);
            return Err(e);
        }
        tracing::info!("SDK {} deployed to {}", metadata.version, staging.display());

        self.paths.prune(RETAINED_SDKS);
        Ok(DeployOutcome::Installed { metadata })
    }

    async fn fetch(&self, artifact: &ResolvedArtifact) -> UfbtResult<PathBuf> {
        let path = match &artifact.location {
            ArtifactLocation::Remote(url) => {
                tracing::info!("fetching SDK from {url}");
                download_to_dir(&self.client, url, &self.paths.download).await?
            }
            ArtifactLocation::Local(path) => {
                if !path.exists() {
                    return Err(UfbtError::not_found(format!(
                        "local SDK {} does not exist",
                        path.display()
                    )));
                }
                path.clone()
            }
        };

        if let Some(expected) = &artifact.sha256 {
            verify_checksum(&path, expected)?;
            tracing::debug!("checksum verified for {}", path.display());
        }
        Ok(path)
    }

    fn transition(&mut self, next: DeployPhase) {
        tracing::debug!(from = %self.phase, to = %next, "deploy phase");
        self.phase = next;
    }
}

/// Fills in the default index locations so that equivalent sources compare equal.
fn effective_source(source: &SdkSource) -> SdkSource {
    match source {
        SdkSource::Channel { channel, index_url } => SdkSource::Channel {
            channel: channel.clone(),
            index_url: Some(index_url.clone().unwrap_or_else(|| OFFICIAL_INDEX_URL.to_string())),
        },
        SdkSource::Branch {
            branch,
            branch_root_url,
        } => SdkSource::Branch {
            branch: branch.clone(),
            branch_root_url: Some(
                branch_root_url
                    .as_deref()
                    .unwrap_or(BRANCH_ROOT_URL)
                    .trim_end_matches('/')
                    .to_string(),
            ),
        },
        other => other.clone(),
    }
}

fn is_up_to_date(current: &SdkMetadata, task: &DeployTask, artifact: &ResolvedArtifact) -> bool {
    if !current.has_known_version() {
        tracing::info!("SDK is unversioned, updating");
        return false;
    }
    current.version == artifact.version
        && current.hw_target == task.hw_target
        && effective_source(&current.source) == effective_source(&task.source)
}

/// Unpacks `archive` into `staging` and checks that the result is a usable SDK.
fn unpack(archive: &Path, staging: &Path) -> UfbtResult<()> {
    if archive.is_dir() {
        copy_tree(archive, staging)?;
    } else {
        extract_archive(archive, staging)?;
    }
    configure(&InstalledSdk::new(staging))?;
    Ok(())
}

fn discard(staging: &Path) {
    if let Err(e) = std::fs::remove_dir_all(staging)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!("failed to remove staging directory {}: {e}", staging.display());
    }
}
