//! On-disk state for installed SDKs.
//!
//! The state directory defaults to `~/.ufbt/` and can be overridden with the
//! `UFBT_HOME` environment variable or `--ufbt-dir`.
//!
//! ## Directory Structure
//!
//! ```text
//! ~/.ufbt/                                # Root directory (or UFBT_HOME)
//!   current -> sdks/1.2.0-f7-20240101...  # Link to the active SDK
//!   sdks/
//!     1.2.0-f7-20240101120000-3fa2/       # Unpacked SDK tree
//!       ufbt_state.json                   # SdkMetadata for this tree
//!       sdk_headers/sdk.opts
//!       scripts/ufbt/
//!     1.1.0-f7-20231201090000-b01c/       # Retained prior SDK
//!   download/                             # Fetched archives
//!   toolchain/<host>/                     # Managed cross toolchain
//! ```
//!
//! `current` is only ever replaced by renaming a freshly created link over
//! it, so a reader sees either the old SDK or the new one. Older tools left
//! `current` as a plain directory; such a directory is moved into `sdks/`
//! the first time a new SDK is activated.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::source::SdkSource;
use crate::errors::{UfbtError, UfbtResult};

/// Environment variable overriding the state directory.
pub const UFBT_HOME_ENV: &str = "UFBT_HOME";

/// Metadata file stored in the root of every installed SDK tree.
pub const STATE_FILE_NAME: &str = "ufbt_state.json";

/// Version recorded for SDKs whose version cannot be determined.
pub const VERSION_UNKNOWN: &str = "unknown";

/// Number of prior SDKs kept next to the active one.
pub const RETAINED_SDKS: usize = 2;

/// Describes how and when an SDK tree was installed.
///
/// The source fields are flattened next to the other keys, so a file looks
/// like `{"mode": "channel", "channel": "release", "version": "0.99.1",
/// "hw_target": "f7", "installed_at": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkMetadata {
    /// Where the SDK came from.
    #[serde(flatten)]
    pub source: SdkSource,
    /// Resolved version, or [`VERSION_UNKNOWN`].
    pub version: String,
    /// Hardware target the SDK was fetched for.
    pub hw_target: String,
    /// Installation time. Files written by older tools lack it and read as the epoch.
    #[serde(default)]
    pub installed_at: DateTime<Utc>,
}

impl SdkMetadata {
    /// Returns `true` if the version is known.
    #[must_use]
    pub fn has_known_version(&self) -> bool {
        self.version != VERSION_UNKNOWN
    }

    /// Reads the metadata stored in `sdk_dir`.
    ///
    /// Returns `Ok(None)` if the tree has no metadata file.
    ///
    /// # Errors
    ///
    /// Returns [`UfbtError::State`] if the file exists but cannot be read or parsed.
    pub fn read_from(sdk_dir: &Path) -> UfbtResult<Option<Self>> {
        let path = sdk_dir.join(STATE_FILE_NAME);
        if !path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| UfbtError::state(format!("cannot read {}: {e}", path.display())))?;
        let metadata = serde_json::from_str(&content)
            .map_err(|e| UfbtError::state(format!("cannot parse {}: {e}", path.display())))?;
        Ok(Some(metadata))
    }

    /// Writes the metadata into `sdk_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`UfbtError::Io`] if the file cannot be written.
    pub fn write_to(&self, sdk_dir: &Path) -> UfbtResult<()> {
        let path = sdk_dir.join(STATE_FILE_NAME);
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| UfbtError::state(format!("cannot serialize SDK metadata: {e}")))?;
        std::fs::write(&path, content)
            .map_err(|e| UfbtError::io(format!("failed to write {}", path.display()), e))
    }
}

/// An unpacked SDK tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledSdk {
    /// Root of the tree.
    pub root: PathBuf,
}

impl InstalledSdk {
    /// Option manifest locations, relative to the SDK root, in lookup order.
    const OPTIONS_CANDIDATES: [&'static str; 2] = ["sdk_headers/sdk.opts", "sdk.opts"];

    /// Wraps an SDK tree rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the option manifest path if the tree contains one.
    #[must_use]
    pub fn options_path(&self) -> Option<PathBuf> {
        Self::OPTIONS_CANDIDATES
            .iter()
            .map(|relative| self.root.join(relative))
            .find(|path| path.is_file())
    }

    /// Directory holding the build-description scripts run by the interpreter.
    #[must_use]
    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join("scripts").join("ufbt")
    }

    /// Directory holding helper scripts such as `runfap.py`.
    #[must_use]
    pub fn tools_dir(&self) -> PathBuf {
        self.root.join("scripts")
    }

    /// Firmware image flashed by `ufbt flash`.
    #[must_use]
    pub fn firmware_elf(&self) -> PathBuf {
        self.root.join("firmware.elf")
    }

    /// Directory holding debugger configuration.
    #[must_use]
    pub fn debug_dir(&self) -> PathBuf {
        self.root.join("debug")
    }
}

/// A prior SDK kept in `sdks/`.
#[derive(Debug, Clone)]
pub struct RetainedSdk {
    /// The SDK tree.
    pub dir: PathBuf,
    /// Its metadata.
    pub metadata: SdkMetadata,
}

/// Paths of the ufbt state directory.
#[derive(Debug, Clone)]
pub struct StatePaths {
    /// Root directory (`~/.ufbt` or `UFBT_HOME`).
    pub root: PathBuf,
    /// Link to the active SDK tree.
    pub current: PathBuf,
    /// Installed SDK trees.
    pub sdks: PathBuf,
    /// Fetched archives.
    pub download: PathBuf,
}

impl StatePaths {
    /// Creates paths rooted at `root`, or at `~/.ufbt` when `root` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`UfbtError::Configuration`] if no root is given and the home
    /// directory cannot be determined.
    pub fn new(root: Option<PathBuf>) -> UfbtResult<Self> {
        let root = match root {
            Some(root) => root,
            None => dirs::home_dir()
                .ok_or_else(|| {
                    UfbtError::configuration(format!(
                        "cannot determine home directory; set {UFBT_HOME_ENV} or pass --ufbt-dir"
                    ))
                })?
                .join(".ufbt"),
        };
        Ok(Self::with_root(root))
    }

    /// Creates paths rooted at `root`.
    #[must_use]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            current: root.join("current"),
            sdks: root.join("sdks"),
            download: root.join("download"),
            root,
        }
    }

    /// Returns the active SDK if `current` resolves to a directory.
    #[must_use]
    pub fn installed_sdk(&self) -> Option<InstalledSdk> {
        self.current.is_dir().then(|| InstalledSdk::new(&self.current))
    }

    /// Reads the metadata of the active SDK.
    ///
    /// # Errors
    ///
    /// See [`SdkMetadata::read_from`].
    pub fn read_metadata(&self) -> UfbtResult<Option<SdkMetadata>> {
        if !self.current.is_dir() {
            return Ok(None);
        }
        SdkMetadata::read_from(&self.current)
    }

    /// Returns the directory `current` links to, resolved against the root.
    ///
    /// Returns `None` if `current` is missing or is a plain directory.
    #[must_use]
    pub fn current_target(&self) -> Option<PathBuf> {
        let target = std::fs::read_link(&self.current).ok()?;
        Some(if target.is_absolute() {
            target
        } else {
            self.root.join(target)
        })
    }

    /// Returns a fresh, not yet existing staging directory for an SDK.
    #[must_use]
    pub fn new_staging_dir(&self, version: &str, hw_target: &str) -> PathBuf {
        let name = format!(
            "{}-{}-{}",
            sanitize_component(version),
            sanitize_component(hw_target),
            unique_stamp()
        );
        self.sdks.join(name)
    }

    /// Points `current` at `sdk_dir`.
    ///
    /// A new link is created next to `current` and renamed over it. If the
    /// link cannot be created or renamed, `current` is left as it was.
    ///
    /// # Errors
    ///
    /// Returns [`UfbtError::Io`] if moving a legacy directory or replacing
    /// the link fails.
    pub fn activate(&self, sdk_dir: &Path) -> UfbtResult<()> {
        self.activate_with(sdk_dir, replace_link)
    }

    fn activate_with(
        &self,
        sdk_dir: &Path,
        swap: impl FnOnce(&Path, &Path, &Path) -> UfbtResult<()>,
    ) -> UfbtResult<()> {
        let retired = self.retire_legacy_current()?;

        let target = sdk_dir
            .strip_prefix(&self.root)
            .map_or_else(|_| sdk_dir.to_path_buf(), Path::to_path_buf);
        let result = swap(&target, &self.current, &self.root);

        if let (Err(_), Some(legacy)) = (&result, retired) {
            // `current` must not be left missing.
            if let Err(e) = std::fs::rename(&legacy, &self.current) {
                tracing::warn!(dir = %legacy.display(), error = %e, "failed to restore legacy SDK directory");
            }
        }
        result
    }

    /// Moves a plain `current` directory left by older tools into `sdks/`
    /// and returns where it went.
    fn retire_legacy_current(&self) -> UfbtResult<Option<PathBuf>> {
        let Ok(meta) = std::fs::symlink_metadata(&self.current) else {
            return Ok(None);
        };
        if !meta.file_type().is_dir() {
            return Ok(None);
        }

        std::fs::create_dir_all(&self.sdks)
            .map_err(|e| UfbtError::io(format!("failed to create {}", self.sdks.display()), e))?;
        let legacy = self.sdks.join(format!("legacy-{}", unique_stamp()));
        tracing::info!(from = %self.current.display(), to = %legacy.display(), "moving legacy SDK directory");
        std::fs::rename(&self.current, &legacy).map_err(|e| {
            UfbtError::io(
                format!("failed to move legacy SDK directory {}", self.current.display()),
                e,
            )
        })?;
        Ok(Some(legacy))
    }

    /// Lists prior SDKs, newest first. The active SDK and trees without
    /// metadata are not included.
    ///
    /// # Errors
    ///
    /// Returns [`UfbtError::Io`] if `sdks/` cannot be read.
    pub fn retained_sdks(&self) -> UfbtResult<Vec<RetainedSdk>> {
        if !self.sdks.is_dir() {
            return Ok(Vec::new());
        }

        let active = self
            .current_target()
            .and_then(|target| target.canonicalize().ok());
        let entries = std::fs::read_dir(&self.sdks)
            .map_err(|e| UfbtError::io(format!("failed to read {}", self.sdks.display()), e))?;

        let mut retained = Vec::new();
        for entry in entries.filter_map(Result::ok) {
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            if active.is_some() && dir.canonicalize().ok() == active {
                continue;
            }
            match SdkMetadata::read_from(&dir) {
                Ok(Some(metadata)) => retained.push(RetainedSdk { dir, metadata }),
                Ok(None) => {}
                Err(e) => tracing::warn!("skipping {}: {e}", dir.display()),
            }
        }

        retained.sort_by(|a, b| b.metadata.installed_at.cmp(&a.metadata.installed_at));
        Ok(retained)
    }

    /// Removes prior SDKs beyond the newest `keep`.
    ///
    /// Failures are logged and skipped. Returns the removed directories.
    pub fn prune(&self, keep: usize) -> Vec<PathBuf> {
        let retained = match self.retained_sdks() {
            Ok(retained) => retained,
            Err(e) => {
                tracing::warn!("cannot list retained SDKs: {e}");
                return Vec::new();
            }
        };

        let mut removed = Vec::new();
        for sdk in retained.into_iter().skip(keep) {
            match std::fs::remove_dir_all(&sdk.dir) {
                Ok(()) => {
                    tracing::debug!(dir = %sdk.dir.display(), "pruned SDK");
                    removed.push(sdk.dir);
                }
                Err(e) => tracing::warn!("failed to remove {}: {e}", sdk.dir.display()),
            }
        }
        removed
    }

    /// Re-points `current` at the most recently installed prior SDK.
    ///
    /// # Errors
    ///
    /// Returns [`UfbtError::State`] if there is no prior SDK, or the error of
    /// [`StatePaths::activate`].
    pub fn rollback(&self) -> UfbtResult<SdkMetadata> {
        let previous = self
            .retained_sdks()?
            .into_iter()
            .next()
            .ok_or_else(|| UfbtError::state("no previous SDK to roll back to"))?;
        self.activate(&previous.dir)?;
        Ok(previous.metadata)
    }

    /// Removes the active SDK link and all SDK trees.
    ///
    /// # Errors
    ///
    /// Returns [`UfbtError::Io`] if removal fails.
    pub fn clean_sdks(&self) -> UfbtResult<()> {
        if let Ok(meta) = std::fs::symlink_metadata(&self.current) {
            let result = if meta.file_type().is_dir() {
                std::fs::remove_dir_all(&self.current)
            } else {
                remove_link(&self.current)
            };
            result.map_err(|e| {
                UfbtError::io(format!("failed to remove {}", self.current.display()), e)
            })?;
        }
        remove_dir_if_exists(&self.sdks)
    }

    /// Removes the download directory.
    ///
    /// # Errors
    ///
    /// Returns [`UfbtError::Io`] if removal fails.
    pub fn clean_downloads(&self) -> UfbtResult<()> {
        remove_dir_if_exists(&self.download)
    }

    /// Removes the whole state directory.
    ///
    /// # Errors
    ///
    /// Returns [`UfbtError::Io`] if removal fails.
    pub fn purge(&self) -> UfbtResult<()> {
        remove_dir_if_exists(&self.root)
    }
}

fn remove_dir_if_exists(dir: &Path) -> UfbtResult<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(UfbtError::io(format!("failed to remove {}", dir.display()), e)),
    }
}

/// Keeps directory names portable.
fn sanitize_component(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn unique_stamp() -> String {
    let suffix: u16 = rand::rng().random();
    format!("{}-{suffix:04x}", Utc::now().format("%Y%m%d%H%M%S"))
}

#[cfg(unix)]
fn replace_link(target: &Path, link: &Path, root: &Path) -> UfbtResult<()> {
    std::fs::create_dir_all(root)
        .map_err(|e| UfbtError::io(format!("failed to create {}", root.display()), e))?;

    let temp_link = root.join(format!(".current-{}.tmp", unique_stamp()));
    std::os::unix::fs::symlink(target, &temp_link).map_err(|e| {
        UfbtError::io(format!("failed to create link {}", temp_link.display()), e)
    })?;

    if let Err(e) = std::fs::rename(&temp_link, link) {
        let _ = std::fs::remove_file(&temp_link);
        return Err(UfbtError::io(
            format!("failed to replace {}", link.display()),
            e,
        ));
    }
    Ok(())
}

// Windows cannot rename a directory link over another one, so the old link
// is removed first.
#[cfg(windows)]
fn replace_link(target: &Path, link: &Path, root: &Path) -> UfbtResult<()> {
    std::fs::create_dir_all(root)
        .map_err(|e| UfbtError::io(format!("failed to create {}", root.display()), e))?;
    if std::fs::symlink_metadata(link).is_ok() {
        remove_link(link)
            .map_err(|e| UfbtError::io(format!("failed to remove {}", link.display()), e))?;
    }
    std::os::windows::fs::symlink_dir(target, link)
        .map_err(|e| UfbtError::io(format!("failed to create link {}", link.display()), e))
}

#[cfg(unix)]
fn remove_link(link: &Path) -> std::io::Result<()> {
    std::fs::remove_file(link)
}

#[cfg(windows)]
fn remove_link(link: &Path) -> std::io::Result<()> {
    std::fs::remove_dir(link).or_else(|_| std::fs::remove_file(link))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::sdk::source::ChannelName;
    use assert_fs::TempDir;
    use chrono::TimeZone;

    fn metadata(version: &str, day: u32) -> SdkMetadata {
        SdkMetadata {
            source: SdkSource::Channel {
                channel: ChannelName::release(),
                index_url: None,
            },
            version: version.to_string(),
            hw_target: "f7".to_string(),
            installed_at: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
        }
    }

    fn install(paths: &StatePaths, version: &str, day: u32) -> PathBuf {
        let dir = paths.new_staging_dir(version, "f7");
        std::fs::create_dir_all(&dir).unwrap();
        metadata(version, day).write_to(&dir).unwrap();
        paths.activate(&dir).unwrap();
        dir
    }

    #[test]
    fn paths_are_rooted() {
        let paths = StatePaths::with_root(PathBuf::from("/state"));
        assert_eq!(paths.current, PathBuf::from("/state/current"));
        assert_eq!(paths.sdks, PathBuf::from("/state/sdks"));
        assert_eq!(paths.download, PathBuf::from("/state/download"));
    }

    #[test]
    fn reads_metadata_written_by_older_tools() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(STATE_FILE_NAME),
            r#"{
                "hw_target": "f7",
                "mode": "channel",
                "channel": "release",
                "index_url": "https://update.flipperzero.one/firmware/directory.json",
                "version": "0.89.0"
            }"#,
        )
        .unwrap();

        let metadata = SdkMetadata::read_from(temp.path()).unwrap().unwrap();
        assert_eq!(metadata.version, "0.89.0");
        assert_eq!(metadata.hw_target, "f7");
        assert_eq!(metadata.installed_at, DateTime::<Utc>::default());
        assert_eq!(
            metadata.source,
            SdkSource::Channel {
                channel: ChannelName::release(),
                index_url: Some("https://update.flipperzero.one/firmware/directory.json".into()),
            }
        );
    }

    #[test]
    fn reads_legacy_branch_and_url_metadata() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(STATE_FILE_NAME),
            r#"{"hw_target": "f18", "mode": "branch", "branch": "dev", "version": "abc123"}"#,
        )
        .unwrap();
        let metadata = SdkMetadata::read_from(temp.path()).unwrap().unwrap();
        assert_eq!(metadata.source.mode(), "branch");

        std::fs::write(
            temp.path().join(STATE_FILE_NAME),
            r#"{"hw_target": "f7", "mode": "url", "url": "https://x/sdk.zip", "version": "unknown"}"#,
        )
        .unwrap();
        let metadata = SdkMetadata::read_from(temp.path()).unwrap().unwrap();
        assert!(!metadata.has_known_version());
    }

    #[test]
    fn unparseable_metadata_is_a_state_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(STATE_FILE_NAME), "{not json").unwrap();
        let err = SdkMetadata::read_from(temp.path()).unwrap_err();
        assert!(matches!(err, UfbtError::State { .. }));
    }

    #[test]
    fn activate_points_current_at_sdk() {
        let temp = TempDir::new().unwrap();
        let paths = StatePaths::with_root(temp.path().to_path_buf());

        let first = install(&paths, "1.0.0", 1);
        assert_eq!(paths.current_target().unwrap(), first);
        assert_eq!(paths.read_metadata().unwrap().unwrap().version, "1.0.0");

        let second = install(&paths, "1.1.0", 2);
        assert_eq!(paths.current_target().unwrap(), second);
        assert_eq!(paths.read_metadata().unwrap().unwrap().version, "1.1.0");
    }

    #[test]
    fn legacy_current_directory_is_retained() {
        let temp = TempDir::new().unwrap();
        let paths = StatePaths::with_root(temp.path().to_path_buf());
        std::fs::create_dir_all(&paths.current).unwrap();
        metadata("0.9.0", 1).write_to(&paths.current).unwrap();

        install(&paths, "1.0.0", 2);

        let retained = paths.retained_sdks().unwrap();
        assert_eq!(retained.len(), 1);
        assert_eq!(retained[0].metadata.version, "0.9.0");
        assert!(retained[0].dir.starts_with(&paths.sdks));
    }

    #[test]
    fn failed_swap_restores_legacy_current_directory() {
        let temp = TempDir::new().unwrap();
        let paths = StatePaths::with_root(temp.path().to_path_buf());
        std::fs::create_dir_all(&paths.current).unwrap();
        metadata("0.9.0", 1).write_to(&paths.current).unwrap();

        let dir = paths.new_staging_dir("1.0.0", "f7");
        std::fs::create_dir_all(&dir).unwrap();
        let err = paths
            .activate_with(&dir, |_, link, _| {
                Err(UfbtError::io(
                    format!("failed to replace {}", link.display()),
                    std::io::Error::other("disk full"),
                ))
            })
            .unwrap_err();
        assert!(matches!(err, UfbtError::Io { .. }));

        assert!(std::fs::symlink_metadata(&paths.current).unwrap().is_dir());
        assert_eq!(paths.read_metadata().unwrap().unwrap().version, "0.9.0");
        assert!(paths.retained_sdks().unwrap().is_empty());
    }

    #[test]
    fn prune_keeps_newest_prior_sdks() {
        let temp = TempDir::new().unwrap();
        let paths = StatePaths::with_root(temp.path().to_path_buf());

        let oldest = install(&paths, "1.0.0", 1);
        install(&paths, "1.1.0", 2);
        install(&paths, "1.2.0", 3);
        let active = install(&paths, "1.3.0", 4);

        let removed = paths.prune(RETAINED_SDKS);
        assert_eq!(removed, vec![oldest.clone()]);
        assert!(!oldest.exists());
        assert!(active.exists());

        let versions: Vec<_> = paths
            .retained_sdks()
            .unwrap()
            .into_iter()
            .map(|sdk| sdk.metadata.version)
            .collect();
        assert_eq!(versions, vec!["1.2.0", "1.1.0"]);
    }

    #[test]
    fn rollback_activates_previous_sdk() {
        let temp = TempDir::new().unwrap();
        let paths = StatePaths::with_root(temp.path().to_path_buf());

        let first = install(&paths, "1.0.0", 1);
        install(&paths, "1.1.0", 2);

        let restored = paths.rollback().unwrap();
        assert_eq!(restored.version, "1.0.0");
        assert_eq!(paths.current_target().unwrap(), first);
    }

    #[test]
    fn rollback_without_prior_sdk_fails() {
        let temp = TempDir::new().unwrap();
        let paths = StatePaths::with_root(temp.path().to_path_buf());
        install(&paths, "1.0.0", 1);

        let err = paths.rollback().unwrap_err();
        assert!(matches!(err, UfbtError::State { .. }));
    }

    #[test]
    fn clean_removes_sdks_but_keeps_downloads() {
        let temp = TempDir::new().unwrap();
        let paths = StatePaths::with_root(temp.path().to_path_buf());
        install(&paths, "1.0.0", 1);
        std::fs::create_dir_all(&paths.download).unwrap();

        paths.clean_sdks().unwrap();

        assert!(std::fs::symlink_metadata(&paths.current).is_err());
        assert!(!paths.sdks.exists());
        assert!(paths.download.exists());
        assert!(paths.read_metadata().unwrap().is_none());
    }

    #[test]
    fn purge_removes_everything_and_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let paths = StatePaths::with_root(temp.path().join("state"));
        install(&paths, "1.0.0", 1);

        paths.purge().unwrap();
        assert!(!paths.root.exists());
        paths.purge().unwrap();
    }

    #[test]
    fn staging_dirs_are_unique_and_sanitized() {
        let paths = StatePaths::with_root(PathBuf::from("/state"));
        let a = paths.new_staging_dir("1.0/rc", "f7");
        let b = paths.new_staging_dir("1.0/rc", "f7");
        assert_ne!(a, b);
        let name = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("1.0_rc-f7-"));
    }

    #[test]
    fn options_manifest_is_found_in_headers_or_root() {
        let temp = TempDir::new().unwrap();
        let sdk = InstalledSdk::new(temp.path());
        assert!(sdk.options_path().is_none());

        std::fs::write(temp.path().join("sdk.opts"), "{}").unwrap();
        assert_eq!(sdk.options_path().unwrap(), temp.path().join("sdk.opts"));

        std::fs::create_dir_all(temp.path().join("sdk_headers")).unwrap();
        std::fs::write(temp.path().join("sdk_headers/sdk.opts"), "{}").unwrap();
        assert_eq!(
            sdk.options_path().unwrap(),
            temp.path().join("sdk_headers/sdk.opts")
        );
    }
}
