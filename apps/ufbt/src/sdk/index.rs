//! Version index lookups.
//!
//! Turns an [`SdkSource`] and a hardware target into the concrete archive to
//! install.
//!
//! - Channels are looked up in the firmware directory, a JSON document
//!   listing every channel, its versions (newest first) and their files.
//! - Branches are looked up in the HTML listing of the branch's build
//!   directory, whose files are named
//!   `flipper-z-<target>-<type>-<version>.<ext>`.
//! - URL and local sources need no lookup.

use regex::Regex;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::LazyLock;

use super::source::{ChannelName, SdkSource};
use super::state::VERSION_UNKNOWN;
use crate::errors::{UfbtError, UfbtResult};

/// Official firmware directory.
pub const OFFICIAL_INDEX_URL: &str = "https://update.flipperzero.one/firmware/directory.json";

/// Root of the per-branch build listings.
pub const BRANCH_ROOT_URL: &str = "https://update.flipperzero.one/builds/firmware";

/// File type of SDK bundles in the directory and branch listings.
const SDK_ZIP_TYPE: &str = "sdk_zip";

static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s[^>]*href\s*=\s*["']([^"']+)["']"#).expect("href pattern is valid")
});

static FILE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^flipper-z-(\w+)-(\w+)-(.+)\.(\w+)$").expect("file name pattern is valid")
});

/// Where a resolved archive is fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocation {
    /// Download over HTTP(S).
    Remote(String),
    /// Archive file or unpacked tree on disk.
    Local(PathBuf),
}

/// The archive an update run installs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    /// Where to fetch it from.
    pub location: ArtifactLocation,
    /// Version it contains, or `unknown`.
    pub version: String,
    /// Expected SHA-256, when the index provides one.
    pub sha256: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Directory {
    #[serde(default)]
    channels: Vec<DirectoryChannel>,
}

#[derive(Debug, Deserialize)]
struct DirectoryChannel {
    id: String,
    #[serde(default)]
    versions: Vec<DirectoryVersion>,
}

#[derive(Debug, Deserialize)]
struct DirectoryVersion {
    version: String,
    #[serde(default)]
    files: Vec<DirectoryFile>,
}

#[derive(Debug, Deserialize)]
struct DirectoryFile {
    #[serde(rename = "type")]
    file_type: String,
    target: String,
    url: String,
    #[serde(default)]
    sha256: Option<String>,
}

/// A file found in a branch listing.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BranchFile {
    target: String,
    file_type: String,
    href: String,
}

/// Resolves sources against the remote indexes.
#[derive(Debug, Clone)]
pub struct IndexClient {
    client: reqwest::Client,
}

impl IndexClient {
    /// Creates a client issuing requests through `client`.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Resolves `source` for `hw_target`.
    ///
    /// # Errors
    ///
    /// Returns [`UfbtError::NotFound`] if the channel, branch or a file for
    /// the target is missing or the index cannot be parsed, and
    /// [`UfbtError::Download`] if the index cannot be fetched.
    pub async fn resolve(&self, source: &SdkSource, hw_target: &str) -> UfbtResult<ResolvedArtifact> {
        match source {
            SdkSource::Channel { channel, index_url } => {
                let index_url = index_url.as_deref().unwrap_or(OFFICIAL_INDEX_URL);
                tracing::info!("fetching version info for channel '{channel}' from {index_url}");
                let document = self.fetch_text(index_url).await?;
                select_from_directory(&document, index_url, channel, hw_target)
            }
            SdkSource::Branch {
                branch,
                branch_root_url,
            } => {
                let branch_url = branch_url(branch_root_url.as_deref(), branch);
                tracing::info!("fetching branch index {branch_url}");
                let listing = self.fetch_text(&branch_url).await?;
                select_from_branch_listing(&listing, &branch_url, hw_target)
            }
            SdkSource::Url { url } => Ok(ResolvedArtifact {
                location: ArtifactLocation::Remote(url.clone()),
                version: VERSION_UNKNOWN.to_string(),
                sha256: None,
            }),
            SdkSource::Local { path } => Ok(ResolvedArtifact {
                location: ArtifactLocation::Local(path.clone()),
                version: VERSION_UNKNOWN.to_string(),
                sha256: None,
            }),
        }
    }

    async fn fetch_text(&self, url: &str) -> UfbtResult<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UfbtError::download_with_source(format!("failed to fetch {url}"), e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(UfbtError::not_found(format!("{url} does not exist")));
        }
        if !status.is_success() {
            return Err(UfbtError::download(format!("HTTP {status} fetching {url}")));
        }

        response
            .text()
            .await
            .map_err(|e| UfbtError::download_with_source(format!("failed to read {url}"), e))
    }
}

/// Returns the listing URL for `branch`, with a trailing slash.
#[must_use]
pub fn branch_url(branch_root_url: Option<&str>, branch: &str) -> String {
    let root = branch_root_url.unwrap_or(BRANCH_ROOT_URL).trim_end_matches('/');
    format!("{root}/{branch}/")
}

/// Picks the SDK bundle for `hw_target` from the newest version of `channel`
/// that ships one.
fn select_from_directory(
    document: &str,
    index_url: &str,
    channel: &ChannelName,
    hw_target: &str,
) -> UfbtResult<ResolvedArtifact> {
    let directory: Directory = serde_json::from_str(document)
        .map_err(|e| UfbtError::not_found(format!("cannot parse index {index_url}: {e}")))?;

    let channel_data = directory
        .channels
        .iter()
        .find(|c| c.id == channel.index_id())
        .ok_or_else(|| {
            UfbtError::not_found(format!("channel '{channel}' is not listed in {index_url}"))
        })?;

    if channel_data.versions.is_empty() {
        return Err(UfbtError::not_found(format!("channel '{channel}' has no versions")));
    }

    channel_data
        .versions
        .iter()
        .find_map(|version| {
            version
                .files
                .iter()
                .find(|f| f.file_type == SDK_ZIP_TYPE && f.target == hw_target)
                .map(|file| ResolvedArtifact {
                    location: ArtifactLocation::Remote(file.url.clone()),
                    version: version.version.clone(),
                    sha256: file.sha256.clone().filter(|s| !s.is_empty()),
                })
        })
        .inspect(|artifact| tracing::info!("using version {}", artifact.version))
        .ok_or_else(|| {
            UfbtError::not_found(format!(
                "no SDK for target '{hw_target}' in channel '{channel}'"
            ))
        })
}

/// Picks the SDK bundle for `hw_target` from a branch listing page.
fn select_from_branch_listing(
    listing: &str,
    branch_url: &str,
    hw_target: &str,
) -> UfbtResult<ResolvedArtifact> {
    let (version, files) = parse_branch_listing(listing)?;

    let file = files
        .iter()
        .find(|f| f.file_type == SDK_ZIP_TYPE && f.target == hw_target)
        .ok_or_else(|| {
            UfbtError::not_found(format!("SDK bundle for '{hw_target}' not found in {branch_url}"))
        })?;

    let url = if file.href.contains("://") {
        file.href.clone()
    } else {
        format!("{branch_url}{}", file.href.trim_start_matches('/'))
    };

    tracing::info!("found version {}", version.as_deref().unwrap_or(VERSION_UNKNOWN));
    Ok(ResolvedArtifact {
        location: ArtifactLocation::Remote(url),
        version: version.unwrap_or_else(|| VERSION_UNKNOWN.to_string()),
        sha256: None,
    })
}

/// Extracts build files and their common version from a listing page.
///
/// Map files are skipped. All other files must carry the same version; a
/// version that merely extends the first one seen is accepted.
fn parse_branch_listing(listing: &str) -> UfbtResult<(Option<String>, Vec<BranchFile>)> {
    let mut version: Option<String> = None;
    let mut files = Vec::new();

    for captures in HREF_RE.captures_iter(listing) {
        let href = &captures[1];
        if href.contains(".map") {
            continue;
        }
        let file_name = href.rsplit('/').next().unwrap_or(href);
        let Some(parts) = FILE_NAME_RE.captures(file_name) else {
            continue;
        };

        let (target, kind, file_version, ext) = (&parts[1], &parts[2], &parts[3], &parts[4]);
        match &version {
            None => version = Some(file_version.to_string()),
            Some(seen) if !file_version.starts_with(seen.as_str()) => {
                return Err(UfbtError::not_found(format!(
                    "listing mixes versions {seen} and {file_version}"
                )));
            }
            Some(_) => {}
        }

        files.push(BranchFile {
            target: target.to_string(),
            file_type: format!("{kind}_{ext}").to_lowercase(),
            href: href.to_string(),
        });
    }

    Ok((version, files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::download::http_client;
    use mockito::Server;

    const DIRECTORY: &str = r#"{
        "channels": [
            {
                "id": "release",
                "versions": [
                    {
                        "version": "0.99.1",
                        "files": [
                            {"type": "sdk_zip", "target": "f7", "url": "https://cdn/sdk-A.zip", "sha256": "aa"},
                            {"type": "full_dfu", "target": "f7", "url": "https://cdn/full.dfu", "sha256": "bb"}
                        ]
                    },
                    {
                        "version": "0.98.0",
                        "files": [
                            {"type": "sdk_zip", "target": "f18", "url": "https://cdn/sdk-f18.zip"}
                        ]
                    }
                ]
            },
            {
                "id": "development",
                "versions": [
                    {
                        "version": "dev-abc123",
                        "files": [
                            {"type": "sdk_zip", "target": "f7", "url": "https://cdn/sdk-dev.zip"}
                        ]
                    }
                ]
            },
            {"id": "release-candidate", "versions": []}
        ]
    }"#;

    const LISTING: &str = r#"<html><body>
        <a href="../">../</a>
        <a href="flipper-z-f7-full-1.2.0-rc.dfu">flipper-z-f7-full-1.2.0-rc.dfu</a>
        <a href="flipper-z-f7-sdk-1.2.0-rc.zip">flipper-z-f7-sdk-1.2.0-rc.zip</a>
        <a href="flipper-z-f18-sdk-1.2.0-rc.zip">flipper-z-f18-sdk-1.2.0-rc.zip</a>
        <a href="flipper-z-f7-firmware-1.2.0-rc.elf.map">map</a>
    </body></html>"#;

    fn release() -> ChannelName {
        ChannelName::release()
    }

    #[test]
    fn directory_release_f7_picks_newest_sdk() {
        let artifact = select_from_directory(DIRECTORY, "idx", &release(), "f7").unwrap();
        assert_eq!(
            artifact.location,
            ArtifactLocation::Remote("https://cdn/sdk-A.zip".to_string())
        );
        assert_eq!(artifact.version, "0.99.1");
        assert_eq!(artifact.sha256.as_deref(), Some("aa"));
    }

    #[test]
    fn directory_falls_back_to_older_version_for_target() {
        let artifact = select_from_directory(DIRECTORY, "idx", &release(), "f18").unwrap();
        assert_eq!(artifact.version, "0.98.0");
        assert_eq!(artifact.sha256, None);
    }

    #[test]
    fn directory_maps_short_channel_names() {
        let artifact =
            select_from_directory(DIRECTORY, "idx", &ChannelName::new("dev"), "f7").unwrap();
        assert_eq!(artifact.version, "dev-abc123");
    }

    #[test]
    fn directory_unknown_channel_is_not_found() {
        let err =
            select_from_directory(DIRECTORY, "idx", &ChannelName::new("nightly"), "f7").unwrap_err();
        assert!(matches!(err, UfbtError::NotFound { .. }));
    }

    #[test]
    fn directory_empty_channel_is_not_found() {
        let err = select_from_directory(DIRECTORY, "idx", &ChannelName::new("rc"), "f7").unwrap_err();
        assert!(matches!(err, UfbtError::NotFound { .. }));
    }

    #[test]
    fn directory_missing_target_is_not_found() {
        let err = select_from_directory(DIRECTORY, "idx", &release(), "f99").unwrap_err();
        assert!(err.to_string().contains("f99"));
    }

    #[test]
    fn directory_garbage_is_not_found_naming_index() {
        let err = select_from_directory("<html>", "https://idx/directory.json", &release(), "f7")
            .unwrap_err();
        assert!(matches!(err, UfbtError::NotFound { .. }));
        assert!(err.to_string().contains("https://idx/directory.json"));
    }

    #[test]
    fn branch_listing_picks_sdk_for_target() {
        let artifact = select_from_branch_listing(LISTING, "https://builds/dev/", "f18").unwrap();
        assert_eq!(
            artifact.location,
            ArtifactLocation::Remote("https://builds/dev/flipper-z-f18-sdk-1.2.0-rc.zip".into())
        );
        assert_eq!(artifact.version, "1.2.0-rc");
    }

    #[test]
    fn branch_listing_without_target_is_not_found() {
        let err = select_from_branch_listing(LISTING, "https://builds/dev/", "f99").unwrap_err();
        assert!(matches!(err, UfbtError::NotFound { .. }));
    }

    #[test]
    fn branch_listing_rejects_mixed_versions() {
        let listing = r#"
            <a href="flipper-z-f7-sdk-1.2.0.zip">a</a>
            <a href="flipper-z-f18-sdk-1.3.0.zip">b</a>
        "#;
        let err = select_from_branch_listing(listing, "https://builds/dev/", "f7").unwrap_err();
        assert!(err.to_string().contains("mixes versions"));
    }

    #[test]
    fn branch_listing_skips_map_files() {
        let (_, files) = parse_branch_listing(LISTING).unwrap();
        assert!(files.iter().all(|f| !f.href.contains(".map")));
        assert_eq!(files.len(), 3);
        assert_eq!(files[0].file_type, "full_dfu");
    }

    #[test]
    fn branch_url_has_single_slashes() {
        assert_eq!(
            branch_url(Some("https://mirror/builds/"), "dev"),
            "https://mirror/builds/dev/"
        );
        assert_eq!(
            branch_url(None, "release"),
            format!("{BRANCH_ROOT_URL}/release/")
        );
    }

    #[tokio::test]
    async fn resolves_channel_over_http() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/directory.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(DIRECTORY)
            .create_async()
            .await;

        let client = IndexClient::new(http_client(false).unwrap());
        let source = SdkSource::Channel {
            channel: release(),
            index_url: Some(format!("{}/directory.json", server.url())),
        };
        let artifact = client.resolve(&source, "f7").await.unwrap();
        assert_eq!(artifact.version, "0.99.1");
    }

    #[tokio::test]
    async fn missing_branch_is_not_found() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/nope/")
            .with_status(404)
            .create_async()
            .await;

        let client = IndexClient::new(http_client(false).unwrap());
        let source = SdkSource::Branch {
            branch: "nope".to_string(),
            branch_root_url: Some(server.url()),
        };
        let err = client.resolve(&source, "f7").await.unwrap_err();
        assert!(matches!(err, UfbtError::NotFound { .. }));
    }

    #[tokio::test]
    async fn server_error_is_download_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/directory.json")
            .with_status(500)
            .create_async()
            .await;

        let client = IndexClient::new(http_client(false).unwrap());
        let source = SdkSource::Channel {
            channel: release(),
            index_url: Some(format!("{}/directory.json", server.url())),
        };
        let err = client.resolve(&source, "f7").await.unwrap_err();
        assert!(matches!(err, UfbtError::Download { .. }));
    }

    #[tokio::test]
    async fn url_source_passes_through_with_unknown_version() {
        let client = IndexClient::new(http_client(false).unwrap());
        let source = SdkSource::Url {
            url: "https://example.com/sdk.zip".to_string(),
        };
        let artifact = client.resolve(&source, "f7").await.unwrap();
        assert_eq!(artifact.version, VERSION_UNKNOWN);
        assert_eq!(
            artifact.location,
            ArtifactLocation::Remote("https://example.com/sdk.zip".to_string())
        );
    }
}
