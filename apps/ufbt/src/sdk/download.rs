//! HTTP downloads of SDK archives.
//!
//! Archives are streamed to `<name>.tmp` next to the destination and renamed
//! once the body has been written completely. There is no resume and no
//! automatic retry; a failed transfer removes the partial file.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::errors::{UfbtError, UfbtResult};

/// Whole-request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Connection timeout.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Minimum interval between progress updates in milliseconds.
const PROGRESS_INTERVAL_MS: u128 = 250;

/// File name used when a URL has no usable last path segment.
const FALLBACK_FILE_NAME: &str = "sdk.zip";

/// Builds the HTTP client shared by index lookups and downloads.
///
/// `insecure` disables TLS certificate verification (`--no-check-certificate`).
///
/// # Errors
///
/// Returns [`UfbtError::Download`] if the client cannot be constructed.
pub fn http_client(insecure: bool) -> UfbtResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("ufbt/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .danger_accept_invalid_certs(insecure)
        .build()
        .map_err(|e| UfbtError::download_with_source("failed to create HTTP client", e))
}

/// Returns the file name an archive fetched from `url` is stored under.
#[must_use]
pub fn file_name_for_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty() && name != "." && name != "..")
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}

/// Downloads `url` into `download_dir` and returns the path of the file.
///
/// # Errors
///
/// Returns [`UfbtError::Download`] on transport failures and non-success
/// HTTP statuses, and [`UfbtError::Io`] if the file cannot be written.
pub async fn download_to_dir(
    client: &reqwest::Client,
    url: &str,
    download_dir: &Path,
) -> UfbtResult<PathBuf> {
    let dest = download_dir.join(file_name_for_url(url));
    download_file(client, url, &dest).await?;
    Ok(dest)
}

/// Downloads `url` to `dest`.
///
/// # Errors
///
/// See [`download_to_dir`].
pub async fn download_file(client: &reqwest::Client, url: &str, dest: &Path) -> UfbtResult<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| UfbtError::io(format!("failed to create {}", parent.display()), e))?;
    }

    let mut temp_name = dest.as_os_str().to_os_string();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    if let Err(e) = stream_to_file(client, url, &temp_path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e);
    }

    tokio::fs::rename(&temp_path, dest).await.map_err(|e| {
        UfbtError::io(
            format!("failed to rename {} to {}", temp_path.display(), dest.display()),
            e,
        )
    })
}

async fn stream_to_file(client: &reqwest::Client, url: &str, dest: &Path) -> UfbtResult<()> {
    tracing::debug!(url, dest = %dest.display(), "starting download");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| UfbtError::download_with_source(format!("failed to connect to {url}"), e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(UfbtError::download(format!("HTTP {status} fetching {url}")));
    }

    let total_size = response.content_length().unwrap_or(0);
    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| UfbtError::io(format!("failed to create {}", dest.display()), e))?;

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;
    let start_time = Instant::now();
    let mut last_update = Instant::now();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk
            .map_err(|e| UfbtError::download_with_source(format!("failed to read body of {url}"), e))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| UfbtError::io(format!("failed to write {}", dest.display()), e))?;
        downloaded += chunk.len() as u64;

        let now = Instant::now();
        if now.duration_since(last_update).as_millis() >= PROGRESS_INTERVAL_MS {
            print_progress(downloaded, total_size);
            last_update = now;
        }
    }

    file.flush()
        .await
        .map_err(|e| UfbtError::io(format!("failed to flush {}", dest.display()), e))?;

    tracing::info!(
        "downloaded {} in {:.1}s",
        format_bytes(downloaded),
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
fn print_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let percent = (downloaded as f64 / total as f64 * 100.0) as u8;
        eprint!(
            "\r{}/{} ({percent}%)     ",
            format_bytes(downloaded),
            format_bytes(total)
        );
    } else {
        eprint!("\r{}     ", format_bytes(downloaded));
    }
    let _ = std::io::stderr().flush();
}

/// Formats bytes into a human-readable string (KB, MB).
fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    #[allow(clippy::cast_precision_loss)]
    let bytes_f = bytes as f64;

    if bytes_f >= MB {
        format!("{:.2} MB", bytes_f / MB)
    } else if bytes_f >= KB {
        format!("{:.2} KB", bytes_f / KB)
    } else {
        format!("{bytes} B")
    }
}
