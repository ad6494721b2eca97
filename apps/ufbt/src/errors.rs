//! Error types for the ufbt CLI.
//!
//! `UfbtError` is the typed taxonomy returned by the SDK, project and builder
//! modules. Command handlers wrap it in `anyhow::Error` with extra context;
//! `main` downcasts it back to pick the process exit code.

use std::path::PathBuf;
use thiserror::Error;

/// Consolidated error type for ufbt operations.
#[derive(Debug, Error)]
pub enum UfbtError {
    /// Ambiguous or missing user input.
    #[error("configuration error: {message}")]
    Configuration {
        /// What was missing or ambiguous.
        message: String,
    },

    /// Network or transport failure while fetching an index or archive.
    #[error("download error: {message}")]
    Download {
        /// Description of the failed transfer.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A fetched archive failed post-download validation.
    #[error("corrupt SDK archive: {message}")]
    CorruptArchive {
        /// What the validation found.
        message: String,
    },

    /// The SDK option manifest lacks a required key.
    #[error("malformed SDK: missing required key `{key}` in {}", path.display())]
    MalformedSdk {
        /// The missing key.
        key: String,
        /// The manifest that was read.
        path: PathBuf,
    },

    /// The requested channel, branch or version is absent from the index.
    #[error("not found: {message}")]
    NotFound {
        /// What was looked up.
        message: String,
    },

    /// A built application failed structural validation.
    #[error("validation failed for {app_id}: {message}")]
    Validation {
        /// The application that failed.
        app_id: String,
        /// What the validator found.
        message: String,
    },

    /// The persisted state directory is unreadable or inconsistent.
    #[error("state error: {message}")]
    State {
        /// Description of the inconsistency.
        message: String,
    },

    /// Error reading or writing files.
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O operation that failed.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An external tool exited with a non-zero code.
    ///
    /// The tool already printed its own diagnostics, so `main` only forwards
    /// the exit code.
    #[error("process exited with code {code}")]
    ProcessExitCode {
        /// The exit code from the subprocess.
        code: i32,
    },
}

impl UfbtError {
    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Download` error.
    #[must_use]
    pub fn download(message: impl Into<String>) -> Self {
        Self::Download {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new `Download` error with a source error.
    #[must_use]
    pub fn download_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Download {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new `CorruptArchive` error.
    #[must_use]
    pub fn corrupt_archive(message: impl Into<String>) -> Self {
        Self::CorruptArchive {
            message: message.into(),
        }
    }

    /// Creates a new `MalformedSdk` error.
    #[must_use]
    pub fn malformed_sdk(key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::MalformedSdk {
            key: key.into(),
            path: path.into(),
        }
    }

    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(app_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            app_id: app_id.into(),
            message: message.into(),
        }
    }

    /// Creates a new `State` error.
    #[must_use]
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Creates a new `Io` error from an I/O error with context.
    #[must_use]
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Creates a new `ProcessExitCode` error.
    #[must_use]
    pub const fn process_exit_code(code: i32) -> Self {
        Self::ProcessExitCode { code }
    }
}

/// Shorthand for results carrying a [`UfbtError`].
pub type UfbtResult<T> = Result<T, UfbtError>;
