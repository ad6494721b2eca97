//! SDK management for the ufbt CLI.
//!
//! Resolves, downloads, unpacks and activates SDK bundles, and reads the
//! build settings an installed SDK provides.
//!
//! ## Module Structure
//!
//! - [`source`] - Source selection and precedence
//! - [`index`] - Channel directory and branch listing lookups
//! - [`download`] - HTTP client and archive downloads
//! - [`verify`] - SHA-256 checksum verification
//! - [`archive`] - ZIP and tar.gz extraction
//! - [`state`] - State directory layout, metadata and the `current` link
//! - [`bootstrap`] - The update state machine
//! - [`options`] - The `sdk.opts` manifest and its build settings

pub mod archive;
pub mod bootstrap;
pub mod download;
pub mod index;
pub mod options;
pub mod source;
pub mod state;
pub mod verify;

pub use bootstrap::{Bootstrapper, DeployOutcome};
pub use download::http_client;
pub use options::{EnvOverlay, configure};
pub use source::{ChannelName, SourceOverrides};
pub use state::{InstalledSdk, StatePaths};
