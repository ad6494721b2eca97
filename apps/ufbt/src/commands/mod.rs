//! Command modules for the ufbt CLI.
//!
//! ## SDK Management Commands
//!
//! - [`update`] - Install or refresh the SDK
//! - [`status`] - Show the active SDK
//! - [`clean`] - Remove SDKs, downloads or all state
//! - [`rollback`] - Switch back to the previous SDK
//!
//! ## Application Commands
//!
//! - [`build`] - Build applications into `dist/`
//! - [`launch`] - Build, install and start an application on the device
//! - [`flash`] - Flash the SDK's firmware
//! - [`debug`] - Attach GDB to the device
//! - [`delegate`] - Commands run by the SDK's own scripts

pub mod build;
pub mod clean;
pub mod debug;
pub mod delegate;
pub mod flash;
pub mod launch;
pub mod rollback;
pub mod status;
pub mod update;
