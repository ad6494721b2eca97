//! Application builds and device tooling.
//!
//! ## Module Structure
//!
//! - [`env`] - Build environment variables and SDK overlay merging
//! - [`platform`] - Host detection for the managed toolchain
//! - [`toolchain`] - Compiler, linker, flasher and debugger adapter
//! - [`driver`] - Native application builds into `dist/`
//! - [`interpreter`] - SCons and `runfap.py` from the SDK's scripts

pub mod driver;
pub mod env;
pub mod interpreter;
pub mod platform;
pub mod toolchain;

pub use driver::{BuildArtifactSet, BuildDriver};
pub use interpreter::SdkScripts;
pub use toolchain::{DebugSession, GnuArmToolchain, Toolchain};
