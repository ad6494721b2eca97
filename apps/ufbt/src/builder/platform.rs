//! Host platform detection.
//!
//! Selects the managed toolchain directory for the machine ufbt runs on.
//!
//! ## Supported Platforms
//!
//! - Linux `x86_64` (`x86_64-linux`)
//! - Linux ARM64 (`arm64-linux`)
//! - macOS, both architectures (`x86_64-darwin`)
//! - Windows `x86_64` (`x86_64-windows`)

use std::fmt;

use crate::errors::{UfbtError, UfbtResult};

/// A host with a prebuilt toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostPlatform {
    /// Linux on `x86_64`
    LinuxX64,
    /// Linux on ARM64
    LinuxArm64,
    /// macOS; the toolchain is a universal build
    Darwin,
    /// Windows on `x86_64`
    WindowsX64,
}

impl HostPlatform {
    /// Detects the current host.
    ///
    /// # Errors
    ///
    /// Returns [`UfbtError::Configuration`] on hosts without a prebuilt
    /// toolchain.
    pub fn detect() -> UfbtResult<Self> {
        Self::from_parts(std::env::consts::OS, std::env::consts::ARCH).ok_or_else(|| {
            UfbtError::configuration(format!(
                "unsupported host {} on {}; supported hosts are x86_64-linux, arm64-linux, \
                 x86_64-darwin and x86_64-windows",
                std::env::consts::OS,
                std::env::consts::ARCH
            ))
        })
    }

    fn from_parts(os: &str, arch: &str) -> Option<Self> {
        match (os, arch) {
            ("linux", "x86_64") => Some(Self::LinuxX64),
            ("linux", "aarch64") => Some(Self::LinuxArm64),
            ("macos", "x86_64" | "aarch64") => Some(Self::Darwin),
            ("windows", "x86_64") => Some(Self::WindowsX64),
            _ => None,
        }
    }

    /// Directory name under `<toolchain root>/toolchain/`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LinuxX64 => "x86_64-linux",
            Self::LinuxArm64 => "arm64-linux",
            Self::Darwin => "x86_64-darwin",
            Self::WindowsX64 => "x86_64-windows",
        }
    }

    /// Executable file extension, `.exe` on Windows.
    #[must_use]
    pub fn executable_extension(self) -> &'static str {
        match self {
            Self::WindowsX64 => ".exe",
            Self::LinuxX64 | Self::LinuxArm64 | Self::Darwin => "",
        }
    }

    /// Python interpreter name used to run SDK scripts.
    #[must_use]
    pub fn python(self) -> &'static str {
        match self {
            Self::WindowsX64 => "python",
            Self::LinuxX64 | Self::LinuxArm64 | Self::Darwin => "python3",
        }
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
