//! Build environment variables.
//!
//! A [`BuildEnv`] holds the variables a build reads, named after their SCons
//! counterparts. List variables accumulate; scalar variables are replaced.

use std::collections::BTreeMap;

use crate::sdk::EnvOverlay;

/// C compiler flags.
pub const CCFLAGS: &str = "CCFLAGS";
/// C++ compiler flags.
pub const CXXFLAGS: &str = "CXXFLAGS";
/// Link flags for applications, tokens unresolved.
pub const LINKFLAGS: &str = "LINKFLAGS";
/// Link flags for plugins, tokens unresolved.
pub const LINKFLAGS_EXT: &str = "LINKFLAGS_EXT";
/// Libraries to link.
pub const LIBS: &str = "LIBS";
/// Library search directories.
pub const LIBPATH: &str = "LIBPATH";
/// Installed SDK root.
pub const SDK_ROOT: &str = "SDK_ROOT";
/// Exported symbol table.
pub const SDK_SYMBOLS: &str = "SDK_SYMBOLS";
/// Hardware target.
pub const TARGET_HW: &str = "TARGET_HW";

/// Variables of one build environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEnv {
    lists: BTreeMap<String, Vec<String>>,
    scalars: BTreeMap<String, String>,
}

impl BuildEnv {
    /// Creates an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `values` to the list variable `key`.
    pub fn append<I, S>(&mut self, key: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lists
            .entry(key.to_string())
            .or_default()
            .extend(values.into_iter().map(Into::into));
    }

    /// Sets the scalar variable `key`.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.scalars.insert(key.to_string(), value.into());
    }

    /// Returns the list variable `key`, empty if unset.
    #[must_use]
    pub fn list(&self, key: &str) -> &[String] {
        self.lists.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns the scalar variable `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.scalars.get(key).map(String::as_str)
    }

    /// Merges an SDK's build settings into this environment.
    pub fn merge(&mut self, overlay: &EnvOverlay) {
        self.append(CCFLAGS, overlay.compile_flags.iter().cloned());
        self.append(CXXFLAGS, overlay.cxx_flags.iter().cloned());
        self.append(LINKFLAGS, overlay.app_link_template.iter().cloned());
        self.append(LINKFLAGS_EXT, overlay.ext_link_template.iter().cloned());
        self.append(LIBS, overlay.libs.iter().cloned());
        self.append(LIBPATH, [overlay.library_path.to_string_lossy()]);
        self.set(SDK_ROOT, overlay.sdk_root.to_string_lossy());
        self.set(SDK_SYMBOLS, overlay.symbol_file.to_string_lossy());
        self.set(TARGET_HW, overlay.hardware_target.as_str());
    }
}
