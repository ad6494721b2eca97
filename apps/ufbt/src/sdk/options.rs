//! The SDK option manifest (`sdk.opts`).
//!
//! The manifest is a flat JSON object of compiler and linker argument
//! strings. Paths inside it are written relative to a placeholder token
//! (`sdk_path_subst`), which is replaced with the directory holding the
//! manifest. The entry-point and map-file tokens stay in the link flags until
//! an application is linked.
//!
//! Every key in [`REQUIRED_KEYS`] must be present. Nothing is defaulted.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::state::InstalledSdk;
use crate::errors::{UfbtError, UfbtResult};

/// Keys `sdk.opts` must define.
pub const REQUIRED_KEYS: [&str; 10] = [
    "sdk_symbols",
    "cc_args",
    "cpp_args",
    "linker_args_app",
    "linker_args_ext",
    "linker_libs",
    "app_ep_subst",
    "sdk_path_subst",
    "map_file_subst",
    "hardware",
];

/// Raw contents of `sdk.opts`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SdkOptions {
    /// Path of the exported symbol list.
    pub sdk_symbols: String,
    /// C compiler arguments.
    pub cc_args: String,
    /// C++ compiler arguments.
    pub cpp_args: String,
    /// Linker arguments for applications.
    pub linker_args_app: String,
    /// Linker arguments for plugins loaded by other applications.
    pub linker_args_ext: String,
    /// Libraries to link.
    pub linker_libs: String,
    /// Entry-point placeholder in the linker arguments.
    pub app_ep_subst: String,
    /// SDK path placeholder.
    pub sdk_path_subst: String,
    /// Map-file placeholder in the linker arguments.
    pub map_file_subst: String,
    /// Hardware target the SDK was built for.
    pub hardware: String,
}

impl SdkOptions {
    /// Reads and validates the manifest at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`UfbtError::MalformedSdk`] naming the first missing key,
    /// [`UfbtError::CorruptArchive`] if the file is not a JSON object and
    /// [`UfbtError::Io`] if it cannot be read.
    pub fn load(path: &Path) -> UfbtResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| UfbtError::io(format!("failed to read {}", path.display()), e))?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> UfbtResult<Self> {
        let value: serde_json::Value = serde_json::from_str(content).map_err(|e| {
            UfbtError::corrupt_archive(format!("{} is not valid JSON: {e}", path.display()))
        })?;
        let object = value.as_object().ok_or_else(|| {
            UfbtError::corrupt_archive(format!("{} is not a JSON object", path.display()))
        })?;

        // Non-string values count as missing.
        if let Some(key) = REQUIRED_KEYS
            .iter()
            .find(|key| !object.get(**key).is_some_and(serde_json::Value::is_string))
        {
            return Err(UfbtError::malformed_sdk(*key, path));
        }

        serde_json::from_value(value).map_err(|e| {
            UfbtError::corrupt_archive(format!("{}: {e}", path.display()))
        })
    }
}

/// Compiler and linker settings derived from an installed SDK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvOverlay {
    /// Root of the installed SDK.
    pub sdk_root: PathBuf,
    /// Directory holding `sdk.opts`; the SDK path token resolves here.
    pub sdk_data_dir: PathBuf,
    /// C compiler flags.
    pub compile_flags: Vec<String>,
    /// C++ compiler flags.
    pub cxx_flags: Vec<String>,
    /// Application link flags, entry-point and map-file tokens unresolved.
    pub app_link_template: Vec<String>,
    /// Plugin link flags, entry-point and map-file tokens unresolved.
    pub ext_link_template: Vec<String>,
    /// Libraries to link.
    pub libs: Vec<String>,
    /// Exported symbol list.
    pub symbol_file: PathBuf,
    /// Hardware target.
    pub hardware_target: String,
    /// Directory of prebuilt SDK libraries.
    pub library_path: PathBuf,
    /// Entry-point token.
    pub entry_point_token: String,
    /// Map-file token.
    pub map_file_token: String,
}

impl EnvOverlay {
    /// Resolves the entry-point and map-file tokens in `flags` for one
    /// application.
    #[must_use]
    pub fn resolve_link_flags(&self, flags: &[String], entry_point: &str, map_file: &Path) -> Vec<String> {
        let map_file = map_file.to_string_lossy();
        substitute_tokens(
            flags,
            &[
                (self.entry_point_token.as_str(), entry_point),
                (self.map_file_token.as_str(), map_file.as_ref()),
            ],
        )
    }
}

/// Reads the SDK's option manifest and derives the build settings.
///
/// # Errors
///
/// Returns [`UfbtError::CorruptArchive`] if the SDK has no manifest, and the
/// errors of [`SdkOptions::load`].
pub fn configure(sdk: &InstalledSdk) -> UfbtResult<EnvOverlay> {
    let options_path = sdk.options_path().ok_or_else(|| {
        UfbtError::corrupt_archive(format!(
            "SDK at {} has no sdk.opts manifest",
            sdk.root.display()
        ))
    })?;
    let options = SdkOptions::load(&options_path)?;
    let sdk_data_dir = options_path
        .parent()
        .map_or_else(|| sdk.root.clone(), Path::to_path_buf);

    tracing::debug!(manifest = %options_path.display(), "configuring SDK build environment");
    Ok(overlay_from_options(&options, &sdk.root, &sdk_data_dir))
}

fn overlay_from_options(options: &SdkOptions, sdk_root: &Path, sdk_data_dir: &Path) -> EnvOverlay {
    let data_dir = sdk_data_dir.to_string_lossy();
    let sdk_path = [(options.sdk_path_subst.as_str(), data_dir.as_ref())];
    let expand = |raw: &str| substitute_tokens(&split_args(raw), &sdk_path);

    let symbols = substitute_tokens(&[options.sdk_symbols.trim().to_string()], &sdk_path).concat();
    let symbol_file = PathBuf::from(symbols);
    let symbol_file = if symbol_file.is_absolute() {
        symbol_file
    } else {
        sdk_data_dir.join(symbol_file)
    };

    EnvOverlay {
        sdk_root: sdk_root.to_path_buf(),
        sdk_data_dir: sdk_data_dir.to_path_buf(),
        compile_flags: expand(&options.cc_args),
        cxx_flags: expand(&options.cpp_args),
        app_link_template: expand(&options.linker_args_app),
        ext_link_template: expand(&options.linker_args_ext),
        libs: expand(&options.linker_libs),
        symbol_file,
        hardware_target: options.hardware.clone(),
        library_path: sdk_root.join("lib"),
        entry_point_token: options.app_ep_subst.clone(),
        map_file_token: options.map_file_subst.clone(),
    }
}

/// Replaces every occurrence of each token with its value.
///
/// Empty tokens are ignored.
#[must_use]
pub fn substitute_tokens(flags: &[String], replacements: &[(&str, &str)]) -> Vec<String> {
    flags
        .iter()
        .map(|flag| {
            replacements
                .iter()
                .filter(|(token, _)| !token.is_empty())
                .fold(flag.clone(), |acc, (token, value)| acc.replace(token, value))
        })
        .collect()
}

/// Splits a command-line fragment into arguments.
///
/// Whitespace separates arguments; single and double quotes group text and
/// are removed.
#[must_use]
pub fn split_args(raw: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quote: Option<char> = None;

    for c in raw.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_arg = true;
            }
            None if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            None => {
                current.push(c);
                in_arg = true;
            }
        }
    }
    if in_arg {
        args.push(current);
    }
    args
}
