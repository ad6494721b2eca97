//! Native application builds.
//!
//! For each buildable application the driver compiles its sources, links a
//! debug ELF, derives the compact `.fap`, validates the result against the
//! SDK's exported symbols and installs copies:
//!
//! ```text
//! <app dir>/
//!   .ufbt/build/<appid>/   # objects, map file, intermediate ELFs
//!   dist/<appid>.fap
//!   dist/debug/<appid>_d.elf
//! ```

use std::fs;
use std::path::{Component, Path, PathBuf};

use super::env::{
    BuildEnv, CCFLAGS, CXXFLAGS, LIBPATH, LIBS, LINKFLAGS, LINKFLAGS_EXT, SDK_ROOT, TARGET_HW,
};
use super::toolchain::{Toolchain, is_cxx_source};
use crate::errors::{UfbtError, UfbtResult};
use crate::project::fam::AppType;
use crate::project::{AppManifest, SymbolTable};
use crate::sdk::EnvOverlay;

/// Build output directory inside the application directory.
pub const BUILD_DIR: &str = ".ufbt/build";
/// Installed artifact directory inside the application directory.
pub const DIST_DIR: &str = "dist";

const SOURCE_EXTENSIONS: [&str; 5] = ["c", "cpp", "cc", "cxx", "C"];

/// Structural checks on a compact ELF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Size of the compact ELF in bytes.
    pub size: u64,
    /// Referenced symbols the SDK does not export.
    pub missing_symbols: Vec<String>,
}

impl ValidationReport {
    /// Returns `true` if the artifact can be loaded.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.size > 0 && self.missing_symbols.is_empty()
    }
}

/// Installed outputs of one application build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifactSet {
    /// Application id.
    pub app_id: String,
    /// Installed compact ELF (`dist/<appid>.fap`).
    pub compact_elf: PathBuf,
    /// Installed debug ELF (`dist/debug/<appid>_d.elf`).
    pub debug_elf: PathBuf,
    /// Validation result.
    pub validation: ValidationReport,
}

/// Builds applications against one SDK with toolchain `T`.
#[derive(Debug)]
pub struct BuildDriver<T: Toolchain> {
    toolchain: T,
    overlay: EnvOverlay,
    env: BuildEnv,
    symbols: SymbolTable,
    build_dir: PathBuf,
    dist_dir: PathBuf,
}

impl<T: Toolchain> BuildDriver<T> {
    /// Prepares a driver writing into `app_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the SDK's symbol table cannot be read.
    pub fn new(toolchain: T, overlay: EnvOverlay, app_dir: &Path) -> UfbtResult<Self> {
        let symbols = SymbolTable::load(&overlay.symbol_file)?;
        tracing::debug!(
            symbols = symbols.len(),
            api = symbols.api_version.as_deref().unwrap_or("unknown"),
            "loaded SDK symbol table"
        );
        if symbols.is_empty() {
            tracing::warn!(
                "{} exports no symbols; every application will fail validation",
                overlay.symbol_file.display()
            );
        }
        let mut env = BuildEnv::new();
        env.merge(&overlay);
        tracing::debug!(
            hardware = env.get(TARGET_HW).unwrap_or("unknown"),
            sdk = env.get(SDK_ROOT).unwrap_or_default(),
            "merged SDK build environment"
        );
        Ok(Self {
            toolchain,
            overlay,
            env,
            symbols,
            build_dir: app_dir.join(BUILD_DIR),
            dist_dir: app_dir.join(DIST_DIR),
        })
    }

    fn debug_dist_dir(&self) -> PathBuf {
        self.dist_dir.join("debug")
    }

    /// Builds every buildable application in `apps`.
    ///
    /// # Errors
    ///
    /// Stops at the first application that fails; see [`Self::build`].
    pub fn build_all(&self, apps: &[AppManifest]) -> UfbtResult<Vec<BuildArtifactSet>> {
        apps.iter()
            .filter(|app| app.is_buildable())
            .map(|app| self.build(app))
            .collect()
    }

    /// Builds, validates and installs one application.
    ///
    /// # Errors
    ///
    /// - [`UfbtError::Configuration`] if the application is not buildable,
    ///   has no entry point or no sources
    /// - [`UfbtError::Validation`] if the compact ELF is empty or references
    ///   symbols the SDK does not export
    /// - [`UfbtError::ProcessExitCode`] if a tool fails
    pub fn build(&self, app: &AppManifest) -> UfbtResult<BuildArtifactSet> {
        if !app.is_buildable() {
            return Err(UfbtError::configuration(format!(
                "application '{}' is not an external application or plugin",
                app.app_id
            )));
        }
        let entry_point = app.entry_point.as_deref().ok_or_else(|| {
            UfbtError::configuration(format!("application '{}' has no entry_point", app.app_id))
        })?;

        let sources = expand_sources(app)?;
        let obj_dir = self.build_dir.join(&app.app_id);
        fs::create_dir_all(&obj_dir)
            .map_err(|e| UfbtError::io(format!("failed to create {}", obj_dir.display()), e))?;

        tracing::info!(app = %app.app_id, sources = sources.len(), "building application");

        let mut objects = Vec::with_capacity(sources.len());
        for source in &sources {
            let object = object_path(&obj_dir, &app.manifest_dir, source);
            if let Some(parent) = object.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| UfbtError::io(format!("failed to create {}", parent.display()), e))?;
            }
            tracing::debug!(source = %source.display(), "compiling");
            self.toolchain
                .compile(source, &object, &self.compile_flags(app, source))?;
            objects.push(object);
        }

        let map_file = obj_dir.join(format!("{}.map", app.app_id));
        let debug_elf = obj_dir.join(format!("{}_d.elf", app.app_id));
        let compact_elf = obj_dir.join(format!("{}.fap", app.app_id));
        self.toolchain
            .link(&objects, &debug_elf, &self.link_flags(app, entry_point, &map_file))?;
        self.toolchain.compact(&debug_elf, &compact_elf)?;

        let validation = self.validate(&compact_elf, &debug_elf)?;
        if !validation.is_valid() {
            let reason = if validation.size == 0 {
                "compact ELF is empty".to_string()
            } else {
                format!(
                    "references symbols not exported by the SDK: {}",
                    validation.missing_symbols.join(", ")
                )
            };
            return Err(UfbtError::validation(&app.app_id, reason));
        }

        let artifacts = self.install(&app.app_id, &compact_elf, &debug_elf, validation)?;
        tracing::info!(app = %app.app_id, fap = %artifacts.compact_elf.display(), "application built");
        Ok(artifacts)
    }

    fn compile_flags(&self, app: &AppManifest, source: &Path) -> Vec<String> {
        let base = if is_cxx_source(source) {
            self.env.list(CXXFLAGS)
        } else {
            self.env.list(CCFLAGS)
        };
        base.iter()
            .cloned()
            .chain(app.cdefines.iter().map(|d| format!("-D{d}")))
            .chain(std::iter::once(format!("-I{}", app.manifest_dir.display())))
            .collect()
    }

    fn link_flags(&self, app: &AppManifest, entry_point: &str, map_file: &Path) -> Vec<String> {
        let template = match app.app_type {
            AppType::Plugin => self.env.list(LINKFLAGS_EXT),
            _ => self.env.list(LINKFLAGS),
        };
        let mut flags = self.overlay.resolve_link_flags(template, entry_point, map_file);
        flags.extend(self.env.list(LIBPATH).iter().map(|dir| format!("-L{dir}")));
        flags.extend(app.fap_libs.iter().map(|lib| format!("-l{lib}")));
        flags.extend(self.env.list(LIBS).iter().cloned());
        flags
    }

    fn validate(&self, compact_elf: &Path, debug_elf: &Path) -> UfbtResult<ValidationReport> {
        let size = fs::metadata(compact_elf)
            .map_err(|e| UfbtError::io(format!("failed to inspect {}", compact_elf.display()), e))?
            .len();
        let undefined = self.toolchain.undefined_symbols(debug_elf)?;
        let missing_symbols = self.symbols.missing(undefined.iter().map(String::as_str));
        Ok(ValidationReport { size, missing_symbols })
    }

    fn install(
        &self,
        app_id: &str,
        compact_elf: &Path,
        debug_elf: &Path,
        validation: ValidationReport,
    ) -> UfbtResult<BuildArtifactSet> {
        let debug_dir = self.debug_dist_dir();
        fs::create_dir_all(&debug_dir)
            .map_err(|e| UfbtError::io(format!("failed to create {}", debug_dir.display()), e))?;

        let installed_fap = self.dist_dir.join(format!("{app_id}.fap"));
        let installed_debug = debug_dir.join(format!("{app_id}_d.elf"));
        for (from, to) in [(compact_elf, &installed_fap), (debug_elf, &installed_debug)] {
            fs::copy(from, to)
                .map_err(|e| UfbtError::io(format!("failed to install {}", to.display()), e))?;
        }

        Ok(BuildArtifactSet {
            app_id: app_id.to_string(),
            compact_elf: installed_fap,
            debug_elf: installed_debug,
            validation,
        })
    }
}

/// Expands an application's source globs, relative to its manifest.
///
/// Patterns starting with `!` remove earlier matches. Only C and C++ files
/// are kept.
///
/// # Errors
///
/// Returns [`UfbtError::Configuration`] for an invalid pattern or when
/// nothing matches.
pub fn expand_sources(app: &AppManifest) -> UfbtResult<Vec<PathBuf>> {
    let mut sources: Vec<PathBuf> = Vec::new();

    for pattern in &app.sources {
        let (exclude, pattern) = match pattern.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, pattern.as_str()),
        };
        let full = app.manifest_dir.join(pattern);
        let matches = glob::glob(&full.to_string_lossy()).map_err(|e| {
            UfbtError::configuration(format!(
                "invalid source pattern '{pattern}' in application '{}': {e}",
                app.app_id
            ))
        })?;
        let matched: Vec<PathBuf> = matches
            .filter_map(Result::ok)
            .filter(|path| path.is_file() && has_source_extension(path))
            .collect();

        if exclude {
            sources.retain(|s| !matched.contains(s));
        } else {
            for path in matched {
                if !sources.contains(&path) {
                    sources.push(path);
                }
            }
        }
    }

    if sources.is_empty() {
        return Err(UfbtError::configuration(format!(
            "application '{}' has no sources matching {:?}",
            app.app_id, app.sources
        )));
    }
    sources.sort();
    Ok(sources)
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e))
}

/// Objects always land under `obj_dir`: `..` becomes `__` and roots are dropped.
fn object_path(obj_dir: &Path, manifest_dir: &Path, source: &Path) -> PathBuf {
    let relative = source.strip_prefix(manifest_dir).unwrap_or(source);
    let mut path = obj_dir.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::ParentDir => path.push("__"),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    let mut name = path.into_os_string();
    name.push(".o");
    PathBuf::from(name)
}
