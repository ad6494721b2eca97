//! SDK archive extraction.
//!
//! SDK bundles are ZIP files; tar.gz bundles and already unpacked trees are
//! accepted for local installs. The format is detected from the file
//! header, not the name, since URLs do not always carry an extension.
//!
//! If every entry shares one top-level folder it is stripped, so
//! `sdk-1.0/sdk_headers/sdk.opts` lands at `sdk_headers/sdk.opts`.

use flate2::read::GzDecoder;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use walkdir::WalkDir;

use crate::errors::{UfbtError, UfbtResult};

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
const EMPTY_ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Archive formats understood by [`extract_archive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// PKZIP.
    Zip,
    /// Gzip-compressed tarball.
    TarGz,
}

/// Detects the archive format from the first bytes of `path`.
///
/// # Errors
///
/// Returns [`UfbtError::CorruptArchive`] if the header matches no known
/// format, and [`UfbtError::Io`] if the file cannot be read.
pub fn detect_format(path: &Path) -> UfbtResult<ArchiveFormat> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| UfbtError::io(format!("failed to open archive {}", path.display()), e))?;
    let mut header = [0u8; 4];
    let read = file
        .read(&mut header)
        .map_err(|e| UfbtError::io(format!("failed to read archive {}", path.display()), e))?;

    if read >= 4 && (header == ZIP_MAGIC || header == EMPTY_ZIP_MAGIC) {
        Ok(ArchiveFormat::Zip)
    } else if read >= 2 && header[..2] == GZIP_MAGIC {
        Ok(ArchiveFormat::TarGz)
    } else {
        Err(UfbtError::corrupt_archive(format!(
            "{} is neither a ZIP nor a tar.gz archive",
            path.display()
        )))
    }
}

/// Extracts `archive_path` into `dest_dir`.
///
/// # Errors
///
/// Returns [`UfbtError::CorruptArchive`] for unreadable archives or entries
/// escaping the destination, and [`UfbtError::Io`] for filesystem failures.
pub fn extract_archive(archive_path: &Path, dest_dir: &Path) -> UfbtResult<()> {
    match detect_format(archive_path)? {
        ArchiveFormat::Zip => extract_zip(archive_path, dest_dir),
        ArchiveFormat::TarGz => extract_tar_gz(archive_path, dest_dir),
    }
}

/// Extracts a ZIP archive.
///
/// # Errors
///
/// See [`extract_archive`].
pub fn extract_zip(archive_path: &Path, dest_dir: &Path) -> UfbtResult<()> {
    let file = std::fs::File::open(archive_path).map_err(|e| {
        UfbtError::io(format!("failed to open archive {}", archive_path.display()), e)
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| {
        UfbtError::corrupt_archive(format!("{}: {e}", archive_path.display()))
    })?;

    create_dir(dest_dir)?;
    let strip_prefix = common_root(
        (0..archive.len())
            .filter_map(|i| archive.by_index(i).ok().and_then(|entry| entry.enclosed_name())),
    );

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| {
            UfbtError::corrupt_archive(format!("{}: entry {i}: {e}", archive_path.display()))
        })?;
        let entry_path = entry.enclosed_name().ok_or_else(|| {
            UfbtError::corrupt_archive(format!(
                "{}: refusing to extract unsafe path {}",
                archive_path.display(),
                entry.name()
            ))
        })?;

        let Some(output_path) = output_path(dest_dir, &entry_path, strip_prefix.as_deref())?
        else {
            continue;
        };

        if entry.is_dir() {
            create_dir(&output_path)?;
            continue;
        }

        if let Some(parent) = output_path.parent() {
            create_dir(parent)?;
        }
        let mut outfile = std::fs::File::create(&output_path).map_err(|e| {
            UfbtError::io(format!("failed to create {}", output_path.display()), e)
        })?;
        std::io::copy(&mut entry, &mut outfile).map_err(|e| {
            UfbtError::corrupt_archive(format!("failed to extract {}: {e}", output_path.display()))
        })?;

        apply_mode(&output_path, entry.unix_mode());
    }

    Ok(())
}

/// Extracts a tar.gz archive.
///
/// # Errors
///
/// See [`extract_archive`].
pub fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> UfbtResult<()> {
    create_dir(dest_dir)?;
    let strip_prefix = common_root(tar_entry_paths(archive_path)?);

    let mut archive = open_tar_gz(archive_path)?;
    let entries = archive.entries().map_err(|e| {
        UfbtError::corrupt_archive(format!("{}: {e}", archive_path.display()))
    })?;

    for entry in entries {
        let mut entry = entry.map_err(|e| {
            UfbtError::corrupt_archive(format!("{}: {e}", archive_path.display()))
        })?;
        let entry_path = entry
            .path()
            .map_err(|e| UfbtError::corrupt_archive(format!("{}: {e}", archive_path.display())))?
            .into_owned();

        let Some(output_path) = output_path(dest_dir, &entry_path, strip_prefix.as_deref())?
        else {
            continue;
        };

        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            create_dir(&output_path)?;
            ensure_within(dest_dir, &output_path)?;
            continue;
        }
        if entry_type.is_hard_link() {
            return Err(UfbtError::corrupt_archive(format!(
                "{}: refusing to extract hard link {}",
                archive_path.display(),
                entry_path.display()
            )));
        }
        if entry_type.is_symlink() {
            let target = entry
                .link_name()
                .map_err(|e| UfbtError::corrupt_archive(format!("{}: {e}", archive_path.display())))?
                .ok_or_else(|| {
                    UfbtError::corrupt_archive(format!(
                        "{}: symlink {} has no target",
                        archive_path.display(),
                        entry_path.display()
                    ))
                })?;
            check_link_target(dest_dir, &output_path, &target)?;
        }

        if let Some(parent) = output_path.parent() {
            create_dir(parent)?;
            ensure_within(dest_dir, parent)?;
        }
        entry.unpack(&output_path).map_err(|e| {
            UfbtError::corrupt_archive(format!("failed to extract {}: {e}", output_path.display()))
        })?;
    }

    Ok(())
}

/// Copies an unpacked SDK tree from `src` into `dest`.
///
/// # Errors
///
/// Returns [`UfbtError::Configuration`] if `dest` lies inside `src`, and
/// [`UfbtError::Io`] if reading or copying fails.
pub fn copy_tree(src: &Path, dest: &Path) -> UfbtResult<()> {
    create_dir(dest)?;
    let resolve = |p: &Path| {
        p.canonicalize()
            .map_err(|e| UfbtError::io(format!("failed to resolve {}", p.display()), e))
    };
    if resolve(dest)?.starts_with(resolve(src)?) {
        return Err(UfbtError::configuration(format!(
            "cannot install SDK from {}: it contains the destination {}",
            src.display(),
            dest.display()
        )));
    }

    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry.map_err(|e| {
            let message = format!("failed to walk {}", src.display());
            match e.into_io_error() {
                Some(io) => UfbtError::io(message, io),
                None => UfbtError::state(message),
            }
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| UfbtError::state(format!("{} escaped {}", entry.path().display(), src.display())))?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            create_dir(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                create_dir(parent)?;
            }
            std::fs::copy(entry.path(), &target).map_err(|e| {
                UfbtError::io(format!("failed to copy {}", entry.path().display()), e)
            })?;
        }
    }
    Ok(())
}

fn open_tar_gz(archive_path: &Path) -> UfbtResult<Archive<GzDecoder<std::fs::File>>> {
    let file = std::fs::File::open(archive_path).map_err(|e| {
        UfbtError::io(format!("failed to open archive {}", archive_path.display()), e)
    })?;
    Ok(Archive::new(GzDecoder::new(file)))
}

fn tar_entry_paths(archive_path: &Path) -> UfbtResult<Vec<PathBuf>> {
    let mut archive = open_tar_gz(archive_path)?;
    let entries = archive.entries().map_err(|e| {
        UfbtError::corrupt_archive(format!("{}: {e}", archive_path.display()))
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            UfbtError::corrupt_archive(format!("{}: {e}", archive_path.display()))
        })?;
        let path = entry
            .path()
            .map_err(|e| UfbtError::corrupt_archive(format!("{}: {e}", archive_path.display())))?;
        paths.push(path.into_owned());
    }
    Ok(paths)
}

/// Returns the single top-level folder shared by all entries.
///
/// A lone top-level file is not a folder, so at least one entry must be
/// nested below the shared component.
fn common_root(paths: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
    let mut root: Option<PathBuf> = None;
    let mut has_nested_entries = false;

    for path in paths {
        let mut components = path.components().filter(|c| !matches!(c, Component::CurDir));
        let first = PathBuf::from(components.next()?.as_os_str());
        if components.next().is_some() {
            has_nested_entries = true;
        }
        match &root {
            None => root = Some(first),
            Some(existing) if *existing != first => return None,
            Some(_) => {}
        }
    }

    if has_nested_entries { root } else { None }
}

/// Maps an entry path to its location under `dest_dir`.
///
/// Returns `Ok(None)` for the stripped root folder itself.
fn output_path(
    dest_dir: &Path,
    entry_path: &Path,
    strip_prefix: Option<&Path>,
) -> UfbtResult<Option<PathBuf>> {
    if entry_path.is_absolute()
        || entry_path
            .components()
            .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(UfbtError::corrupt_archive(format!(
            "refusing to extract path outside the destination: {}",
            entry_path.display()
        )));
    }

    let normalized: PathBuf = entry_path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let relative = match strip_prefix.map(|prefix| normalized.strip_prefix(prefix)) {
        Some(Ok(stripped)) if stripped.as_os_str().is_empty() => return Ok(None),
        Some(Ok(stripped)) => stripped.to_path_buf(),
        _ => normalized,
    };
    if relative.as_os_str().is_empty() {
        return Ok(None);
    }
    Ok(Some(dest_dir.join(relative)))
}

/// Rejects symlink targets that are absolute or climb out of `dest_dir`.
fn check_link_target(dest_dir: &Path, link_path: &Path, target: &Path) -> UfbtResult<()> {
    let escapes = || {
        UfbtError::corrupt_archive(format!(
            "refusing to extract symlink {} pointing outside the destination: {}",
            link_path.display(),
            target.display()
        ))
    };

    let mut resolved: Vec<_> = link_path
        .strip_prefix(dest_dir)
        .map_err(|_| escapes())?
        .parent()
        .map(|dir| dir.components().collect())
        .unwrap_or_default();
    for component in target.components() {
        match component {
            Component::Normal(_) => resolved.push(component),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop().ok_or_else(escapes)?;
            }
            Component::RootDir | Component::Prefix(_) => return Err(escapes()),
        }
    }
    Ok(())
}

/// Fails if `path`, after resolving links already on disk, is not below `dest_dir`.
fn ensure_within(dest_dir: &Path, path: &Path) -> UfbtResult<()> {
    let canonical = |p: &Path| {
        p.canonicalize()
            .map_err(|e| UfbtError::io(format!("failed to resolve {}", p.display()), e))
    };
    if canonical(path)?.starts_with(canonical(dest_dir)?) {
        Ok(())
    } else {
        Err(UfbtError::corrupt_archive(format!(
            "refusing to extract through a link leaving the destination: {}",
            path.display()
        )))
    }
}

/// Restores permission bits recorded in the archive. Failures are ignored.
#[cfg(unix)]
fn apply_mode(path: &Path, mode: Option<u32>) {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = mode {
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o777));
    }
}

#[cfg(windows)]
fn apply_mode(_path: &Path, _mode: Option<u32>) {}

fn create_dir(dir: &Path) -> UfbtResult<()> {
    std::fs::create_dir_all(dir)
        .map_err(|e| UfbtError::io(format!("failed to create {}", dir.display()), e))
}
