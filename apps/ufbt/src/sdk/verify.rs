//! SHA-256 verification of downloaded archives.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::errors::{UfbtError, UfbtResult};

/// Verifies that a file matches the expected SHA-256 checksum.
///
/// # Errors
///
/// Returns [`UfbtError::CorruptArchive`] on mismatch and [`UfbtError::Io`]
/// if the file cannot be read.
pub fn verify_checksum(file_path: &Path, expected: &str) -> UfbtResult<()> {
    let computed = compute_sha256(file_path)?;

    if computed != expected.trim().to_lowercase() {
        return Err(UfbtError::corrupt_archive(format!(
            "checksum mismatch for {}: expected {expected}, got {computed}",
            file_path.display()
        )));
    }

    Ok(())
}

/// Computes the SHA-256 hash of a file as a lowercase hex string.
///
/// # Errors
///
/// Returns [`UfbtError::Io`] if the file cannot be opened or read.
pub fn compute_sha256(file_path: &Path) -> UfbtResult<String> {
    let mut file = std::fs::File::open(file_path).map_err(|e| {
        UfbtError::io(format!("failed to open {} for checksum", file_path.display()), e)
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(|e| {
            UfbtError::io(format!("failed to read {} for checksum", file_path.display()), e)
        })?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    // sha256("hello world")
    const HELLO_SHA: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn computes_known_hash() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("file");
        std::fs::write(&path, "hello world").unwrap();
        assert_eq!(compute_sha256(&path).unwrap(), HELLO_SHA);
    }

    #[test]
    fn accepts_uppercase_expected_hash() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("file");
        std::fs::write(&path, "hello world").unwrap();
        verify_checksum(&path, &HELLO_SHA.to_uppercase()).unwrap();
    }

    #[test]
    fn mismatch_is_corrupt_archive() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("file");
        std::fs::write(&path, "tampered").unwrap();
        let err = verify_checksum(&path, HELLO_SHA).unwrap_err();
        assert!(matches!(err, UfbtError::CorruptArchive { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let temp = TempDir::new().unwrap();
        let err = compute_sha256(&temp.path().join("absent")).unwrap_err();
        assert!(matches!(err, UfbtError::Io { .. }));
    }
}
