//! SHA-256 verification of assembled downloads.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use super::error::{DownloadError, DownloadResult};

/// Buffer size for reading files during checksum calculation (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Calculate the lowercase hex SHA-256 of a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn calculate_file_checksum(path: &Path) -> DownloadResult<String> {
    let read_failed = |e| DownloadError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let mut file = File::open(path).map_err(read_failed)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(read_failed)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Verify that a file matches an expected SHA-256.
///
/// The expected value is compared case-insensitively, so checksums published
/// in upper-case hex are accepted.
pub fn verify_checksum(path: &Path, expected: &str) -> DownloadResult<()> {
    let actual = calculate_file_checksum(path)?;
    if !actual.eq_ignore_ascii_case(expected.trim()) {
        return Err(DownloadError::ChecksumMismatch {
            filename: path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    fn write_file(dir: &TempDir, name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        File::create(&path).unwrap().write_all(data).unwrap();
        path
    }

    #[test]
    fn test_calculate_file_checksum() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "region.mwm", b"hello world");
        assert_eq!(calculate_file_checksum(&path).unwrap(), HELLO_SHA256);
    }

    #[test]
    fn test_calculate_nonexistent_file() {
        let result = calculate_file_checksum(Path::new("/nonexistent/region.mwm"));
        assert!(matches!(result, Err(DownloadError::ReadFailed { .. })));
    }

    #[test]
    fn test_verify_checksum_ignores_case() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "region.mwm", b"hello world");
        assert!(verify_checksum(&path, &HELLO_SHA256.to_uppercase()).is_ok());
    }

    #[test]
    fn test_verify_checksum_mismatch() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "region.mwm", b"hello world");

        match verify_checksum(&path, "deadbeef") {
            Err(DownloadError::ChecksumMismatch {
                filename, actual, ..
            }) => {
                assert_eq!(filename, "region.mwm");
                assert_eq!(actual, HELLO_SHA256);
            }
            other => panic!("Expected ChecksumMismatch, got {:?}", other),
        }
    }
}
