//! Assembly of downloaded chunks into the destination file.
//!
//! Chunks arrive in any order, so they are written at their absolute offsets
//! into a temporary `<dest>.downloading` file. The temporary file only
//! replaces `dest` once the whole download succeeded; a failed session leaves
//! no result file behind.

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::error::{DownloadError, DownloadResult};

/// Extension appended to the destination while a download is in progress.
pub const DOWNLOADING_EXTENSION: &str = "downloading";

/// Writes chunks into a temporary file and commits it on success.
#[derive(Debug)]
pub struct ChunkWriter {
    file: File,
    dest: PathBuf,
    temp_path: PathBuf,
    file_size: u64,
}

impl ChunkWriter {
    /// Create the temporary file for `dest`, sized to `file_size`.
    ///
    /// Missing parent directories are created. An existing temporary file from
    /// an earlier session is truncated.
    pub fn create(dest: &Path, file_size: u64) -> DownloadResult<Self> {
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| DownloadError::CreateDirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let temp_path = downloading_path(dest);
        let write_failed = |e| DownloadError::WriteFailed {
            path: temp_path.clone(),
            source: e,
        };

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(write_failed)?;
        file.set_len(file_size).map_err(write_failed)?;

        Ok(Self {
            file,
            dest: dest.to_path_buf(),
            temp_path,
            file_size,
        })
    }

    /// Final destination of the download.
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Temporary file chunks are written into.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Write `data` at absolute `offset`.
    ///
    /// # Errors
    ///
    /// Fails if the data would extend past the expected file size, or on any
    /// I/O error.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> DownloadResult<()> {
        let end = offset.saturating_add(data.len() as u64);
        if end > self.file_size {
            return Err(DownloadError::WriteFailed {
                path: self.temp_path.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("write to {}..{} past file size {}", offset, end, self.file_size),
                ),
            });
        }

        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.write_all(data))
            .map_err(|e| DownloadError::WriteFailed {
                path: self.temp_path.clone(),
                source: e,
            })
    }

    /// Flush the temporary file and move it to the destination.
    pub fn commit(self) -> DownloadResult<PathBuf> {
        let write_failed = |path: &Path, e| DownloadError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        };

        self.file
            .sync_all()
            .map_err(|e| write_failed(&self.temp_path, e))?;
        drop(self.file);
        fs::rename(&self.temp_path, &self.dest).map_err(|e| write_failed(&self.dest, e))?;
        Ok(self.dest)
    }

    /// Discard the temporary file.
    pub fn abort(self) {
        drop(self.file);
        // The file may never have been flushed; nothing to report if it is gone.
        fs::remove_file(&self.temp_path).ok();
    }
}

/// Path of the temporary file used while downloading `dest`.
pub fn downloading_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".");
    name.push(DOWNLOADING_EXTENSION);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_downloading_path() {
        assert_eq!(
            downloading_path(Path::new("/maps/Germany.mwm")),
            PathBuf::from("/maps/Germany.mwm.downloading")
        );
    }

    #[test]
    fn test_out_of_order_writes_assemble_file() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("region.mwm");

        let mut writer = ChunkWriter::create(&dest, 10).unwrap();
        assert!(writer.temp_path().exists());
        assert!(!dest.exists());

        writer.write_at(5, b"world").unwrap();
        writer.write_at(0, b"hello").unwrap();
        let path = writer.commit().unwrap();

        assert_eq!(path, dest);
        assert_eq!(fs::read(&dest).unwrap(), b"helloworld");
        assert!(!downloading_path(&dest).exists());
    }

    #[test]
    fn test_abort_leaves_no_files() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("region.mwm");

        let mut writer = ChunkWriter::create(&dest, 4).unwrap();
        writer.write_at(0, b"ab").unwrap();
        writer.abort();

        assert!(!dest.exists());
        assert!(!downloading_path(&dest).exists());
    }

    #[test]
    fn test_write_past_end_rejected() {
        let temp = TempDir::new().unwrap();
        let mut writer = ChunkWriter::create(&temp.path().join("region.mwm"), 4).unwrap();
        assert!(matches!(
            writer.write_at(2, b"abc"),
            Err(DownloadError::WriteFailed { .. })
        ));
    }

    #[test]
    fn test_creates_parent_directories() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("nested/dir/region.mwm");

        let writer = ChunkWriter::create(&dest, 0).unwrap();
        writer.commit().unwrap();

        assert_eq!(fs::metadata(&dest).unwrap().len(), 0);
    }
}
