//! Progress reporting for chunked downloads.

/// Snapshot of a download session, reported after every finished chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DownloadProgress {
    /// Bytes of chunks that completed successfully.
    pub bytes_downloaded: u64,
    /// Size of the whole file.
    pub total_bytes: u64,
    /// Number of chunks that completed successfully.
    pub chunks_completed: usize,
    /// Number of chunks in the file.
    pub total_chunks: usize,
    /// Number of mirrors that have not failed.
    pub alive_mirrors: usize,
}

impl DownloadProgress {
    /// Progress as a percentage based on bytes.
    ///
    /// An empty file counts as complete.
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            100.0
        } else {
            (self.bytes_downloaded as f64 / self.total_bytes as f64) * 100.0
        }
    }

    /// Check if every chunk has completed.
    pub fn is_complete(&self) -> bool {
        self.chunks_completed == self.total_chunks
    }
}

/// Progress callback invoked by the download engine.
pub type ProgressCallback = Box<dyn Fn(DownloadProgress) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_by_bytes() {
        let progress = DownloadProgress {
            bytes_downloaded: 500,
            total_bytes: 800,
            chunks_completed: 2,
            total_chunks: 4,
            alive_mirrors: 3,
        };
        assert_eq!(progress.percent(), 62.5);
        assert!(!progress.is_complete());
    }

    #[test]
    fn test_empty_file_is_complete() {
        let progress = DownloadProgress::default();
        assert_eq!(progress.percent(), 100.0);
        assert!(progress.is_complete());
    }
}
