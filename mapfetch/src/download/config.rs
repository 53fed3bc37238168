//! Configuration for a mirror download session.

use std::time::Duration;

use super::transport::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};

/// Default chunk size in bytes (512 KiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 512 * 1024;

/// Settings for [`MirrorDownloader`](super::MirrorDownloader).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadConfig {
    /// Mirror URLs serving the same file.
    ///
    /// Each entry is one slot in the server pool, so listing a mirror twice
    /// allows two concurrent chunks from it.
    pub mirrors: Vec<String>,

    /// Size of each chunk in bytes.
    pub chunk_size: u64,

    /// Timeout for a single chunk request.
    pub timeout: Duration,

    /// `User-Agent` header sent to mirrors.
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            mirrors: Vec::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl DownloadConfig {
    /// Create a configuration for the given mirrors.
    pub fn new(mirrors: Vec<String>) -> Self {
        Self {
            mirrors,
            ..Default::default()
        }
    }

    /// Add a mirror URL.
    pub fn with_mirror(mut self, url: impl Into<String>) -> Self {
        self.mirrors.push(url.into());
        self
    }

    /// Set the chunk size in bytes.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
