//! Error types for chunked mirror downloads.
//!
//! [`StrategyError`] covers misuse of the scheduler: these indicate a bug in
//! the calling code and are never produced by network conditions.
//! [`DownloadError`] covers everything the download engine can run into.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::chunks::{ChunkId, ChunkState};
use super::range::ByteRange;
use super::servers::{ServerId, ServerState};

/// Result type for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;

/// Contract violations detected by the chunk scheduler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StrategyError {
    /// The scheduler was constructed without any mirror.
    #[error("at least one mirror server is required")]
    NoServers,

    /// A chunk size of zero cannot partition a file.
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    /// The scheduler was polled before `init_chunks`.
    #[error("chunks are not initialized yet")]
    NotInitialized,

    /// `init_chunks` was called more than once on the same session.
    #[error("chunks are already initialized for this session")]
    AlreadyInitialized,

    /// A finished range does not match any chunk currently in progress.
    #[error("no chunk in progress for range {range}")]
    UnknownChunk { range: ByteRange },

    /// A chunk id outside the table was used.
    #[error("chunk {0} does not exist")]
    NoSuchChunk(ChunkId),

    /// A chunk was asked to make a transition its current state forbids.
    #[error("chunk {chunk} cannot become {to} from {from:?}")]
    InvalidChunkTransition {
        chunk: ChunkId,
        from: ChunkState,
        to: &'static str,
    },

    /// A server id outside the pool was used.
    #[error("server {0} does not exist")]
    NoSuchServer(ServerId),

    /// A server was asked to make a transition its current state forbids.
    #[error("server {server} cannot become {to} from {from:?}")]
    InvalidServerTransition {
        server: ServerId,
        from: ServerState,
        to: &'static str,
    },
}

/// Errors that can occur while downloading a file from mirrors.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The scheduler rejected a call.
    #[error("scheduler contract violated: {0}")]
    Strategy(#[from] StrategyError),

    /// Failed to build the HTTP client.
    #[error("failed to create HTTP client: {0}")]
    ClientBuild(String),

    /// A request to a mirror failed.
    #[error("request to {url} failed: {reason}")]
    Http { url: String, reason: String },

    /// A request to a mirror timed out.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// A mirror answered with a status that cannot carry the requested range.
    #[error("{url} answered {status} for range {range}")]
    UnexpectedStatus {
        url: String,
        status: u16,
        range: ByteRange,
    },

    /// A mirror served a different number of bytes than requested.
    #[error("{url} served {actual} bytes for range {range}, expected {expected}")]
    SizeMismatch {
        url: String,
        range: ByteRange,
        expected: u64,
        actual: u64,
    },

    /// A mirror served another span, or a file of another size, than requested.
    #[error("{url} served content range '{actual}', expected '{expected}'")]
    ContentRangeMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    /// Failed to read a file.
    #[error("failed to read {}: {source}", path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file.
    #[error("failed to write {}: {source}", path.display())]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// The downloaded file does not match the expected checksum.
    #[error("checksum mismatch for {filename}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        filename: String,
        expected: String,
        actual: String,
    },

    /// Every mirror failed once while chunks were still outstanding.
    #[error("all {mirrors} mirrors failed with {remaining_chunks} chunks outstanding")]
    AllMirrorsFailed {
        mirrors: usize,
        remaining_chunks: usize,
    },

    /// The download was cancelled before it completed.
    #[error("download cancelled")]
    Cancelled,
}

impl DownloadError {
    /// Whether this error concerns a single chunk transfer.
    ///
    /// Chunk-level errors are absorbed by the scheduler (the mirror is dropped
    /// and the range requeued); anything else ends the session.
    pub fn is_chunk_failure(&self) -> bool {
        matches!(
            self,
            Self::Http { .. }
                | Self::Timeout { .. }
                | Self::UnexpectedStatus { .. }
                | Self::SizeMismatch { .. }
                | Self::ContentRangeMismatch { .. }
        )
    }
}
