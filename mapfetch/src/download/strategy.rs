//! Chunk scheduling across a fixed pool of mirrors.
//!
//! [`ChunksDownloadStrategy`] couples a [`ChunkTable`] with a [`ServerPool`]
//! and exposes the two calls a download engine needs: [`next_chunk`] to get a
//! `(server, range)` assignment and [`chunk_finished`] to report its outcome.
//!
//! # Failure Policy
//!
//! A mirror that fails a single chunk is dead for the rest of the session. Its
//! chunk goes back to the pending queue and is picked up by the next live
//! mirror that frees up. Capacity therefore only ever shrinks, and once every
//! mirror is dead with work remaining the session has failed.
//!
//! # Thread Safety
//!
//! The strategy is a plain synchronous state machine. It performs no I/O and
//! does no locking; callers running transfers on several threads must
//! serialize all calls into it.
//!
//! [`next_chunk`]: ChunksDownloadStrategy::next_chunk
//! [`chunk_finished`]: ChunksDownloadStrategy::chunk_finished

use tracing::{debug, warn};

use super::chunks::ChunkTable;
use super::error::StrategyError;
use super::range::ByteRange;
use super::servers::{ServerId, ServerPool};

/// A chunk handed to a mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Server slot the chunk is assigned to.
    pub server: ServerId,
    /// URL of that server.
    pub mirror: String,
    /// Bytes to fetch.
    pub range: ByteRange,
}

/// Result of polling the scheduler for work.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum NextChunkOutcome {
    /// A free mirror was paired with a pending chunk.
    Assigned(Assignment),
    /// Nothing can be handed out right now; poll again after a chunk finishes.
    NoFreeServers,
    /// Every mirror has failed while chunks remain. Terminal.
    DownloadFailed,
    /// Every chunk has been downloaded. Terminal.
    DownloadSucceeded,
}

impl NextChunkOutcome {
    /// Whether this outcome ends the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::DownloadFailed | Self::DownloadSucceeded)
    }
}

/// Scheduler assigning byte ranges of one file to a pool of mirrors.
///
/// # Example
///
/// ```
/// use mapfetch::download::{ChunksDownloadStrategy, NextChunkOutcome};
///
/// let mut strategy = ChunksDownloadStrategy::new(vec![
///     "http://mirror-a/region.mwm".to_string(),
/// ])?;
/// strategy.init_chunks(800, 500)?;
///
/// loop {
///     match strategy.next_chunk()? {
///         NextChunkOutcome::Assigned(assignment) => {
///             // Transfer assignment.range from assignment.mirror, then report
///             strategy.chunk_finished(true, assignment.range)?;
///         }
///         NextChunkOutcome::NoFreeServers => unreachable!("transfers finish inline here"),
///         NextChunkOutcome::DownloadFailed => panic!("all mirrors failed"),
///         NextChunkOutcome::DownloadSucceeded => break,
///     }
/// }
/// # Ok::<(), mapfetch::download::StrategyError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ChunksDownloadStrategy {
    servers: ServerPool,
    chunks: Option<ChunkTable>,
}

impl ChunksDownloadStrategy {
    /// Create a scheduler for the given mirrors.
    ///
    /// Duplicate URLs are kept as separate slots.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::NoServers`] if `servers` is empty.
    pub fn new(servers: Vec<String>) -> Result<Self, StrategyError> {
        Ok(Self {
            servers: ServerPool::new(servers)?,
            chunks: None,
        })
    }

    /// Partition the file into chunks. Must be called exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::AlreadyInitialized`] on a second call and
    /// [`StrategyError::ZeroChunkSize`] if `chunk_size` is zero.
    pub fn init_chunks(&mut self, file_size: u64, chunk_size: u64) -> Result<(), StrategyError> {
        if self.chunks.is_some() {
            return Err(StrategyError::AlreadyInitialized);
        }
        let table = ChunkTable::new(file_size, chunk_size)?;
        debug!(
            file_size,
            chunk_size,
            chunks = table.len(),
            mirrors = self.servers.len(),
            "Chunks initialized"
        );
        self.chunks = Some(table);
        Ok(())
    }

    /// Poll for the next assignment.
    ///
    /// Checks, in order: all chunks done, all mirrors dead, a free mirror and
    /// a pending chunk to pair. Terminal outcomes repeat on every later call.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::NotInitialized`] before [`init_chunks`].
    ///
    /// [`init_chunks`]: Self::init_chunks
    pub fn next_chunk(&mut self) -> Result<NextChunkOutcome, StrategyError> {
        let chunks = self.chunks.as_mut().ok_or(StrategyError::NotInitialized)?;

        if !chunks.has_outstanding_work() {
            return Ok(NextChunkOutcome::DownloadSucceeded);
        }
        if self.servers.alive_count() == 0 {
            return Ok(NextChunkOutcome::DownloadFailed);
        }

        // Pending chunk is checked before a server is acquired. Same outcome as
        // acquiring first and releasing when nothing is pending, with no
        // transient Busy state on the released server.
        let Some(chunk) = chunks.next_pending() else {
            return Ok(NextChunkOutcome::NoFreeServers);
        };
        let Some(server) = self.servers.acquire_free() else {
            return Ok(NextChunkOutcome::NoFreeServers);
        };
        chunks.mark_in_progress(chunk, server)?;

        let range = chunks
            .get(chunk)
            .map(|c| c.range)
            .ok_or(StrategyError::NoSuchChunk(chunk))?;
        let mirror = self
            .servers
            .url(server)
            .ok_or(StrategyError::NoSuchServer(server))?
            .to_string();

        debug!(%server, %mirror, %range, "Chunk assigned");
        Ok(NextChunkOutcome::Assigned(Assignment {
            server,
            mirror,
            range,
        }))
    }

    /// Report the outcome of an assigned chunk.
    ///
    /// On success the mirror is freed and the chunk is done. On failure the
    /// mirror is killed for the rest of the session and the chunk goes back
    /// to the pending queue.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::UnknownChunk`] if `range` is not exactly the
    /// range of a chunk currently in progress.
    pub fn chunk_finished(&mut self, success: bool, range: ByteRange) -> Result<(), StrategyError> {
        let chunks = self.chunks.as_mut().ok_or(StrategyError::NotInitialized)?;
        let (chunk, server) = chunks
            .find_in_progress(range)
            .ok_or(StrategyError::UnknownChunk { range })?;

        if success {
            self.servers.release(server)?;
            chunks.mark_done(chunk)?;
            debug!(%server, %range, "Chunk done");
        } else {
            self.servers.kill(server)?;
            chunks.mark_pending(chunk)?;
            warn!(
                %server,
                mirror = self.servers.url(server).unwrap_or_default(),
                %range,
                alive = self.servers.alive_count(),
                "Mirror failed, chunk requeued"
            );
        }
        Ok(())
    }

    /// The chunk table, once initialized.
    pub fn chunks(&self) -> Option<&ChunkTable> {
        self.chunks.as_ref()
    }

    /// The mirror pool.
    pub fn servers(&self) -> &ServerPool {
        &self.servers
    }

    /// Number of mirrors that have not failed.
    pub fn alive_count(&self) -> usize {
        self.servers.alive_count()
    }
}
