//! Mirror download orchestrator.
//!
//! [`MirrorDownloader`] drives a [`ChunksDownloadStrategy`] to completion. The
//! calling thread acts as coordinator: it is the only one touching the
//! strategy and the output file, while each assigned chunk is fetched on its
//! own worker thread and reported back over a channel.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::checksum::verify_checksum;
use super::config::DownloadConfig;
use super::error::{DownloadError, DownloadResult};
use super::progress::{DownloadProgress, ProgressCallback};
use super::range::ByteRange;
use super::strategy::{Assignment, ChunksDownloadStrategy, NextChunkOutcome};
use super::transport::{ChunkTransport, HttpTransport};
use super::writer::ChunkWriter;

/// How often the coordinator wakes up to check for cancellation while
/// waiting on in-flight chunks.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shared flag used to cancel a running download.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Create a flag that is not set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a successful download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Where the file was written.
    pub path: PathBuf,
    /// Size of the file in bytes.
    pub bytes: u64,
    /// Number of chunks the file was split into.
    pub chunks: usize,
    /// Number of mirrors that failed along the way.
    pub failed_mirrors: usize,
    /// Wall-clock duration of the session.
    pub elapsed: Duration,
}

/// Result of one chunk transfer, sent from a worker to the coordinator.
struct ChunkReport {
    mirror: String,
    range: ByteRange,
    result: DownloadResult<Vec<u8>>,
}

/// Downloads one file from a set of interchangeable mirrors.
pub struct MirrorDownloader {
    config: DownloadConfig,
    transport: Arc<dyn ChunkTransport>,
    cancel: CancellationFlag,
}

impl std::fmt::Debug for MirrorDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorDownloader")
            .field("config", &self.config)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

impl MirrorDownloader {
    /// Create a downloader fetching chunks over HTTP.
    pub fn new(config: DownloadConfig) -> DownloadResult<Self> {
        let transport = HttpTransport::with_settings(config.timeout, &config.user_agent)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a downloader with a custom transport.
    pub fn with_transport(config: DownloadConfig, transport: Arc<dyn ChunkTransport>) -> Self {
        Self {
            config,
            transport,
            cancel: CancellationFlag::new(),
        }
    }

    /// The session configuration.
    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Flag that cancels this downloader's sessions when set.
    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Download `file_size` bytes from the configured mirrors into `dest`.
    ///
    /// Chunks are written into `<dest>.downloading`, which is renamed to
    /// `dest` once every chunk arrived. If `expected_sha256` is given the
    /// result is verified and removed on mismatch.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::AllMirrorsFailed`] if every mirror failed a chunk
    /// - [`DownloadError::Cancelled`] if the cancellation flag was set
    /// - I/O, checksum and scheduler errors as they occur
    pub fn download(
        &self,
        dest: &Path,
        file_size: u64,
        expected_sha256: Option<&str>,
        on_progress: Option<ProgressCallback>,
    ) -> DownloadResult<DownloadSummary> {
        let started = Instant::now();

        let mut strategy = ChunksDownloadStrategy::new(self.config.mirrors.clone())?;
        strategy.init_chunks(file_size, self.config.chunk_size)?;
        let total_chunks = strategy.chunks().map(|c| c.len()).unwrap_or(0);

        info!(
            dest = %dest.display(),
            file_size,
            chunk_size = self.config.chunk_size,
            chunks = total_chunks,
            mirrors = self.config.mirrors.len(),
            "Starting mirror download"
        );

        let mut writer = ChunkWriter::create(dest, file_size)?;
        if let Err(e) = self.run_session(&mut strategy, &mut writer, file_size, on_progress.as_ref()) {
            writer.abort();
            warn!(dest = %dest.display(), error = %e, "Mirror download failed");
            return Err(e);
        }

        let path = writer.commit()?;
        if let Some(expected) = expected_sha256 {
            if let Err(e) = verify_checksum(&path, expected) {
                std::fs::remove_file(&path).ok();
                return Err(e);
            }
        }

        let summary = DownloadSummary {
            path,
            bytes: file_size,
            chunks: total_chunks,
            failed_mirrors: self.config.mirrors.len() - strategy.alive_count(),
            elapsed: started.elapsed(),
        };
        info!(
            dest = %summary.path.display(),
            bytes = summary.bytes,
            failed_mirrors = summary.failed_mirrors,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Mirror download complete"
        );
        Ok(summary)
    }

    /// Coordinator loop: hand out chunks, collect reports, until terminal.
    fn run_session(
        &self,
        strategy: &mut ChunksDownloadStrategy,
        writer: &mut ChunkWriter,
        file_size: u64,
        on_progress: Option<&ProgressCallback>,
    ) -> DownloadResult<()> {
        let (tx, rx) = mpsc::channel::<ChunkReport>();
        let mut in_flight = 0usize;

        loop {
            if self.cancel.is_cancelled() {
                info!(in_flight, "Download cancelled, waiting for in-flight chunks");
                wait_for_workers(&rx, in_flight);
                return Err(DownloadError::Cancelled);
            }

            match strategy.next_chunk()? {
                NextChunkOutcome::Assigned(assignment) => {
                    self.spawn_worker(assignment, file_size, tx.clone());
                    in_flight += 1;
                    continue;
                }
                NextChunkOutcome::DownloadSucceeded => return Ok(()),
                NextChunkOutcome::DownloadFailed => {
                    return Err(DownloadError::AllMirrorsFailed {
                        mirrors: self.config.mirrors.len(),
                        remaining_chunks: strategy
                            .chunks()
                            .map(|c| c.outstanding_count())
                            .unwrap_or(0),
                    });
                }
                NextChunkOutcome::NoFreeServers => {}
            }

            // Workers never drop their sender without reporting, and this loop
            // holds `tx`, so a timeout is the only error here.
            let Ok(report) = rx.recv_timeout(CANCEL_POLL_INTERVAL) else {
                continue;
            };
            in_flight -= 1;
            self.handle_report(strategy, writer, report)?;

            if let Some(cb) = on_progress {
                cb(progress_of(strategy));
            }
        }
    }

    fn spawn_worker(&self, assignment: Assignment, file_size: u64, tx: Sender<ChunkReport>) {
        let transport = Arc::clone(&self.transport);
        thread::spawn(move || {
            let Assignment { mirror, range, .. } = assignment;
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                transport.fetch(&mirror, range, file_size)
            }))
            .unwrap_or_else(|_| {
                Err(DownloadError::Http {
                    url: mirror.clone(),
                    reason: "transport panicked".to_string(),
                })
            });
            // The coordinator may already have given up on the session.
            tx.send(ChunkReport {
                mirror,
                range,
                result,
            })
            .ok();
        });
    }

    fn handle_report(
        &self,
        strategy: &mut ChunksDownloadStrategy,
        writer: &mut ChunkWriter,
        report: ChunkReport,
    ) -> DownloadResult<()> {
        let ChunkReport {
            mirror,
            range,
            result,
        } = report;

        // A transport may hand back fewer or more bytes than asked for.
        let result = result.and_then(|data| {
            if data.len() as u64 == range.len() {
                Ok(data)
            } else {
                Err(DownloadError::SizeMismatch {
                    url: mirror.clone(),
                    range,
                    expected: range.len(),
                    actual: data.len() as u64,
                })
            }
        });

        match result {
            Ok(data) => {
                writer.write_at(range.begin, &data)?;
                strategy.chunk_finished(true, range)?;
                debug!(%mirror, %range, "Chunk written");
            }
            Err(e) => {
                warn!(%mirror, %range, error = %e, "Chunk download failed");
                strategy.chunk_finished(false, range)?;
            }
        }
        Ok(())
    }
}

fn wait_for_workers(rx: &Receiver<ChunkReport>, mut in_flight: usize) {
    while in_flight > 0 && rx.recv().is_ok() {
        in_flight -= 1;
    }
}

fn progress_of(strategy: &ChunksDownloadStrategy) -> DownloadProgress {
    let (bytes_downloaded, total_bytes, chunks_completed, total_chunks) = strategy
        .chunks()
        .map(|c| (c.done_bytes(), c.file_size(), c.done_count(), c.len()))
        .unwrap_or_default();
    DownloadProgress {
        bytes_downloaded,
        total_bytes,
        chunks_completed,
        total_chunks,
        alive_mirrors: strategy.alive_count(),
    }
}
