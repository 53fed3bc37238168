//! Chunked file downloads from multiple mirrors.
//!
//! This module splits a file of known size into fixed-size chunks and hands
//! them out to a pool of interchangeable mirrors, including:
//! - Byte ranges and the chunk table (`range`, `chunks`)
//! - Mirror slots and their lifecycle (`servers`)
//! - The chunk scheduler (`strategy`)
//! - Range requests over HTTP (`transport`)
//! - Out-of-order assembly into `<dest>.downloading` (`writer`)
//! - SHA-256 checksum verification (`checksum`)
//! - Session orchestration on worker threads (`orchestrator`)
//!
//! # Architecture
//!
//! ```text
//! MirrorDownloader (orchestrator)
//!         │
//!         ├── ChunksDownloadStrategy (scheduler, single owner)
//!         │       ├── ChunkTable (Pending → InProgress → Done)
//!         │       └── ServerPool (Free ⇄ Busy → Dead)
//!         │
//!         ├── ChunkTransport (trait)
//!         │       └── HttpTransport
//!         │
//!         ├── ChunkWriter (temporary file, commit on success)
//!         │
//!         └── ProgressCallback (per finished chunk)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use mapfetch::download::{DownloadConfig, MirrorDownloader};
//!
//! let config = DownloadConfig::new(vec![
//!     "http://mirror1.example.com/Germany.mwm".to_string(),
//!     "http://mirror2.example.com/Germany.mwm".to_string(),
//! ]);
//! let downloader = MirrorDownloader::new(config)?;
//!
//! let summary = downloader.download(
//!     Path::new("/maps/Germany.mwm"),
//!     47_684_000,
//!     None,
//!     Some(Box::new(|p| println!("{:.1}%", p.percent()))),
//! )?;
//! ```

mod checksum;
mod chunks;
mod config;
mod error;
mod orchestrator;
mod progress;
mod range;
mod servers;
mod strategy;
mod transport;
mod writer;

pub use checksum::{calculate_file_checksum, verify_checksum};
pub use chunks::{Chunk, ChunkId, ChunkState, ChunkTable};
pub use config::{DownloadConfig, DEFAULT_CHUNK_SIZE};
pub use error::{DownloadError, DownloadResult, StrategyError};
pub use orchestrator::{CancellationFlag, DownloadSummary, MirrorDownloader};
pub use progress::{DownloadProgress, ProgressCallback};
pub use range::ByteRange;
pub use servers::{ServerId, ServerPool, ServerState};
pub use strategy::{Assignment, ChunksDownloadStrategy, NextChunkOutcome};
pub use transport::{ChunkTransport, HttpTransport, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
pub use writer::{downloading_path, ChunkWriter, DOWNLOADING_EXTENSION};
