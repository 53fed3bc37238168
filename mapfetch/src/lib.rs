//! mapfetch - Chunked downloads of map files from multiple mirrors
//!
//! This library splits a file into byte-range chunks and fetches them in
//! parallel from a set of interchangeable mirrors. A mirror that fails a
//! chunk is dropped for the rest of the session and its chunk is handed to
//! another mirror; the download fails only once every mirror has failed.
//!
//! - [`download`] holds the chunk scheduler and the download engine.
//! - [`config`] reads and writes the INI configuration file.
//! - [`logging`] installs the `tracing` subscriber.

pub mod config;
pub mod download;
pub mod logging;
