//! CLI error type.

use std::process;

use mapfetch::config::ConfigError;
use mapfetch::download::DownloadError;
use mapfetch::logging::LogError;

/// Errors surfaced to the user by the `mapfetch` binary.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error("Logging error: {0}")]
    Logging(#[from] LogError),

    #[error("Download failed: {0}")]
    Download(#[from] DownloadError),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::ConfigFile(_) | CliError::Logging(_) => 2,
            CliError::Download(DownloadError::Cancelled) => 130,
            CliError::Download(_) => 1,
        }
    }

    /// Print the error and exit.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);
        process::exit(self.exit_code())
    }
}
