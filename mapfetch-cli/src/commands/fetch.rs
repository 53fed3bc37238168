//! Fetch command - download a file from several mirrors.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use mapfetch::config::ConfigFile;
use mapfetch::download::{DownloadConfig, DownloadProgress, MirrorDownloader};
use mapfetch::logging::init_logging;
use tracing::info;

use crate::error::CliError;

/// Arguments for the fetch command.
#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Mirror URL serving the file (repeat for several mirrors; overrides config)
    #[arg(short, long = "mirror", value_name = "URL")]
    pub mirrors: Vec<String>,

    /// File size in bytes
    #[arg(long)]
    pub size: u64,

    /// Destination path
    #[arg(short, long)]
    pub output: PathBuf,

    /// Chunk size in bytes (overrides config)
    #[arg(long)]
    pub chunk_size: Option<u64>,

    /// Per-request timeout in seconds (overrides config)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Expected SHA-256 of the complete file
    #[arg(long)]
    pub sha256: Option<String>,
}

/// Run the fetch command.
pub fn run(args: FetchArgs, config_path: &Path, verbose: bool) -> Result<(), CliError> {
    let config = ConfigFile::load_from(config_path)?;

    let mut log_config = config.to_logging_config();
    if verbose {
        log_config = log_config.verbose();
    }
    let _log_guard = init_logging(&log_config)?;

    let download_config = resolve_download_config(&args, &config)?;
    let mirrors = download_config.mirrors.len();
    let downloader = MirrorDownloader::new(download_config)?;

    let cancel = downloader.cancellation_flag();
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Received interrupt, stopping download...");
        cancel.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    println!("Downloading {}", args.output.display());
    println!("  Size:    {} bytes", args.size);
    println!("  Mirrors: {}", mirrors);
    println!();

    let bar = progress_bar(args.size);
    let bar_cb = bar.clone();
    let result = downloader.download(
        &args.output,
        args.size,
        args.sha256.as_deref(),
        Some(Box::new(move |p: DownloadProgress| {
            bar_cb.set_position(p.bytes_downloaded);
            bar_cb.set_message(format!("{}/{} mirrors", p.alive_mirrors, mirrors));
        })),
    );
    bar.finish_and_clear();

    let summary = result?;
    info!(path = %summary.path.display(), "Download finished");

    println!("Saved {}", summary.path.display());
    println!(
        "  {} chunks in {:.1}s, {} mirror(s) failed",
        summary.chunks,
        summary.elapsed.as_secs_f64(),
        summary.failed_mirrors
    );
    Ok(())
}

/// Merge CLI arguments over the config file.
fn resolve_download_config(
    args: &FetchArgs,
    config: &ConfigFile,
) -> Result<DownloadConfig, CliError> {
    let mut download = config.to_download_config();

    if !args.mirrors.is_empty() {
        download.mirrors = args.mirrors.clone();
    }
    if let Some(chunk_size) = args.chunk_size {
        download.chunk_size = chunk_size;
    }
    if let Some(timeout) = args.timeout {
        download.timeout = Duration::from_secs(timeout);
    }

    if download.mirrors.is_empty() {
        return Err(CliError::Config(
            "No mirrors given. Use --mirror or set urls under [mirrors] in config.ini".to_string(),
        ));
    }
    if download.chunk_size == 0 {
        return Err(CliError::Config(
            "Chunk size must be greater than zero".to_string(),
        ));
    }
    Ok(download)
}

fn progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner} [{elapsed_precise}] [{bar:40}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-"),
    );
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(mirrors: &[&str]) -> FetchArgs {
        FetchArgs {
            mirrors: mirrors.iter().map(|m| m.to_string()).collect(),
            size: 800,
            output: PathBuf::from("/tmp/region.mwm"),
            chunk_size: None,
            timeout: None,
            sha256: None,
        }
    }

    #[test]
    fn test_cli_mirrors_override_config() {
        let mut config = ConfigFile::default();
        config.mirrors.urls = vec!["http://config".to_string()];

        let download = resolve_download_config(&args(&["http://cli"]), &config).unwrap();
        assert_eq!(download.mirrors, vec!["http://cli"]);

        let download = resolve_download_config(&args(&[]), &config).unwrap();
        assert_eq!(download.mirrors, vec!["http://config"]);
    }

    #[test]
    fn test_cli_settings_override_config() {
        let mut a = args(&["http://cli"]);
        a.chunk_size = Some(1024);
        a.timeout = Some(3);

        let download = resolve_download_config(&a, &ConfigFile::default()).unwrap();
        assert_eq!(download.chunk_size, 1024);
        assert_eq!(download.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_no_mirrors_is_config_error() {
        let result = resolve_download_config(&args(&[]), &ConfigFile::default());
        assert!(matches!(result, Err(CliError::Config(_))));
    }
}
