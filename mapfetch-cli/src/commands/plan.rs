//! Plan command - show the chunk layout of a file.

use std::path::Path;

use clap::Args;
use mapfetch::config::ConfigFile;
use mapfetch::download::{ChunkId, ChunkTable};

use crate::error::CliError;

/// Arguments for the plan command.
#[derive(Debug, Args)]
pub struct PlanArgs {
    /// File size in bytes
    #[arg(long)]
    pub size: u64,

    /// Chunk size in bytes (overrides config)
    #[arg(long)]
    pub chunk_size: Option<u64>,
}

/// Run the plan command.
pub fn run(args: PlanArgs, config_path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(config_path)?;
    let chunk_size = args.chunk_size.unwrap_or(config.download.chunk_size);

    let table = ChunkTable::new(args.size, chunk_size)
        .map_err(|e| CliError::Config(e.to_string()))?;

    println!(
        "{} bytes in {} chunks of {} bytes",
        table.file_size(),
        table.len(),
        chunk_size
    );
    println!();
    for line in plan_lines(&table) {
        println!("{}", line);
    }
    Ok(())
}

fn plan_lines(table: &ChunkTable) -> Vec<String> {
    table
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "  {:>6}  {:<24} Range: {}",
                ChunkId(i).to_string(),
                chunk.range.to_string(),
                chunk.range.http_range_header()
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_lines() {
        let table = ChunkTable::new(800, 250).unwrap();
        let lines = plan_lines(&table);

        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("[0, 250)"));
        assert!(lines[0].ends_with("Range: bytes=0-249"));
        assert!(lines[3].ends_with("Range: bytes=750-799"));
    }

    #[test]
    fn test_zero_chunk_size_is_config_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let result = run(
            PlanArgs {
                size: 100,
                chunk_size: Some(0),
            },
            &temp.path().join("config.ini"),
        );
        assert!(matches!(result, Err(CliError::Config(_))));
    }
}
