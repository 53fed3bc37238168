//! mapfetch CLI - Command-line interface
//!
//! Downloads a file in parallel byte-range chunks from several mirrors.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{fetch::FetchArgs, plan::PlanArgs};
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "mapfetch", version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download a file from one or more mirrors
    Fetch(FetchArgs),

    /// Show how a file would be split into chunks
    Plan(PlanArgs),

    /// Write a default configuration file
    Init,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli
        .config
        .unwrap_or_else(mapfetch::config::config_file_path);

    match cli.command {
        Commands::Fetch(args) => commands::fetch::run(args, &config_path, cli.verbose),
        Commands::Plan(args) => commands::plan::run(args, &config_path),
        Commands::Init => commands::init::run(&config_path),
    }
}
