//! Init command - write the configuration file.

use std::path::Path;

use mapfetch::config::ConfigFile;

use crate::error::CliError;

/// Run the init command.
///
/// Existing settings are kept; missing keys are filled in with defaults. A
/// file that fails to load is left untouched and the error returned.
pub fn run(config_path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(config_path)?;
    config.save_to(config_path)?;

    println!("Configuration file: {}", config_path.display());
    println!();
    println!("Add mirror URLs under [mirrors] to use them by default.");
    println!("CLI arguments override config file values when specified.");
    Ok(())
}
