//! Configuration file handling.
//!
//! Settings live in an INI file at `~/.config/mapfetch/config.ini` (or the
//! platform equivalent). A missing file yields the defaults; command line
//! arguments override file values when specified.
//!
//! ```ini
//! [download]
//! chunk_size = 524288
//! timeout_secs = 30
//! user_agent = mapfetch/0.1.0
//!
//! [mirrors]
//! urls = http://a.example.com/maps, http://b.example.com/maps
//!
//! [logging]
//! level = info
//! file = /var/log/mapfetch.log
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::download::{DownloadConfig, DEFAULT_CHUNK_SIZE, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::logging::LoggingConfig;

const SECTION_DOWNLOAD: &str = "download";
const SECTION_MIRRORS: &str = "mirrors";
const SECTION_LOGGING: &str = "logging";

/// Errors reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read or parsed.
    #[error("failed to read config file {}: {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    /// The file could not be written.
    #[error("failed to write config file {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value could not be interpreted.
    #[error("invalid value '{value}' for {section}.{key}: {reason}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// `[download]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    pub chunk_size: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// `[mirrors]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorSettings {
    /// Base mirror URLs, in preference order.
    pub urls: Vec<String>,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Optional log file written in addition to the console.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub download: DownloadSettings,
    pub mirrors: MirrorSettings,
    pub logging: LoggingSettings,
}

/// Default location of the configuration file.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mapfetch")
        .join("config.ini")
}

impl ConfigFile {
    /// Load from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`, returning defaults if the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_ini(&ini)
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_failed = |e| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }
        self.to_ini().write_to_file(path).map_err(write_failed)
    }

    /// Engine settings for the configured mirrors.
    pub fn to_download_config(&self) -> DownloadConfig {
        DownloadConfig::new(self.mirrors.urls.clone())
            .with_chunk_size(self.download.chunk_size)
            .with_timeout(Duration::from_secs(self.download.timeout_secs))
            .with_user_agent(self.download.user_agent.clone())
    }

    /// Logging settings.
    pub fn to_logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.logging.level.clone(),
            file: self.logging.file.clone(),
            ..Default::default()
        }
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some(SECTION_DOWNLOAD)) {
            if let Some(v) = section.get("chunk_size") {
                config.download.chunk_size = parse_value(SECTION_DOWNLOAD, "chunk_size", v)?;
                if config.download.chunk_size == 0 {
                    return Err(ConfigError::InvalidValue {
                        section: SECTION_DOWNLOAD,
                        key: "chunk_size",
                        value: v.to_string(),
                        reason: "must be greater than zero".to_string(),
                    });
                }
            }
            if let Some(v) = section.get("timeout_secs") {
                config.download.timeout_secs = parse_value(SECTION_DOWNLOAD, "timeout_secs", v)?;
            }
            if let Some(v) = section.get("user_agent").map(str::trim) {
                if !v.is_empty() {
                    config.download.user_agent = v.to_string();
                }
            }
        }

        if let Some(section) = ini.section(Some(SECTION_MIRRORS)) {
            if let Some(v) = section.get("urls") {
                config.mirrors.urls = v
                    .split(',')
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(String::from)
                    .collect();
            }
        }

        if let Some(section) = ini.section(Some(SECTION_LOGGING)) {
            if let Some(v) = section.get("level").map(str::trim) {
                if !v.is_empty() {
                    config.logging.level = v.to_string();
                }
            }
            config.logging.file = section
                .get("file")
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from);
        }

        Ok(config)
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        ini.with_section(Some(SECTION_DOWNLOAD))
            .set("chunk_size", self.download.chunk_size.to_string())
            .set("timeout_secs", self.download.timeout_secs.to_string())
            .set("user_agent", self.download.user_agent.as_str());
        ini.with_section(Some(SECTION_MIRRORS))
            .set("urls", self.mirrors.urls.join(", "));
        ini.with_section(Some(SECTION_LOGGING))
            .set("level", self.logging.level.as_str())
            .set(
                "file",
                self.logging
                    .file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            );
        ini
    }
}

fn parse_value<T>(section: &'static str, key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            section,
            key,
            value: value.to_string(),
            reason: e.to_string(),
        })
}
