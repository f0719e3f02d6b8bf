//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{FsmonError, Result};
use crate::monitor::resolver::MatchBy;

/// Full fsmon configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub monitor: MonitorConfig,
    pub logging: LoggingConfig,
    pub filesystems: Vec<FilesystemTarget>,
    pub paths: PathsConfig,
}

/// Polling cadence and statistics-source tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Delay between polling cycles in watch mode.
    pub poll_interval_ms: u64,
    /// Maximum age of a shared kernel I/O table snapshot before it is re-read.
    pub stats_refresh_ms: u64,
    /// Bytes per sector for sources that report sector counts.
    pub sector_size: u64,
}

/// Log verbosity for the bundled binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

/// One configured filesystem object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilesystemTarget {
    pub path: String,
    #[serde(default)]
    pub match_by: MatchBy,
}

/// Filesystem paths used by fsmon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 30_000,
            stats_refresh_ms: 1_000,
            sector_size: 512,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self::under_home(env::var_os("HOME"))
    }
}

impl PathsConfig {
    fn under_home(home: Option<OsString>) -> Self {
        let home_dir = home.map_or_else(
            || {
                tracing::warn!(
                    "[FSM-CONFIG] HOME not set, falling back to /tmp for config path"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        Self {
            config_file: home_dir.join(".config").join("fsmon").join("config.toml"),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| FsmonError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(FsmonError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize_paths();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("FSMON_POLL_INTERVAL_MS") {
            self.monitor.poll_interval_ms = parse_env_u64("FSMON_POLL_INTERVAL_MS", &raw)?;
        }
        if let Some(raw) = lookup("FSMON_STATS_REFRESH_MS") {
            self.monitor.stats_refresh_ms = parse_env_u64("FSMON_STATS_REFRESH_MS", &raw)?;
        }
        if let Some(raw) = lookup("FSMON_SECTOR_SIZE") {
            self.monitor.sector_size = parse_env_u64("FSMON_SECTOR_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("FSMON_LOG_LEVEL") {
            self.logging.level = raw.trim().to_ascii_lowercase();
        }

        // Comma-separated mountpoints replace the configured list entirely.
        if let Some(raw) = lookup("FSMON_FILESYSTEMS") {
            self.filesystems = raw
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(|entry| FilesystemTarget {
                    path: entry.to_string(),
                    match_by: MatchBy::Mountpoint,
                })
                .collect();
        }

        Ok(())
    }

    /// Strip trailing slashes from mountpoint targets so they compare equal to
    /// mount-table entries.
    fn normalize_paths(&mut self) {
        for target in &mut self.filesystems {
            if target.match_by == MatchBy::Mountpoint
                && target.path.len() > 1
                && let Some(stripped) = target.path.strip_suffix('/')
            {
                target.path = stripped.to_string();
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.monitor.poll_interval_ms == 0 {
            return Err(FsmonError::InvalidConfig {
                details: "monitor.poll_interval_ms must be > 0".to_string(),
            });
        }
        if self.monitor.stats_refresh_ms == 0 {
            return Err(FsmonError::InvalidConfig {
                details: "monitor.stats_refresh_ms must be > 0".to_string(),
            });
        }
        if self.monitor.sector_size < 512 || !self.monitor.sector_size.is_power_of_two() {
            return Err(FsmonError::InvalidConfig {
                details: format!(
                    "monitor.sector_size must be a power of two >= 512, got {}",
                    self.monitor.sector_size
                ),
            });
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(FsmonError::InvalidConfig {
                details: format!(
                    "logging.level must be one of {LOG_LEVELS:?}, got {:?}",
                    self.logging.level
                ),
            });
        }
        for target in &self.filesystems {
            if target.path.trim().is_empty() {
                return Err(FsmonError::InvalidConfig {
                    details: "filesystems[].path must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|error| FsmonError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}
