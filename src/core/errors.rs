//! FSM-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, FsmonError>;

/// Top-level error type for the filesystem monitor.
#[derive(Debug, Error)]
pub enum FsmonError {
    #[error("[FSM-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[FSM-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[FSM-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[FSM-1101] unsupported platform: {details}")]
    UnsupportedPlatform { details: String },

    #[error("[FSM-2001] mount table unavailable ({source_name}): {details}")]
    MountTableUnavailable {
        source_name: String,
        details: String,
    },

    #[error("[FSM-2002] {query} not found in mount table")]
    NotFound { query: String },

    #[error("[FSM-2003] device resolution failed for {path}: {details}")]
    DeviceResolution { path: String, details: String },

    #[error("[FSM-2004] usage statistics unavailable for {mountpoint}: {details}")]
    StatUnavailable { mountpoint: PathBuf, details: String },

    #[error("[FSM-2005] cannot parse activity statistics from {source_name}: {details}")]
    ActivityParse {
        source_name: String,
        details: String,
    },

    #[error("[FSM-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[FSM-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[FSM-3004] command {program} failed: {details}")]
    Command { program: String, details: String },
}

impl FsmonError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "FSM-1001",
            Self::MissingConfig { .. } => "FSM-1002",
            Self::ConfigParse { .. } => "FSM-1003",
            Self::UnsupportedPlatform { .. } => "FSM-1101",
            Self::MountTableUnavailable { .. } => "FSM-2001",
            Self::NotFound { .. } => "FSM-2002",
            Self::DeviceResolution { .. } => "FSM-2003",
            Self::StatUnavailable { .. } => "FSM-2004",
            Self::ActivityParse { .. } => "FSM-2005",
            Self::Serialization { .. } => "FSM-2101",
            Self::Io { .. } => "FSM-3002",
            Self::Command { .. } => "FSM-3004",
        }
    }

    /// Whether the next polling cycle might succeed without intervention.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::MountTableUnavailable { .. }
                | Self::NotFound { .. }
                | Self::DeviceResolution { .. }
                | Self::StatUnavailable { .. }
                | Self::ActivityParse { .. }
                | Self::Io { .. }
                | Self::Command { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for activity-source format mismatches.
    #[must_use]
    pub fn parse(source_name: impl Into<String>, details: impl Into<String>) -> Self {
        Self::ActivityParse {
            source_name: source_name.into(),
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for FsmonError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for FsmonError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
