//! HSL-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, HslError>;

/// Top-level error type for the layout engine.
#[derive(Debug, Error)]
pub enum HslError {
    #[error("[HSL-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[HSL-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[HSL-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[HSL-2001] layout integrity violation: {details}")]
    Integrity { details: String },

    #[error("[HSL-2002] unknown item {id}")]
    UnknownItem { id: i64 },

    #[error("[HSL-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[HSL-2102] SQL failure in {context}: {details}")]
    Sql {
        context: &'static str,
        details: String,
    },

    #[error("[HSL-2103] unsupported schema version {found} (newest known {supported})")]
    SchemaVersion { found: i64, supported: i64 },

    #[error("[HSL-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[HSL-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[HSL-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl HslError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "HSL-1001",
            Self::MissingConfig { .. } => "HSL-1002",
            Self::ConfigParse { .. } => "HSL-1003",
            Self::Integrity { .. } => "HSL-2001",
            Self::UnknownItem { .. } => "HSL-2002",
            Self::Serialization { .. } => "HSL-2101",
            Self::Sql { .. } => "HSL-2102",
            Self::SchemaVersion { .. } => "HSL-2103",
            Self::Io { .. } => "HSL-3002",
            Self::ChannelClosed { .. } => "HSL-3003",
            Self::Runtime { .. } => "HSL-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::ChannelClosed { .. } | Self::Sql { .. } | Self::Runtime { .. }
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

    /// Convenience constructor for integrity violations.
    #[must_use]
    pub fn integrity(details: impl Into<String>) -> Self {
        Self::Integrity {
            details: details.into(),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for HslError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql {
            context: "rusqlite",
            details: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for HslError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for HslError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
