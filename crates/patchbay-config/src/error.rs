//! Errors from loading and saving settings and sessions.

use std::path::PathBuf;
use thiserror::Error;

/// Why a settings or session file could not be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading, writing or creating something on disk failed.
    #[error("could not {action} '{path}': {source}")]
    Io {
        /// `read`, `write` or `create directory`.
        action: &'static str,
        /// What we were touching.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML, or a value has the wrong type.
    #[error("malformed TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Settings or session could not be rendered as TOML.
    #[error("could not render TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A setting holds a value the processes cannot run with
    #[error("invalid setting '{key}': {reason}")]
    InvalidSetting {
        /// Dotted key, e.g. `host.sample_rate`.
        key: String,
        /// Why the value is rejected.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::io("read", path, source)
    }

    pub(crate) fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::io("write", path, source)
    }

    pub(crate) fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::io("create directory", path, source)
    }

    /// A rejected setting.
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidSetting {
            key: key.into(),
            reason: reason.into(),
        }
    }

    fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Whether the file simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
