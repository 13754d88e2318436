//! Error types for the host.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading modules or managing targets.
#[derive(Debug, Error)]
pub enum HostError {
    /// The library could not be opened or lacks a required symbol.
    ///
    /// The previously published module, if any, stays active.
    #[error("failed to load module {}: {reason}", path.display())]
    ModuleLoadFailed {
        /// Library path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The module's constructor returned no instance or reported nonsense.
    #[error("module {} failed to construct: {reason}", path.display())]
    Construction {
        /// Library path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// No target with this id exists.
    #[error("unknown target: {0}")]
    UnknownTarget(String),

    /// The compile behind a swap failed.
    #[error(transparent)]
    Compile(#[from] patchbay_compiler::PipelineError),

    /// A port index past the node's port count.
    #[error("port {index} out of range ({count} ports)")]
    PortOutOfRange {
        /// Requested index.
        index: usize,
        /// Ports on that side.
        count: usize,
    },

    /// Sending to the editor failed.
    #[error(transparent)]
    Transport(#[from] patchbay_ipc::TransportError),

    /// A saved state was not valid base64 patch text.
    #[error("bad saved state: {0}")]
    BadState(#[from] patchbay_core::PatchTextError),

    /// Reading or writing the session file failed.
    #[error(transparent)]
    Config(#[from] patchbay_config::ConfigError),
}

impl HostError {
    pub(crate) fn load_failed(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        HostError::ModuleLoadFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn construction(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        HostError::Construction {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
