//! Error types for the editor session.

use thiserror::Error;

/// Errors that can occur while serving the host.
#[derive(Debug, Error)]
pub enum EditorError {
    /// No surface exists for this target.
    #[error("unknown target: {0}")]
    UnknownTarget(String),

    /// Talking to the host failed. [`TransportLost`](patchbay_ipc::TransportError::TransportLost)
    /// ends the session.
    #[error(transparent)]
    Transport(#[from] patchbay_ipc::TransportError),

    /// A compile could not be started.
    #[error(transparent)]
    Pipeline(#[from] patchbay_compiler::PipelineError),

    /// A state payload did not parse as patch text.
    #[error(transparent)]
    State(#[from] patchbay_core::PatchTextError),
}

impl EditorError {
    /// Whether the host is gone.
    pub fn is_transport_lost(&self) -> bool {
        matches!(
            self,
            EditorError::Transport(patchbay_ipc::TransportError::TransportLost)
        )
    }
}
