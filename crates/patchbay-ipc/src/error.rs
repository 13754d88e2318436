//! Error types for the transport.

use thiserror::Error;

/// Errors that can occur on the editor/host transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer is gone. Terminal for the session.
    #[error("transport lost")]
    TransportLost,

    /// A frame or payload did not follow the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A frame body could not be encoded or decoded.
    #[error("frame codec: {0}")]
    Codec(#[from] postcard::Error),

    /// Reading or writing the stream failed.
    #[error("transport I/O: {0}")]
    Io(#[from] std::io::Error),

    /// A state payload was not valid base64 patch text.
    #[error("bad state payload: {0}")]
    State(#[from] patchbay_core::PatchTextError),
}

impl TransportError {
    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        TransportError::Protocol(msg.into())
    }
}
