//! Message and selector types.

use std::fmt;
use std::path::PathBuf;

use patchbay_core::{decode_state, encode_state};
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Which way a selector travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Sent by the host, handled by the editor.
    ToEditor,
    /// Sent by the editor, handled by the host.
    ToHost,
}

/// What a message asks the receiver to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selector {
    /// Show (creating on demand) the editor surface for the target.
    Open,
    /// Hide the editor surface.
    Close,
    /// Replace the editor's graph with the payload; no recompile.
    LoadState,
    /// Host stores the payload as the target's saved state.
    SaveState,
    /// Host hot-swaps the module at the payload path.
    Load,
    /// Host logs the payload as a diagnostic.
    Error,
}

impl Selector {
    /// Every selector.
    pub const ALL: [Selector; 6] = [
        Selector::Open,
        Selector::Close,
        Selector::LoadState,
        Selector::SaveState,
        Selector::Load,
        Selector::Error,
    ];

    /// Display name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Selector::Open => "Open",
            Selector::Close => "Close",
            Selector::LoadState => "LoadState",
            Selector::SaveState => "SaveState",
            Selector::Load => "Load",
            Selector::Error => "Error",
        }
    }

    /// Direction this selector travels in.
    pub const fn flow(self) -> Flow {
        match self {
            Selector::Open | Selector::Close | Selector::LoadState => Flow::ToEditor,
            Selector::SaveState | Selector::Load | Selector::Error => Flow::ToHost,
        }
    }

    /// Whether this selector carries a payload.
    pub const fn has_payload(self) -> bool {
        !matches!(self, Selector::Open | Selector::Close)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transport message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Target the message concerns.
    pub target: String,
    /// What to do.
    pub selector: Selector,
    /// Selector-specific payload.
    pub payload: Option<String>,
}

impl Message {
    /// Builds a message, checking the payload is present exactly when the
    /// selector takes one.
    pub fn new(
        target: impl Into<String>,
        selector: Selector,
        payload: Option<String>,
    ) -> Result<Self, TransportError> {
        if selector.has_payload() != payload.is_some() {
            return Err(TransportError::protocol(format!(
                "{selector} {} a payload",
                if selector.has_payload() { "requires" } else { "takes no" }
            )));
        }
        Ok(Self {
            target: target.into(),
            selector,
            payload,
        })
    }

    /// `Open` for a target.
    pub fn open(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            selector: Selector::Open,
            payload: None,
        }
    }

    /// `Close` for a target.
    pub fn close(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            selector: Selector::Close,
            payload: None,
        }
    }

    /// `LoadState` carrying already base64-encoded state.
    pub fn load_state(target: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            selector: Selector::LoadState,
            payload: Some(state.into()),
        }
    }

    /// `SaveState` encoding the given patch text.
    pub fn save_state(target: impl Into<String>, patch_text: &str) -> Self {
        Self {
            target: target.into(),
            selector: Selector::SaveState,
            payload: Some(encode_state(patch_text)),
        }
    }

    /// `Load` naming a built module.
    pub fn load(target: impl Into<String>, module_path: &std::path::Path) -> Self {
        Self {
            target: target.into(),
            selector: Selector::Load,
            payload: Some(module_path.to_string_lossy().into_owned()),
        }
    }

    /// `Error` with a diagnostic.
    pub fn error(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            selector: Selector::Error,
            payload: Some(text.into()),
        }
    }

    /// Payload text, or a protocol error if absent.
    pub fn payload(&self) -> Result<&str, TransportError> {
        self.payload
            .as_deref()
            .ok_or_else(|| TransportError::protocol(format!("{} without payload", self.selector)))
    }

    /// Decoded patch text of a `LoadState` or `SaveState`.
    pub fn patch_text(&self) -> Result<String, TransportError> {
        match self.selector {
            Selector::LoadState | Selector::SaveState => Ok(decode_state(self.payload()?)?),
            other => Err(TransportError::protocol(format!("{other} carries no state"))),
        }
    }

    /// Module path of a `Load`.
    pub fn module_path(&self) -> Result<PathBuf, TransportError> {
        match self.selector {
            Selector::Load => Ok(PathBuf::from(self.payload()?)),
            other => Err(TransportError::protocol(format!("{other} carries no module path"))),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> '{}'", self.selector, self.target)?;
        if let Some(payload) = &self.payload {
            write!(f, " ({} bytes)", payload.len())?;
        }
        Ok(())
    }
}
