//! Host-side saved patch state.
//!
//! Each target the host owns has one saved state: the base64 patch text the
//! editor last sent with `SaveState`. The session stores them in target
//! order so a restarted host can restore them.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// One target's saved state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedTarget {
    /// Target identifier.
    pub id: String,
    /// Base64 patch text.
    pub state: String,
}

/// Saved states for every target the host owns.
///
/// # TOML Format
///
/// ```toml
/// [[targets]]
/// id = "0"
/// state = "I04gY2FudmFzIDYzIDg4IDQ1MCAzMDAgMTI7Cg=="
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Saved targets in creation order.
    #[serde(default)]
    pub targets: Vec<SavedTarget>,
}

impl Session {
    /// Create an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a session from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Ok(toml::from_str(&content)?)
    }

    /// Load a session, or an empty one if the file does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the session to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::create_dir(parent, e))?;
            }
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        tracing::debug!("session: saved {} targets to {}", self.len(), path.display());
        Ok(())
    }

    /// Saved state for a target.
    pub fn get(&self, id: &str) -> Option<&str> {
        self.targets
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.state.as_str())
    }

    /// Insert or replace a target's state, keeping first-seen order.
    pub fn set(&mut self, id: impl Into<String>, state: impl Into<String>) {
        let id = id.into();
        let state = state.into();
        match self.targets.iter_mut().find(|t| t.id == id) {
            Some(target) => target.state = state,
            None => self.targets.push(SavedTarget { id, state }),
        }
    }

    /// Forget a target. Returns true if it was present.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.targets.len();
        self.targets.retain(|t| t.id != id);
        self.targets.len() != before
    }

    /// Number of saved targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns true if nothing is saved.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Iterates saved targets in order.
    pub fn iter(&self) -> impl Iterator<Item = &SavedTarget> {
        self.targets.iter()
    }
}
