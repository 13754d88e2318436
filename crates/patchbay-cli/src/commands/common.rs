//! Helpers shared by commands.

use std::path::Path;

use anyhow::Context;
use patchbay_config::{Settings, settings_path};

/// Settings from `--config`, or the user settings file, or defaults.
///
/// An explicit path must exist; the default location may be absent.
pub fn load_settings(config: Option<&Path>) -> anyhow::Result<Settings> {
    match config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("loading settings from {}", path.display())),
        None => {
            let path = settings_path();
            Settings::load_or_default(&path)
                .with_context(|| format!("loading settings from {}", path.display()))
        }
    }
}

/// Reads a patch file.
pub fn read_patch(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}
