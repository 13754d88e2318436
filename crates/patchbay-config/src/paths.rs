//! Platform-specific paths for configuration and build products.
//!
//! # Directory Structure
//!
//! - **User config**: `~/.config/patchbay/` (Linux), `~/Library/Application Support/patchbay/` (macOS), `%APPDATA%\patchbay\` (Windows)
//! - **Settings file**: `<user config>/settings.toml`
//! - **Host session**: `<user config>/session.toml`
//! - **Build scratch**: `<temp dir>/patchbay/`

use std::path::PathBuf;

/// Application name used for directory paths.
const APP_NAME: &str = "patchbay";

/// Settings file name inside the config directory.
const SETTINGS_FILE: &str = "settings.toml";

/// Session file name inside the config directory.
const SESSION_FILE: &str = "session.toml";

/// `<platform config dir>/patchbay`, or `./patchbay` when the platform has none.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default settings file location.
pub fn settings_path() -> PathBuf {
    user_config_dir().join(SETTINGS_FILE)
}

/// Default host session location.
pub fn session_path() -> PathBuf {
    user_config_dir().join(SESSION_FILE)
}

/// Default scratch directory for generated sources and compiled modules.
pub fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join(APP_NAME)
}
