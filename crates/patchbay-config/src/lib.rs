//! Configuration for patchbay processes.
//!
//! # Features
//!
//! - **Settings**: toolchain commands, editor polling and autosave, host
//!   audio parameters, read from a TOML file with every field defaulted
//! - **Session**: host-side saved patch state per target, persisted as TOML
//! - **Paths**: platform-specific config and scratch directories
//!
//! # Example
//!
//! ```rust,no_run
//! use patchbay_config::{Settings, paths};
//!
//! // Missing file falls back to defaults
//! let settings = Settings::load_or_default(paths::settings_path()).unwrap();
//! println!("compiling with {}", settings.compiler.cxx);
//! ```

mod error;
mod session;
mod settings;

/// Platform-specific paths for configuration and build products.
pub mod paths;

pub use error::ConfigError;
pub use session::{SavedTarget, Session};
pub use settings::{CompilerSettings, EditorSettings, HostSettings, Settings};
pub use paths::{settings_path, user_config_dir};
