//! Process settings.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ConfigError;
use crate::paths::default_work_dir;

/// Placeholder in [`CompilerSettings::entry_symbol`] replaced by the module name.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// All settings, one section per process role.
///
/// # TOML Format
///
/// ```toml
/// [compiler]
/// python = "python3"
/// hvcc = "/opt/homebrew/bin/hvcc"
/// cxx = "c++"
///
/// [editor]
/// autosave = true
/// poll_interval_ms = 20
///
/// [host]
/// sample_rate = 44100
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// External code generator and native toolchain.
    pub compiler: CompilerSettings,
    /// Editor process behavior.
    pub editor: EditorSettings,
    /// Host process behavior.
    pub host: HostSettings,
}

/// How patches are turned into loadable modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerSettings {
    /// Interpreter used to run the generator.
    pub python: String,
    /// Generator script.
    pub hvcc: PathBuf,
    /// C++ compiler.
    pub cxx: String,
    /// Linker driver.
    pub cc: String,
    /// Flags passed to `cxx` for every generated source.
    pub cxx_flags: Vec<String>,
    /// Flags passed to `cc` when linking the module.
    pub linker_flags: Vec<String>,
    /// Extension of loadable modules, without the dot.
    pub library_extension: String,
    /// Scratch directory for generated sources and modules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
    /// Construction entry point; `{name}` is replaced by the module name.
    pub entry_symbol: String,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        let (cxx_flags, linker_flags, ext): (&[&str], &[&str], &str) = if cfg!(target_os = "macos")
        {
            (
                &[
                    "-std=c++17",
                    "-DHAVE_STRUCT_TIMESPEC",
                    "-O3",
                    "-ffast-math",
                    "-funroll-loops",
                    "-fomit-frame-pointer",
                ],
                &["-undefined", "suppress", "-flat_namespace", "-bundle"],
                "dylib",
            )
        } else if cfg!(target_os = "windows") {
            (&["-std=c++17", "-O3"], &["-shared"], "dll")
        } else {
            (
                &[
                    "-std=c++17",
                    "-O3",
                    "-ffast-math",
                    "-funroll-loops",
                    "-fomit-frame-pointer",
                    "-fPIC",
                ],
                &["-shared", "-lstdc++"],
                "so",
            )
        };
        Self {
            python: "python3".into(),
            hvcc: PathBuf::from("hvcc"),
            cxx: "c++".into(),
            cc: "cc".into(),
            cxx_flags: cxx_flags.iter().map(|s| (*s).to_string()).collect(),
            linker_flags: linker_flags.iter().map(|s| (*s).to_string()).collect(),
            library_extension: ext.into(),
            work_dir: None,
            entry_symbol: format!("make_{NAME_PLACEHOLDER}"),
        }
    }
}

impl CompilerSettings {
    /// Scratch directory, falling back to the platform temp dir.
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(default_work_dir)
    }

    /// Entry point symbol for a module name.
    pub fn entry_symbol_for(&self, name: &str) -> String {
        self.entry_symbol.replace(NAME_PLACEHOLDER, name)
    }
}

/// Editor process behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Save and recompile automatically after edits.
    pub autosave: bool,
    /// Transport drain interval in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            autosave: false,
            poll_interval_ms: 20,
        }
    }
}

/// Host process behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    /// Sample rate passed to module constructors, in Hz.
    pub sample_rate: u32,
    /// Frames per processing block.
    pub block_size: usize,
    /// Editor executable; defaults to the running binary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor_executable: Option<PathBuf>,
    /// Delete module files once loaded.
    pub cleanup_modules: bool,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            block_size: 64,
            editor_executable: None,
            cleanup_modules: true,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let settings = Self::from_toml(&content)?;
        tracing::debug!("settings: loaded {}", path.display());
        Ok(settings)
    }

    /// Load settings, or defaults if the file does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("settings: {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Parse and validate settings from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(toml_str)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::create_dir(parent, e))?;
            }
        }
        std::fs::write(path, self.to_toml()?).map_err(|e| ConfigError::write_file(path, e))
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values no process can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.sample_rate == 0 {
            return Err(ConfigError::invalid("host.sample_rate", "must be positive"));
        }
        if self.host.block_size == 0 {
            return Err(ConfigError::invalid("host.block_size", "must be positive"));
        }
        if self.editor.poll_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "editor.poll_interval_ms",
                "must be positive",
            ));
        }
        if !self.compiler.entry_symbol.contains(NAME_PLACEHOLDER) {
            return Err(ConfigError::invalid(
                "compiler.entry_symbol",
                format!("must contain '{NAME_PLACEHOLDER}'"),
            ));
        }
        if self.compiler.library_extension.starts_with('.') {
            return Err(ConfigError::invalid(
                "compiler.library_extension",
                "give the extension without a leading dot",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(Settings::from_toml("").unwrap(), Settings::default());
    }

    #[test]
    fn test_partial_section() {
        let settings = Settings::from_toml(
            r#"
            [editor]
            autosave = true

            [compiler]
            hvcc = "/opt/homebrew/bin/hvcc"
            "#,
        )
        .unwrap();
        assert!(settings.editor.autosave);
        assert_eq!(settings.editor.poll_interval_ms, 20);
        assert_eq!(settings.compiler.hvcc, PathBuf::from("/opt/homebrew/bin/hvcc"));
        assert_eq!(settings.compiler.cxx, "c++");
        assert_eq!(settings.host.sample_rate, 48000);
    }

    #[test]
    fn test_entry_symbol() {
        let compiler = CompilerSettings::default();
        assert_eq!(compiler.entry_symbol_for("synth_3"), "make_synth_3");

        let custom = CompilerSettings {
            entry_symbol: "hv_{name}_new".into(),
            ..CompilerSettings::default()
        };
        assert_eq!(custom.entry_symbol_for("synth"), "hv_synth_new");
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            Settings::from_toml("[host]\nsample_rate = 0\n"),
            Err(ConfigError::InvalidSetting { ref key, .. }) if key == "host.sample_rate"
        ));
        assert!(Settings::from_toml("[compiler]\nentry_symbol = \"make\"\n").is_err());
        assert!(Settings::from_toml("[compiler]\nlibrary_extension = \".so\"\n").is_err());
        assert!(Settings::from_toml("[editor]\npoll_interval_ms = 0\n").is_err());
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(matches!(
            Settings::from_toml("[host]\nsample_rate = \"fast\"\n"),
            Err(ConfigError::TomlParse(_))
        ));
    }

    #[test]
    fn test_work_dir_fallback() {
        let mut compiler = CompilerSettings::default();
        assert_eq!(compiler.work_dir(), default_work_dir());
        compiler.work_dir = Some(PathBuf::from("/tmp/elsewhere"));
        assert_eq!(compiler.work_dir(), PathBuf::from("/tmp/elsewhere"));
    }
}
