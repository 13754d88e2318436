//! Integration tests for patchbay-config file handling.

use patchbay_config::{ConfigError, Session, Settings};
use tempfile::TempDir;

#[test]
fn test_settings_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("settings.toml");

    let mut settings = Settings::default();
    settings.editor.autosave = true;
    settings.host.sample_rate = 44100;
    settings.compiler.cxx_flags.push("-march=native".into());
    settings.save(&path).unwrap();

    let loaded = Settings::load(&path).unwrap();
    assert_eq!(loaded, settings);
}

#[test]
fn test_missing_settings_fall_back() {
    let dir = TempDir::new().unwrap();
    let settings = Settings::load_or_default(dir.path().join("absent.toml")).unwrap();
    assert_eq!(settings, Settings::default());
}

#[test]
fn test_missing_settings_error_names_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    match Settings::load(&path) {
        Err(e @ ConfigError::Io { .. }) => {
            assert!(e.is_not_found());
            assert!(e.to_string().contains("absent.toml"));
        }
        other => panic!("expected Io, got {other:?}"),
    }
}

#[test]
fn test_invalid_file_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.toml");
    std::fs::write(&path, "[host]\nblock_size = 0\n").unwrap();
    assert!(matches!(
        Settings::load(&path),
        Err(ConfigError::InvalidSetting { .. })
    ));
}

#[test]
fn test_session_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.toml");

    let mut session = Session::load_or_default(&path).unwrap();
    assert!(session.is_empty());
    session.set("0", "I04gY2FudmFzIDYzIDg4IDQ1MCAzMDAgMTI7Cg==");
    session.set("1", "");
    session.save(&path).unwrap();

    let loaded = Session::load(&path).unwrap();
    assert_eq!(loaded, session);
    assert_eq!(loaded.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(), ["0", "1"]);
}
