//! ConfigStore - Local Settings Storage

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};

use crate::constants::SETTINGS_FILE;
use crate::domain::config::GridSettings;
use crate::error::Result;
use crate::helpers::get_or_create_config_dir;

/// Default settings file location
pub fn settings_path() -> Result<PathBuf> {
    Ok(get_or_create_config_dir()?.join(SETTINGS_FILE))
}

/// Load a TOML file, falling back to `T::default()` when it does not exist
pub fn load_toml<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }

    let content = fs::read_to_string(path)?;
    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Save a TOML file
pub fn save_toml<T: Serialize>(path: &Path, config: &T) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

/// Load and validate grid settings from `path`
pub fn load_settings(path: &Path) -> Result<GridSettings> {
    let settings: GridSettings = load_toml(path)?;
    settings.validate()?;
    tracing::debug!(path = %path.display(), "settings loaded");
    Ok(settings)
}

/// Validate and save grid settings to `path`
pub fn save_settings(path: &Path, settings: &GridSettings) -> Result<()> {
    settings.validate()?;
    save_toml(path, settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let settings = load_settings(&tmp.path().join(SETTINGS_FILE)).expect("load");
        assert_eq!(settings, GridSettings::default());
    }

    #[test]
    fn test_save_then_load() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("nested").join(SETTINGS_FILE);

        let mut settings = GridSettings::default();
        settings.cache.cache_size = 1234;
        settings.viewport.overscan = 4;
        save_settings(&path, &settings).expect("save");

        assert_eq!(load_settings(&path).expect("load"), settings);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join(SETTINGS_FILE);

        fs::write(&path, "[layout.base]\ncolumns = 10.5\ncell_size = 12.0\n").expect("write");
        assert!(load_settings(&path).is_err());

        fs::write(&path, "[viewport]\nitem_height = -1.0\n").expect("write");
        assert!(load_settings(&path).expect_err("negative").is_configuration());
    }
}
