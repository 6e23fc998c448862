//! On-disk settings persistence
//!
//! Settings live in a single JSON file holding a (possibly partial)
//! `Configuration`. Missing keys take their defaults; unknown keys are
//! logged and ignored. Saving keeps the previous file as `<path>.backup`.

use crate::config::Configuration;
use crate::error::CursorError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Settings files larger than this are refused
pub const MAX_SETTINGS_BYTES: u64 = 1024 * 1024;

/// JSON-file backed configuration store
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path the previous settings are copied to on save
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".backup");
        PathBuf::from(name)
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Load the stored configuration, or defaults when no file exists yet
    pub fn load(&self) -> Result<Configuration, CursorError> {
        let size = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no settings file, using defaults");
                return Ok(Configuration::default());
            }
            Err(e) => return Err(e.into()),
        };
        if size > MAX_SETTINGS_BYTES {
            return Err(CursorError::SettingsTooLarge {
                size,
                limit: MAX_SETTINGS_BYTES,
            });
        }

        let text = fs::read_to_string(&self.path)?;
        let config = parse_settings(&text)?;
        info!(path = %self.path.display(), mode = config.mode.as_str(), "settings loaded");
        Ok(config)
    }

    /// Validate and write `config`, keeping the previous file as a backup.
    ///
    /// The new settings are staged next to the target and renamed over it,
    /// so a failed write leaves the existing file in place.
    pub fn save(&self, config: &Configuration) -> Result<(), CursorError> {
        config.validate()?;
        let json = config.to_json()?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let staging = self.staging_path();
        fs::write(&staging, json)?;

        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, self.backup_path()) {
                let _ = fs::remove_file(&staging);
                return Err(e.into());
            }
        }
        fs::rename(&staging, &self.path)?;

        info!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

/// Parse settings text, warning about keys that are not configuration fields
pub fn parse_settings(text: &str) -> Result<Configuration, CursorError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let Some(object) = value.as_object() else {
        return Err(CursorError::InvalidConfig(
            "settings must be a JSON object".to_string(),
        ));
    };

    let known = serde_json::to_value(Configuration::default())?;
    if let Some(known) = known.as_object() {
        for key in object.keys().filter(|k| !known.contains_key(k.as_str())) {
            warn!(key = %key, "ignoring unknown settings key");
        }
    }

    let config: Configuration = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}
