// bookmark-sync Settings Engine
// Loads, saves, updates and resets the merge settings.
// Settings are stored as a JSON file under the user's config directory.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::types::errors::SettingsError;
use crate::types::settings::MergeSettings;

/// Trait defining the settings engine interface.
pub trait SettingsEngineTrait {
    fn load(&mut self) -> Result<MergeSettings, SettingsError>;
    fn save(&self) -> Result<(), SettingsError>;
    fn get_settings(&self) -> &MergeSettings;
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), SettingsError>;
    fn reset(&mut self) -> Result<(), SettingsError>;
    fn get_config_path(&self) -> &Path;
}

/// Settings engine that persists `MergeSettings` as pretty-printed JSON.
pub struct SettingsEngine {
    config_path: PathBuf,
    settings: MergeSettings,
}

impl SettingsEngine {
    /// Creates a new SettingsEngine.
    ///
    /// Without an override the file lives at
    /// `<config dir>/bookmark-sync/merge_settings.json`, falling back to the
    /// working directory when the platform has no config directory.
    pub fn new(path_override: Option<PathBuf>) -> Self {
        let config_path = path_override.unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("bookmark-sync")
                .join("merge_settings.json")
        });

        Self {
            config_path,
            settings: MergeSettings::default(),
        }
    }
}

impl SettingsEngineTrait for SettingsEngine {
    /// Loads settings from disk. A missing file yields the defaults; a
    /// malformed one is a serialization error. Missing keys take defaults.
    fn load(&mut self) -> Result<MergeSettings, SettingsError> {
        if !self.config_path.exists() {
            debug!(path = %self.config_path.display(), "no merge settings file, using defaults");
            self.settings = MergeSettings::default();
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| SettingsError::IoError(format!("Failed to read config file: {}", e)))?;

        self.settings = serde_json::from_str(&content).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to parse config file: {}", e))
        })?;
        Ok(self.settings.clone())
    }

    /// Writes the current settings, creating parent directories as needed.
    fn save(&self) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SettingsError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        fs::write(&self.config_path, json)
            .map_err(|e| SettingsError::IoError(format!("Failed to write config file: {}", e)))
    }

    fn get_settings(&self) -> &MergeSettings {
        &self.settings
    }

    /// Updates one setting by field name and saves.
    ///
    /// The new value is validated by deserializing the whole settings object;
    /// a depth cap of zero is rejected.
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), SettingsError> {
        if key.is_empty() {
            return Err(SettingsError::InvalidKey("Key cannot be empty".to_string()));
        }

        let mut json_value = serde_json::to_value(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;
        let serde_json::Value::Object(map) = &mut json_value else {
            return Err(SettingsError::SerializationError(
                "Settings did not serialize to an object".to_string(),
            ));
        };
        match map.get_mut(key) {
            Some(slot) => *slot = value,
            None => {
                return Err(SettingsError::InvalidKey(format!(
                    "Key '{}' not found in settings",
                    key
                )))
            }
        }

        let new_settings: MergeSettings = serde_json::from_value(json_value).map_err(|e| {
            SettingsError::InvalidValue(format!("Invalid value for key '{}': {}", key, e))
        })?;
        if new_settings.max_tree_depth == 0 {
            return Err(SettingsError::InvalidValue(
                "max_tree_depth must be at least 1".to_string(),
            ));
        }

        self.settings = new_settings;
        self.save()
    }

    /// Restores the defaults and saves.
    fn reset(&mut self) -> Result<(), SettingsError> {
        self.settings = MergeSettings::default();
        self.save()
    }

    fn get_config_path(&self) -> &Path {
        &self.config_path
    }
}
