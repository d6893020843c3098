use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use thiserror::Error;

use super::alarms::model::{AlarmGroup, AlarmSettings};
use super::catalog::StaticCatalog;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("item catalog {path} not found")]
    MissingCatalog { path: PathBuf },
    #[error("item catalog {path} contains no gatherables")]
    EmptyCatalog { path: PathBuf },
}

/// Application settings with alarm configuration.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// Client language tag of the chat log, e.g. `en` or `de`.
    #[serde(default = "default_language")]
    pub language: String,
    /// Chat log file to tail for fishing events.
    #[serde(default)]
    pub chatlog_path: Option<PathBuf>,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    #[serde(default)]
    pub alarm_settings: AlarmSettings,
    #[serde(default)]
    pub alarm_groups: Vec<AlarmGroup>,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_tick_interval() -> u64 {
    1000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: default_language(),
            chatlog_path: None,
            tick_interval_ms: default_tick_interval(),
            alarm_settings: AlarmSettings::default(),
            alarm_groups: Vec::new(),
        }
    }
}

pub struct ConfigManager {
    config_path: PathBuf,
    catalog_path: PathBuf,
}

impl ConfigManager {
    pub fn new(app_config_dir: PathBuf) -> Self {
        Self {
            config_path: app_config_dir.join("settings.json"),
            catalog_path: app_config_dir.join("catalog.json"),
        }
    }

    pub fn load(&self) -> Settings {
        if self.config_path.exists() {
            match fs::read_to_string(&self.config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(settings) => return settings,
                    Err(e) => log::warn!("Ignoring malformed {}: {}", self.config_path.display(), e),
                },
                Err(e) => log::warn!("Failed to read {}: {}", self.config_path.display(), e),
            }
        }
        Settings::default()
    }

    pub fn save(&self, settings: &Settings) -> io::Result<()> {
        // Ensure directory exists
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(&self.config_path, content)
    }

    /// Load the item catalog. Alarms cannot be resolved without one, so a
    /// missing or empty catalog is an error.
    pub fn load_catalog(&self) -> Result<StaticCatalog, ConfigError> {
        if !self.catalog_path.exists() {
            return Err(ConfigError::MissingCatalog {
                path: self.catalog_path.clone(),
            });
        }
        let content = fs::read_to_string(&self.catalog_path).map_err(|source| ConfigError::Io {
            path: self.catalog_path.clone(),
            source,
        })?;
        let catalog = StaticCatalog::from_json(&content).map_err(|source| ConfigError::Json {
            path: self.catalog_path.clone(),
            source,
        })?;
        if catalog.is_empty() {
            return Err(ConfigError::EmptyCatalog {
                path: self.catalog_path.clone(),
            });
        }
        Ok(catalog)
    }
}
