use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::aggregate::Interval;
use crate::error::{PaylensError, Result};
use crate::filter::CarrierScope;
use crate::loader::{Encoding, LoadOptions, DEFAULT_TIMESTAMP_COLUMN};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_data_file")]
    pub data_file: String,
    #[serde(default)]
    pub encoding: Encoding,
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,
    #[serde(default)]
    pub carrier_scope: CarrierScope,
    #[serde(default)]
    pub default_interval: Interval,
}

fn default_data_file() -> String {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("PaymentData.csv")
        .to_string_lossy()
        .to_string()
}

fn default_timestamp_column() -> String {
    DEFAULT_TIMESTAMP_COLUMN.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            encoding: Encoding::default(),
            timestamp_column: default_timestamp_column(),
            carrier_scope: CarrierScope::default(),
            default_interval: Interval::default(),
        }
    }
}

impl Settings {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            encoding: self.encoding,
            timestamp_column: self.timestamp_column.clone(),
        }
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("paylens")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

pub fn log_path() -> PathBuf {
    config_dir().join("paylens.log")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<PathBuf> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| PaylensError::Settings(e.to_string()))?;
    let path = settings_path();
    std::fs::write(&path, format!("{json}\n"))?;
    Ok(path)
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}
