//! Billing configuration: rate table, display currency, and defaults for bulk settlement.

use std::{
    cmp::Reverse,
    env,
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::{RateTable, SportRates, TimeOfDay};

const DEFAULT_DIR_NAME: &str = ".court_billing";
const HOME_ENV: &str = "COURT_BILLING_HOME";
const CONFIG_FILE: &str = "config.json";
const BACKUP_EXTENSION: &str = "json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M";
const TMP_SUFFIX: &str = "tmp";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serde(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BillingConfig {
    /// Display currency code. Amounts are never converted.
    pub currency: String,
    pub rates: RateTable,
    #[serde(default = "BillingConfig::default_bulk_note_value")]
    pub default_bulk_note: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Optional custom root for the JSON store. Defaults to the config directory.
    pub data_dir: Option<PathBuf>,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            currency: "MYR".into(),
            rates: Self::default_rates(),
            default_bulk_note: Self::default_bulk_note_value(),
            data_dir: None,
        }
    }
}

impl BillingConfig {
    pub fn default_bulk_note_value() -> String {
        "Bulk marked as paid".into()
    }

    fn default_rates() -> RateTable {
        let evening = TimeOfDay::EVENING;
        RateTable::new()
            .with_sport(
                "badminton",
                SportRates {
                    off_peak_rate: dec!(20),
                    peak_rate: dec!(30),
                    peak_start: evening,
                },
            )
            .with_sport(
                "pickleball",
                SportRates {
                    off_peak_rate: dec!(25),
                    peak_rate: dec!(35),
                    peak_start: evening,
                },
            )
            .with_sport(
                "tennis",
                SportRates {
                    off_peak_rate: dec!(40),
                    peak_rate: dec!(60),
                    peak_start: evening,
                },
            )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.currency.trim().is_empty() {
            return Err(ConfigError::Invalid("currency must not be empty".into()));
        }
        self.rates
            .validate()
            .map_err(|err| ConfigError::Invalid(err.to_string()))
    }
}

/// Returns the application data directory, `$COURT_BILLING_HOME` or `~/.court_billing`.
pub fn default_dir() -> PathBuf {
    if let Some(custom) = env::var_os(HOME_ENV) {
        return PathBuf::from(custom);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_DIR_NAME)
}

/// Handles persistence and backup management for [`BillingConfig`].
#[derive(Debug, Clone)]
pub struct ConfigManager {
    base_dir: PathBuf,
    config_path: PathBuf,
    backups_dir: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_base_dir(default_dir())
    }

    pub fn with_base_dir(base: PathBuf) -> Result<Self, ConfigError> {
        let backups_dir = base.join("config_backups");
        fs::create_dir_all(&backups_dir)?;
        Ok(Self {
            config_path: base.join(CONFIG_FILE),
            base_dir: base,
            backups_dir,
        })
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Where the JSON store lives unless the config overrides it.
    pub fn data_dir(&self, config: &BillingConfig) -> PathBuf {
        config
            .data_dir
            .clone()
            .unwrap_or_else(|| self.base_dir.join("data"))
    }

    /// Loads and validates the config, falling back to defaults when no file exists.
    pub fn load(&self) -> Result<BillingConfig, ConfigError> {
        let config = if self.config_path.exists() {
            let data = fs::read_to_string(&self.config_path)?;
            serde_json::from_str(&data).map_err(|err| ConfigError::Serde(err.to_string()))?
        } else {
            BillingConfig::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &BillingConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let json = serde_json::to_string_pretty(config)
            .map_err(|err| ConfigError::Serde(err.to_string()))?;
        let tmp = tmp_path(&self.config_path);
        write_atomic(&tmp, &json)?;
        fs::rename(&tmp, &self.config_path)?;
        Ok(())
    }

    pub fn backup(&self, config: &BillingConfig, note: Option<&str>) -> Result<String, ConfigError> {
        fs::create_dir_all(&self.backups_dir)?;
        let timestamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let mut name = format!("config_{}", timestamp);
        if let Some(label) = sanitize_note(note) {
            name.push('_');
            name.push_str(&label);
        }
        name.push_str(&format!(".{}", BACKUP_EXTENSION));
        let json = serde_json::to_string_pretty(config)
            .map_err(|err| ConfigError::Serde(err.to_string()))?;
        write_atomic(&self.backups_dir.join(&name), &json)?;
        Ok(name)
    }

    pub fn restore(&self, backup_name: &str) -> Result<BillingConfig, ConfigError> {
        let path = self.backups_dir.join(backup_name);
        if !path.exists() {
            return Err(ConfigError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("configuration backup `{}` not found", backup_name),
            )));
        }
        let data = fs::read_to_string(&path)?;
        let config: BillingConfig =
            serde_json::from_str(&data).map_err(|err| ConfigError::Serde(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Backup file names, newest first.
    pub fn list_backups(&self) -> Result<Vec<String>, ConfigError> {
        if !self.backups_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.backups_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(BACKUP_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                entries.push(name.to_string());
            }
        }
        entries.sort_by_key(|name| Reverse(parse_timestamp(name)));
        Ok(entries)
    }
}

fn sanitize_note(note: Option<&str>) -> Option<String> {
    let raw = note?.trim();
    let mut sanitized = String::new();
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            sanitized.push(ch.to_ascii_lowercase());
        } else if !sanitized.is_empty() && !sanitized.ends_with('-') {
            sanitized.push('-');
        }
    }
    let trimmed = sanitized.trim_matches('-');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let stem = name.strip_suffix(&format!(".{}", BACKUP_EXTENSION))?;
    let mut segments = stem.split('_').skip(1);
    let date_part = segments.next()?;
    let time_part = segments.next()?;
    NaiveDateTime::parse_from_str(&format!("{date_part}{time_part}"), "%Y%m%d%H%M")
        .ok()
        .map(|naive| naive.and_utc())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    tmp.set_extension(format!("{}.{}", BACKUP_EXTENSION, TMP_SUFFIX));
    tmp
}

fn write_atomic(path: &Path, data: &str) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).unwrap();
        let config = manager.load().unwrap();
        assert_eq!(config, BillingConfig::default());
        assert!(config.rates.rates_for("Badminton").is_ok());
        assert_eq!(manager.data_dir(&config), dir.path().join("data"));
    }

    #[test]
    fn save_and_backup_roundtrip() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).unwrap();
        let mut config = BillingConfig::default();
        config.default_bulk_note = "Settled at front desk".into();
        manager.save(&config).unwrap();
        assert_eq!(manager.load().unwrap().default_bulk_note, "Settled at front desk");

        let name = manager.backup(&config, Some("Before rate change!")).unwrap();
        assert!(name.ends_with("_before-rate-change.json"), "{name}");
        assert_eq!(manager.list_backups().unwrap(), vec![name.clone()]);
        assert_eq!(manager.restore(&name).unwrap(), config);
    }

    #[test]
    fn invalid_rates_fail_to_load() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).unwrap();
        let mut config = BillingConfig::default();
        config.rates.insert(
            "squash",
            SportRates {
                off_peak_rate: dec!(-1),
                peak_rate: dec!(10),
                peak_start: TimeOfDay::new(18, 0).unwrap(),
            },
        );
        let raw = serde_json::to_string(&config).unwrap();
        fs::write(manager.config_path(), raw).unwrap();
        assert!(matches!(manager.load(), Err(ConfigError::Invalid(_))));
    }
}
