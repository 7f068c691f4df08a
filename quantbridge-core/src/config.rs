//! Application configuration, loaded from TOML.
//!
//! Every field has a default, so a partial file (or no file at all) is
//! valid. The CLI overrides individual fields from flags after loading.
//!
//! ```toml
//! store_dir = "data/store"
//! timezone = "Asia/Kuala_Lumpur"
//!
//! [network]
//! proxy = "http://127.0.0.1:7890"
//! timeout_secs = 30
//!
//! [crypto]
//! default_venue = "Binance (Global)"
//! ```

use crate::data::crypto::{find_venue, DEFAULT_VENUE};
use crate::data::gaps::{GapAnalyzer, DEFAULT_TOLERANCE_DAYS};
use crate::data::session::SessionWindow;
use crate::data::store::DEFAULT_LOOKBACK_DAYS;
use crate::data::timezone::{TimezoneStandardizer, DEFAULT_TIMEZONE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("parse config TOML: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Applied to every provider request when set.
    pub proxy: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout_secs: 30,
        }
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    pub default_venue: String,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            default_venue: DEFAULT_VENUE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub export_dir: PathBuf,
    /// IANA zone every fetched series is expressed in.
    pub timezone: String,
    pub default_lookback_days: i64,
    pub gap_tolerance_days: i64,
    pub session: SessionWindow,
    pub network: NetworkConfig,
    pub crypto: CryptoConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("data/store"),
            processed_dir: PathBuf::from("data/processed"),
            export_dir: PathBuf::from("exported_data"),
            timezone: DEFAULT_TIMEZONE.to_string(),
            default_lookback_days: DEFAULT_LOOKBACK_DAYS,
            gap_tolerance_days: DEFAULT_TOLERANCE_DAYS,
            session: SessionWindow::default(),
            network: NetworkConfig::default(),
            crypto: CryptoConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string and validate it.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timezone_standardizer()?;
        if find_venue(&self.crypto.default_venue).is_none() {
            return Err(ConfigError::Invalid(format!(
                "unknown crypto venue '{}'",
                self.crypto.default_venue
            )));
        }
        if self.default_lookback_days <= 0 {
            return Err(ConfigError::Invalid("default_lookback_days must be positive".into()));
        }
        if self.gap_tolerance_days < 0 {
            return Err(ConfigError::Invalid("gap_tolerance_days must not be negative".into()));
        }
        if self.session.start >= self.session.end {
            return Err(ConfigError::Invalid("session start must precede session end".into()));
        }
        if self.network.timeout_secs == 0 {
            return Err(ConfigError::Invalid("network timeout must be positive".into()));
        }
        Ok(())
    }

    pub fn timezone_standardizer(&self) -> Result<TimezoneStandardizer, ConfigError> {
        TimezoneStandardizer::from_name(&self.timezone).map_err(ConfigError::Invalid)
    }

    pub fn gap_analyzer(&self) -> GapAnalyzer {
        GapAnalyzer::with_tolerance_days(self.gap_tolerance_days)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
