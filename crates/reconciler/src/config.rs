use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use types::{Currency, RefreshError};

/// Service policy and wiring, loaded from a YAML file.
///
/// Fee rate, refresh interval and the supported currency set are deployment
/// policy, not code; nothing in the service hardcodes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub supported_currencies: Vec<Currency>,
    pub min_refresh_interval_secs: u64,
    pub fee_rate: Decimal,
    pub call_timeout_secs: u64,
    pub database_directory: PathBuf,
    /// Esplora-compatible REST base URL per chain. A supported currency
    /// without an endpoint makes fetches for users holding that currency
    /// fail hard rather than read as zero.
    pub chain_endpoints: BTreeMap<Currency, String>,
    pub price_api_url: String,
    pub log_file_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            supported_currencies: Currency::ALL.to_vec(),
            min_refresh_interval_secs: 300,
            fee_rate: dec!(0.05),
            call_timeout_secs: 30,
            database_directory: PathBuf::from("topupdb"),
            chain_endpoints: BTreeMap::from([
                (Currency::Btc, "https://blockstream.info/api".to_string()),
                (Currency::Ltc, "https://litecoinspace.org/api".to_string()),
            ]),
            price_api_url: "https://api.coingecko.com/api/v3/simple/price".to_string(),
            log_file_path: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, RefreshError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| RefreshError::Config(format!("failed to read config file: {e}")))?;

        let config: Self = serde_yaml::from_str(&contents)
            .map_err(|e| RefreshError::Config(format!("failed to deserialize config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the service cannot run with. A fee rate at or above 1
    /// would produce non-positive credits and shrink the top-up total, which
    /// is monotonically non-decreasing by contract.
    fn validate(&self) -> Result<(), RefreshError> {
        if self.fee_rate < Decimal::ZERO || self.fee_rate >= Decimal::ONE {
            return Err(RefreshError::Config(format!(
                "fee_rate must be in [0, 1), got {}",
                self.fee_rate
            )));
        }
        if self.min_refresh_interval_secs == 0 {
            return Err(RefreshError::Config(
                "min_refresh_interval_secs must be nonzero".into(),
            ));
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), RefreshError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| RefreshError::Config(format!("failed to create config dir: {e}")))?;
        }

        let contents = serde_yaml::to_string(self)
            .map_err(|e| RefreshError::Config(format!("failed to serialize config: {e}")))?;

        fs::write(path, contents)
            .map_err(|e| RefreshError::Config(format!("failed to write config file: {e}")))
    }

    pub fn default_path() -> Result<PathBuf, RefreshError> {
        let proj_dirs = ProjectDirs::from("", "", "TopUp")
            .ok_or_else(|| RefreshError::Config("failed to determine project directory".into()))?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }
}
