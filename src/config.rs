use serde::Deserialize;
use std::ops::Range;
use std::path::Path;
use std::time::Duration;
use tracing::info;

const DEFAULT_LISTING_URL: &str =
    "http://www.viaggiatreno.it/infomobilita/resteasy/viaggiatreno/cercaNumeroTrenoTrenoAutocomplete/";
const DEFAULT_DETAIL_URL: &str =
    "http://www.viaggiatreno.it/infomobilita/resteasy/viaggiatreno/andamentoTreno/";
const DEFAULT_ITALO_URL: &str =
    "https://italoinviaggio.italotreno.it/api/RicercaTrenoService?TrainNumber=";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite connection string, e.g. `sqlite://database.db`
    pub database_url: String,
    /// Autocomplete endpoint; the train number is appended to it
    pub listing_url: String,
    /// Train progress endpoint; the reformatted listing field is appended to it
    pub detail_url: String,
    /// Italo lookup endpoint. Not queried by the scan.
    pub italo_url: String,
    pub request_timeout_secs: u64,
    /// First train number scanned (inclusive)
    pub min_train: u32,
    /// Last train number scanned (exclusive)
    pub max_train: u32,
    pub workers: usize,
    /// Drop and recreate the table on startup. When false, existing rows are kept.
    pub reset_on_start: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://database.db".to_string(),
            listing_url: DEFAULT_LISTING_URL.to_string(),
            detail_url: DEFAULT_DETAIL_URL.to_string(),
            italo_url: DEFAULT_ITALO_URL.to_string(),
            request_timeout_secs: 5,
            min_train: 600,
            max_train: 30000,
            workers: 50,
            reset_on_start: true,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Self::from_yaml(&content)
    }

    /// Load the file if it exists, otherwise fall back to the built-in defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            info!(
                path = %path.as_ref().display(),
                "No config file found, using defaults"
            );
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn train_range(&self) -> Range<u32> {
        self.min_train..self.max_train
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}
