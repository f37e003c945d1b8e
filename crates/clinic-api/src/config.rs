use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use clinic_core::config::{value_or_default, ClinicConfig};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<clinic_core::Error> for ConfigError {
    fn from(error: clinic_core::Error) -> Self {
        Self::Invalid(error.to_string())
    }
}

/// Server settings; credentials are redacted in `Debug` by [`ClinicConfig`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub db_path: PathBuf,
    pub clinic: ClinicConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "CLINIC_API_BIND_ADDR", "127.0.0.1:8080");
        let clinic = ClinicConfig::from_lookup(&lookup)?;

        let db_path = match clinic.db_path.clone() {
            Some(path) => path,
            None => default_db_path().ok_or_else(|| {
                ConfigError::Invalid(
                    "CLINIC_DB_PATH is required when no platform data directory exists"
                        .to_string(),
                )
            })?,
        };

        Ok(Self {
            bind_addr,
            db_path,
            clinic,
        })
    }
}

fn default_db_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("clinic").join("clinic.db"))
}
