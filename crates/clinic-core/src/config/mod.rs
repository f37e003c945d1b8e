//! Runtime configuration shared by the API server and the CLI.
//!
//! Values come from the process environment through a lookup closure so that
//! parsing can be exercised without touching real variables.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::EntityKind;
use crate::util::is_http_url;

const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;

/// Location and credential of one external feed.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    pub url: String,
    pub api_key: Option<String>,
}

impl fmt::Debug for RemoteEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RemoteEndpoint")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinicConfig {
    /// Explicit database file; callers fall back to the platform data dir.
    pub db_path: Option<PathBuf>,
    pub sync_interval: Duration,
    /// Deadline applied to each remote call
    pub remote_timeout: Duration,
    pub appointments_remote: Option<RemoteEndpoint>,
    pub clients_remote: Option<RemoteEndpoint>,
}

impl Default for ClinicConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            remote_timeout: Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
            appointments_remote: None,
            clients_remote: None,
        }
    }
}

impl ClinicConfig {
    pub fn from_env() -> Result<Self> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = optional_trimmed(&lookup, "CLINIC_DB_PATH").map(PathBuf::from);

        let sync_interval_secs = parse_secs(
            &lookup,
            "CLINIC_SYNC_INTERVAL_SECS",
            DEFAULT_SYNC_INTERVAL_SECS,
            10..=86_400,
        )?;
        let remote_timeout_secs = parse_secs(
            &lookup,
            "CLINIC_REMOTE_TIMEOUT_SECS",
            DEFAULT_REMOTE_TIMEOUT_SECS,
            1..=120,
        )?;

        let shared_key = optional_trimmed(&lookup, "EXTERNAL_API_KEY");
        let appointments_remote = parse_remote(
            &lookup,
            "EXTERNAL_APPOINTMENTS_URL",
            "EXTERNAL_APPOINTMENTS_API_KEY",
            shared_key.as_ref(),
        )?;
        let clients_remote = parse_remote(
            &lookup,
            "EXTERNAL_CLIENTS_URL",
            "EXTERNAL_CLIENTS_API_KEY",
            shared_key.as_ref(),
        )?;

        Ok(Self {
            db_path,
            sync_interval: Duration::from_secs(sync_interval_secs),
            remote_timeout: Duration::from_secs(remote_timeout_secs),
            appointments_remote,
            clients_remote,
        })
    }

    pub const fn remote(&self, kind: EntityKind) -> Option<&RemoteEndpoint> {
        match kind {
            EntityKind::Appointment => self.appointments_remote.as_ref(),
            EntityKind::Client => self.clients_remote.as_ref(),
        }
    }
}

fn parse_secs(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
    range: std::ops::RangeInclusive<u64>,
) -> Result<u64> {
    let bounds = format!("[{}, {}]", range.start(), range.end());
    let Some(raw) = optional_trimmed(lookup, name) else {
        return Ok(default);
    };
    let value = raw
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{name} must be an integer in {bounds}")))?;
    if !range.contains(&value) {
        return Err(Error::Config(format!("{name} must be in {bounds}")));
    }
    Ok(value)
}

fn parse_remote(
    lookup: impl Fn(&str) -> Option<String>,
    url_var: &str,
    key_var: &str,
    shared_key: Option<&String>,
) -> Result<Option<RemoteEndpoint>> {
    let Some(url) = optional_trimmed(&lookup, url_var) else {
        return Ok(None);
    };
    if !is_http_url(&url) {
        return Err(Error::Config(format!(
            "{url_var} must start with http:// or https://"
        )));
    }

    let api_key = optional_trimmed(&lookup, key_var).or_else(|| shared_key.cloned());
    Ok(Some(RemoteEndpoint {
        url: url.trim_end_matches('/').to_string(),
        api_key,
    }))
}

/// Trimmed variable value, `None` when unset or blank.
pub fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

pub fn value_or_default(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}
