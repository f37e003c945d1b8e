//! Entity kinds kept in step with the external system of record

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Record type handled by the store, the remote feed and the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Appointment,
    Client,
}

impl EntityKind {
    pub const ALL: [Self; 2] = [Self::Appointment, Self::Client];

    /// Singular lowercase name, used in log fields and error messages.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Appointment => "appointment",
            Self::Client => "client",
        }
    }

    /// Plural name, used for route segments and table names.
    pub const fn plural(self) -> &'static str {
        match self {
            Self::Appointment => "appointments",
            Self::Client => "clients",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "appointment" | "appointments" => Ok(Self::Appointment),
            "client" | "clients" => Ok(Self::Client),
            other => Err(format!("unknown entity kind: {other}")),
        }
    }
}
