//! Error types for clinic-core

use thiserror::Error;

use crate::models::EntityKind;

/// Result type alias using clinic-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in clinic-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found in the local store
    #[error("{kind} not found with id: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Appointment slot already held by a non-cancelled appointment
    #[error("Appointment slot is already booked: {0}")]
    Conflict(String),

    /// Another client already owns this email or phone
    #[error("Client already exists with {field}: {value}")]
    DuplicateIdentity { field: &'static str, value: String },

    /// The record kept changing under a compare-and-set write
    #[error("{kind} {id} kept changing during reconciliation")]
    Contended { kind: EntityKind, id: String },

    /// External source call failed after availability was confirmed
    #[error("External source error: {0}")]
    Remote(String),

    /// Invalid runtime configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Whether this error came from the storage layer rather than from the
    /// record being written.
    pub const fn is_store_failure(&self) -> bool {
        matches!(self, Self::Database(_) | Self::LibSql(_) | Self::Io(_))
    }

    /// Whether the message describes a violated `UNIQUE` constraint on `target`
    /// (for example `appointments.time`).
    pub fn is_unique_violation(&self, target: &str) -> bool {
        let message = self.to_string().to_ascii_lowercase();
        message.contains("unique constraint failed") && message.contains(target)
    }
}
