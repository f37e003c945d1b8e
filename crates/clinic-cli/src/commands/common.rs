use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clinic_core::clock::SystemClock;
use clinic_core::config::ClinicConfig;
use clinic_core::services::{Clinic, DatabaseService};
use clinic_core::sync::ReconcileOutcome;
use clinic_core::{Appointment, Client};

use crate::error::CliError;

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("CLINIC_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("clinic")
        .join("clinic.db")
}

/// Open the store at `path` with remote endpoints taken from the environment.
pub async fn open_clinic(path: &Path) -> Result<Clinic, CliError> {
    let config = ClinicConfig::from_env()?;
    let db = DatabaseService::open_path(path.to_path_buf()).await?;
    Ok(Clinic::new(db, &config, Arc::new(SystemClock))?)
}

pub fn normalize_id(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyId);
    }
    Ok(trimmed.to_string())
}

pub fn normalize_search_query(query: &str) -> Result<String, CliError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptySearchQuery);
    }
    Ok(trimmed.to_string())
}

pub fn format_appointment_lines(appointments: &[Appointment]) -> Vec<String> {
    if appointments.is_empty() {
        return vec!["No appointments found.".to_string()];
    }

    appointments
        .iter()
        .map(|appointment| {
            let notes = appointment
                .notes
                .as_deref()
                .map(|notes| format!("  {notes}"))
                .unwrap_or_default();
            format!(
                "{}  {}  {:<9}  client {}{}",
                appointment.id,
                appointment.time.format("%Y-%m-%d %H:%M"),
                appointment.status.as_str(),
                appointment.client_id,
                notes
            )
        })
        .collect()
}

pub fn format_client_lines(clients: &[Client]) -> Vec<String> {
    if clients.is_empty() {
        return vec!["No clients found.".to_string()];
    }

    clients
        .iter()
        .map(|client| {
            format!(
                "{}  {}  <{}>  {}",
                client.id, client.name, client.email, client.phone
            )
        })
        .collect()
}

pub fn describe_outcome(outcome: &ReconcileOutcome) -> String {
    match outcome {
        ReconcileOutcome::Completed(report) => format!(
            "Reconciled {}: {} inserted, {} updated, {} unchanged, {} failed",
            report.kind.plural(),
            report.inserted,
            report.updated,
            report.unchanged,
            report.failed
        ),
        ReconcileOutcome::Skipped { kind, reason } => {
            format!("Skipped {} reconciliation: {reason}", kind.as_str())
        }
    }
}
