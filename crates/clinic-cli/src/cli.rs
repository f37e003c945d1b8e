use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clinic_core::models::AppointmentStatus;
use clinic_core::EntityKind;

#[derive(Parser)]
#[command(name = "clinic")]
#[command(about = "Administer the local clinic appointment and client records")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile one record kind against its external source
    Sync {
        /// Record kind: appointments or clients
        kind: EntityKind,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List appointments
    Appointments {
        /// Only appointments for this client
        #[arg(long, value_name = "ID")]
        client: Option<String>,
        /// Only appointments with this status
        #[arg(long, value_parser = parse_status)]
        status: Option<AppointmentStatus>,
        /// Only appointments after the current time
        #[arg(long, conflicts_with_all = ["client", "status"])]
        upcoming: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List or search clients
    Clients {
        /// Case-insensitive name fragment
        #[arg(long, value_name = "NAME", conflicts_with = "email")]
        search: Option<String>,
        /// Exact email address
        #[arg(long, value_name = "EMAIL")]
        email: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Cancel an appointment, freeing its slot
    Cancel {
        /// Appointment ID
        id: String,
    },
    /// Delete a local record
    Delete {
        /// Record kind: appointment or client
        kind: EntityKind,
        /// Record ID
        id: String,
    },
    /// Count appointments with a status
    Count {
        /// Status name, case-insensitive
        #[arg(value_parser = parse_status)]
        status: AppointmentStatus,
    },
}

fn parse_status(value: &str) -> Result<AppointmentStatus, String> {
    value.parse().map_err(|error: clinic_core::Error| error.to_string())
}
