//! Clinic CLI - administer the local appointment and client store
//!
//! Manual reconciliation, listing, cancelling and deleting records without
//! going through the HTTP API.

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::appointments::{run_appointments, AppointmentQuery};
use crate::commands::cancel::run_cancel;
use crate::commands::clients::run_clients;
use crate::commands::common::{open_clinic, resolve_db_path};
use crate::commands::count::run_count;
use crate::commands::delete::run_delete;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinic=info".parse().expect("valid directive"))
                .add_directive("clinic_core=warn".parse().expect("valid directive")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let clinic = open_clinic(&db_path).await?;

    match cli.command {
        Commands::Sync { kind, json } => {
            run_sync(&clinic, kind, json).await?;
        }
        Commands::Appointments {
            client,
            status,
            upcoming,
            json,
        } => {
            let query = AppointmentQuery {
                client,
                status,
                upcoming,
            };
            run_appointments(&clinic, query, json).await?;
        }
        Commands::Clients {
            search,
            email,
            json,
        } => run_clients(&clinic, search.as_deref(), email.as_deref(), json).await?,
        Commands::Cancel { id } => run_cancel(&clinic, &id).await?,
        Commands::Delete { kind, id } => run_delete(&clinic, kind, &id).await?,
        Commands::Count { status } => {
            run_count(&clinic, status).await?;
        }
    }

    Ok(())
}
