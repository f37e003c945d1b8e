use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use clap::Parser;
use clinic_core::clock::FixedClock;
use clinic_core::config::ClinicConfig;
use clinic_core::models::{AppointmentStatus, ClientDetails, NewAppointment};
use clinic_core::services::{Clinic, DatabaseService, Remotes};
use clinic_core::sync::{ReconcileOutcome, ReconcileReport, SkipReason};
use clinic_core::EntityKind;
use tempfile::TempDir;

use crate::cli::{Cli, Commands};
use crate::commands::appointments::{list_appointments, AppointmentQuery};
use crate::commands::cancel::run_cancel;
use crate::commands::clients::list_clients;
use crate::commands::common::{
    describe_outcome, format_appointment_lines, format_client_lines, normalize_id,
    resolve_db_path,
};
use crate::commands::count::run_count;
use crate::commands::delete::run_delete;
use crate::commands::sync::run_sync;
use crate::error::CliError;

fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2030, 6, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

async fn test_clinic(dir: &TempDir) -> Clinic {
    let db = DatabaseService::open_path(dir.path().join("nested").join("clinic.db"))
        .await
        .unwrap();
    Clinic::with_remotes(
        db,
        Remotes::default(),
        Arc::new(FixedClock::new(at(1, 8))),
        &ClinicConfig::default(),
    )
}

async fn book(clinic: &Clinic, client: &str, time: NaiveDateTime) -> String {
    clinic
        .appointments
        .create(NewAppointment {
            id: None,
            client_id: client.to_string(),
            time,
            notes: None,
            status: None,
        })
        .await
        .unwrap()
        .id
}

#[test]
fn cli_parses_kinds_in_singular_and_plural() {
    let cli = Cli::try_parse_from(["clinic", "sync", "appointments", "--json"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Sync {
            kind: EntityKind::Appointment,
            json: true
        }
    ));

    let cli = Cli::try_parse_from(["clinic", "delete", "client", "c-1"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Delete {
            kind: EntityKind::Client,
            ..
        }
    ));

    assert!(Cli::try_parse_from(["clinic", "sync", "invoices"]).is_err());
}

#[test]
fn cli_parses_status_case_insensitively() {
    let cli = Cli::try_parse_from(["clinic", "count", "cancelled"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Count {
            status: AppointmentStatus::Cancelled
        }
    ));
}

#[test]
fn cli_rejects_upcoming_with_other_filters() {
    assert!(
        Cli::try_parse_from(["clinic", "appointments", "--upcoming", "--client", "c-1"]).is_err()
    );
}

#[test]
fn resolve_db_path_prefers_explicit_path() {
    let explicit = PathBuf::from("/tmp/explicit-clinic.db");
    assert_eq!(resolve_db_path(Some(explicit.clone())), explicit);
}

#[test]
fn normalize_id_trims_and_rejects_blank() {
    assert_eq!(normalize_id("  a-1 ").unwrap(), "a-1");
    assert!(matches!(normalize_id(" \t"), Err(CliError::EmptyId)));
}

#[test]
fn describe_outcome_reports_counts_and_skip_reasons() {
    let completed = ReconcileOutcome::Completed(ReconcileReport {
        kind: EntityKind::Appointment,
        inserted: 2,
        updated: 1,
        unchanged: 4,
        failed: 0,
    });
    assert_eq!(
        describe_outcome(&completed),
        "Reconciled appointments: 2 inserted, 1 updated, 4 unchanged, 0 failed"
    );

    let skipped = ReconcileOutcome::Skipped {
        kind: EntityKind::Client,
        reason: SkipReason::RemoteUnavailable,
    };
    assert_eq!(
        describe_outcome(&skipped),
        "Skipped client reconciliation: external source is not available"
    );
}

#[test]
fn empty_listings_print_placeholders() {
    assert_eq!(format_appointment_lines(&[]), vec!["No appointments found."]);
    assert_eq!(format_client_lines(&[]), vec!["No clients found."]);
}

#[tokio::test(flavor = "multi_thread")]
async fn run_sync_without_remote_is_skipped() {
    let dir = TempDir::new().unwrap();
    let clinic = test_clinic(&dir).await;

    let outcome = run_sync(&clinic, EntityKind::Client, false).await.unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome::Skipped {
            kind: EntityKind::Client,
            reason: SkipReason::NotConfigured
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn run_cancel_frees_the_slot() {
    let dir = TempDir::new().unwrap();
    let clinic = test_clinic(&dir).await;
    let id = book(&clinic, "c-1", at(2, 9)).await;

    run_cancel(&clinic, &format!(" {id} ")).await.unwrap();
    assert_eq!(
        run_count(&clinic, AppointmentStatus::Cancelled).await.unwrap(),
        1
    );

    let rebooked = book(&clinic, "c-2", at(2, 9)).await;
    assert_ne!(rebooked, id);
}

#[tokio::test(flavor = "multi_thread")]
async fn list_appointments_applies_filters() {
    let dir = TempDir::new().unwrap();
    let clinic = test_clinic(&dir).await;
    book(&clinic, "c-1", at(2, 9)).await;
    book(&clinic, "c-2", at(3, 9)).await;

    let for_client = list_appointments(
        &clinic,
        AppointmentQuery {
            client: Some("c-2".to_string()),
            status: None,
            upcoming: false,
        },
    )
    .await
    .unwrap();
    assert_eq!(for_client.len(), 1);
    assert_eq!(for_client[0].time, at(3, 9));

    let upcoming = list_appointments(
        &clinic,
        AppointmentQuery {
            client: None,
            status: None,
            upcoming: true,
        },
    )
    .await
    .unwrap();
    assert_eq!(upcoming.len(), 2);
    assert_eq!(format_appointment_lines(&upcoming).len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn run_delete_removes_records_and_reports_missing_ones() {
    let dir = TempDir::new().unwrap();
    let clinic = test_clinic(&dir).await;
    let id = book(&clinic, "c-1", at(2, 9)).await;

    run_delete(&clinic, EntityKind::Appointment, &id)
        .await
        .unwrap();
    let error = run_delete(&clinic, EntityKind::Appointment, &id)
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        CliError::Core(clinic_core::Error::NotFound { .. })
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn list_clients_searches_by_name_and_email() {
    let dir = TempDir::new().unwrap();
    let clinic = test_clinic(&dir).await;
    for (name, email, phone) in [
        ("Ada Lovelace", "ada@example.com", "555-0100"),
        ("Grace Hopper", "grace@example.com", "555-0101"),
    ] {
        clinic
            .clients
            .create(ClientDetails {
                id: None,
                name: name.to_string(),
                email: email.to_string(),
                phone: phone.to_string(),
            })
            .await
            .unwrap();
    }

    let found = list_clients(&clinic, Some("HOP"), None).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "Grace Hopper");

    let by_email = list_clients(&clinic, None, Some("ada@example.com"))
        .await
        .unwrap();
    assert_eq!(by_email.len(), 1);

    assert_eq!(list_clients(&clinic, None, None).await.unwrap().len(), 2);
    assert!(matches!(
        list_clients(&clinic, Some("  "), None).await,
        Err(CliError::EmptySearchQuery)
    ));
}
