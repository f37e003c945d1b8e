use clinic_core::services::Clinic;
use clinic_core::sync::ReconcileOutcome;
use clinic_core::EntityKind;

use crate::commands::common::describe_outcome;
use crate::error::CliError;

/// Run one reconciliation, waiting for any cycle already in progress.
pub async fn run_sync(
    clinic: &Clinic,
    kind: EntityKind,
    as_json: bool,
) -> Result<ReconcileOutcome, CliError> {
    let outcome = clinic.reconciler(kind).reconcile_now().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", describe_outcome(&outcome));
    }
    Ok(outcome)
}
