use clinic_core::services::Clinic;
use clinic_core::EntityKind;

use crate::commands::common::normalize_id;
use crate::error::CliError;

pub async fn run_delete(clinic: &Clinic, kind: EntityKind, id: &str) -> Result<(), CliError> {
    let id = normalize_id(id)?;
    match kind {
        EntityKind::Appointment => clinic.appointments.delete(&id).await?,
        EntityKind::Client => clinic.clients.delete(&id).await?,
    }
    println!("{id}");
    Ok(())
}
