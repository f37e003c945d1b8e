use clinic_core::services::Clinic;

use crate::commands::common::normalize_id;
use crate::error::CliError;

pub async fn run_cancel(clinic: &Clinic, id: &str) -> Result<(), CliError> {
    let id = normalize_id(id)?;
    let appointment = clinic.appointments.cancel(&id).await?;
    println!("{} {}", appointment.id, appointment.status);
    Ok(())
}
