use clinic_core::models::AppointmentStatus;
use clinic_core::services::Clinic;

use crate::error::CliError;

pub async fn run_count(clinic: &Clinic, status: AppointmentStatus) -> Result<u64, CliError> {
    let count = clinic.appointments.count_by_status(status).await?;
    println!("{count}");
    Ok(count)
}
