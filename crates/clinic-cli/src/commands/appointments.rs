use clinic_core::models::{AppointmentFilter, AppointmentStatus};
use clinic_core::services::Clinic;
use clinic_core::Appointment;

use crate::commands::common::format_appointment_lines;
use crate::error::CliError;

pub struct AppointmentQuery {
    pub client: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub upcoming: bool,
}

pub async fn list_appointments(
    clinic: &Clinic,
    query: AppointmentQuery,
) -> Result<Vec<Appointment>, CliError> {
    if query.upcoming {
        return Ok(clinic.appointments.upcoming().await?);
    }

    let appointments = clinic
        .appointments
        .list(&AppointmentFilter {
            client_id: query.client,
            status: query.status,
            ..AppointmentFilter::default()
        })
        .await?;
    Ok(appointments)
}

pub async fn run_appointments(
    clinic: &Clinic,
    query: AppointmentQuery,
    as_json: bool,
) -> Result<(), CliError> {
    let appointments = list_appointments(clinic, query).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&appointments)?);
    } else {
        for line in format_appointment_lines(&appointments) {
            println!("{line}");
        }
    }
    Ok(())
}
