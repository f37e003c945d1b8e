use clinic_core::services::Clinic;
use clinic_core::Client;

use crate::commands::common::{format_client_lines, normalize_search_query};
use crate::error::CliError;

pub async fn list_clients(
    clinic: &Clinic,
    search: Option<&str>,
    email: Option<&str>,
) -> Result<Vec<Client>, CliError> {
    if let Some(query) = search {
        let query = normalize_search_query(query)?;
        return Ok(clinic.clients.search_by_name(&query).await?);
    }
    if let Some(email) = email {
        return Ok(clinic.clients.find_by_email(email).await?.into_iter().collect());
    }
    Ok(clinic.clients.list().await?)
}

pub async fn run_clients(
    clinic: &Clinic,
    search: Option<&str>,
    email: Option<&str>,
    as_json: bool,
) -> Result<(), CliError> {
    let clients = list_clients(clinic, search, email).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&clients)?);
    } else {
        for line in format_client_lines(&clients) {
            println!("{line}");
        }
    }
    Ok(())
}
