use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{NaiveDateTime, Utc};
use clinic_core::models::{
    AppointmentFilter, AppointmentStatus, AppointmentUpdate, ClientDetails, NewAppointment,
};
use clinic_core::services::Clinic;
use clinic_core::sync::{LastReconcile, ReconcileOutcome};
use clinic_core::{Appointment, Client, EntityKind};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    clinic: Clinic,
}

impl AppState {
    pub const fn new(config: Arc<AppConfig>, clinic: Clinic) -> Self {
        Self { config, clinic }
    }
}

pub fn app_router(state: AppState) -> Router {
    let appointments = Router::new()
        .route("/", get(list_appointments).post(create_appointment))
        .route("/upcoming", get(upcoming_appointments))
        .route("/today", get(todays_appointments))
        .route("/range", get(appointments_in_range))
        .route("/client/{client_id}", get(appointments_for_client))
        .route("/status/{status}", get(appointments_with_status))
        .route("/stats/count/{status}", get(count_appointments))
        .route("/sync", post(sync_appointments))
        .route(
            "/{id}",
            get(get_appointment)
                .put(update_appointment)
                .delete(delete_appointment),
        )
        .route("/{id}/cancel", patch(cancel_appointment));

    let clients = Router::new()
        .route("/", get(list_clients).post(create_client))
        .route("/search", get(search_clients))
        .route("/sync", post(sync_clients))
        .route(
            "/{id}",
            get(get_client).put(update_client).delete(delete_client),
        );

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/appointments", appointments)
        .nest("/clients", clients)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    reconciliation: ReconciliationHealth,
}

#[derive(Debug, Serialize)]
struct ReconciliationHealth {
    appointments: Option<LastReconcile>,
    clients: Option<LastReconcile>,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let appointments = state
        .clinic
        .reconciler(EntityKind::Appointment)
        .last_reconcile()
        .await;
    let clients = state
        .clinic
        .reconciler(EntityKind::Client)
        .last_reconcile()
        .await;

    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        reconciliation: ReconciliationHealth {
            appointments,
            clients,
        },
    })
}

// ---------------------------------------------------------------------------
// Appointments
// ---------------------------------------------------------------------------

async fn list_appointments(
    State(state): State<AppState>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let appointments = state
        .clinic
        .appointments
        .list(&AppointmentFilter::default())
        .await?;
    Ok(Json(appointments))
}

async fn upcoming_appointments(
    State(state): State<AppState>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    Ok(Json(state.clinic.appointments.upcoming().await?))
}

async fn todays_appointments(
    State(state): State<AppState>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    Ok(Json(state.clinic.appointments.today().await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RangeQuery {
    start_time: NaiveDateTime,
    end_time: NaiveDateTime,
}

async fn appointments_in_range(
    State(state): State<AppState>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let Query(range) = query?;
    let appointments = state
        .clinic
        .appointments
        .between(range.start_time, range.end_time)
        .await?;
    Ok(Json(appointments))
}

async fn appointments_for_client(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let appointments = state
        .clinic
        .appointments
        .list(&AppointmentFilter {
            client_id: Some(client_id),
            ..AppointmentFilter::default()
        })
        .await?;
    Ok(Json(appointments))
}

async fn appointments_with_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let status: AppointmentStatus = status.parse()?;
    let appointments = state
        .clinic
        .appointments
        .list(&AppointmentFilter {
            status: Some(status),
            ..AppointmentFilter::default()
        })
        .await?;
    Ok(Json(appointments))
}

async fn count_appointments(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> Result<Json<u64>, AppError> {
    let status: AppointmentStatus = status.parse()?;
    Ok(Json(state.clinic.appointments.count_by_status(status).await?))
}

async fn get_appointment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(state.clinic.appointments.get(&id).await?))
}

async fn create_appointment(
    State(state): State<AppState>,
    payload: Result<Json<NewAppointment>, JsonRejection>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let Json(input) = payload?;
    let appointment = state.clinic.appointments.create(input).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

async fn update_appointment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AppointmentUpdate>, JsonRejection>,
) -> Result<Json<Appointment>, AppError> {
    let Json(changes) = payload?;
    Ok(Json(state.clinic.appointments.update(&id, changes).await?))
}

async fn cancel_appointment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(state.clinic.appointments.cancel(&id).await?))
}

async fn delete_appointment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.clinic.appointments.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn sync_appointments(
    State(state): State<AppState>,
) -> Result<Json<SyncResponse>, AppError> {
    manual_sync(&state, EntityKind::Appointment).await
}

// ---------------------------------------------------------------------------
// Clients
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ClientListQuery {
    email: Option<String>,
}

async fn list_clients(
    State(state): State<AppState>,
    query: Result<Query<ClientListQuery>, QueryRejection>,
) -> Result<Json<Vec<Client>>, AppError> {
    let Query(query) = query?;
    let clients = match query.email {
        Some(email) => state
            .clinic
            .clients
            .find_by_email(&email)
            .await?
            .into_iter()
            .collect(),
        None => state.clinic.clients.list().await?,
    };
    Ok(Json(clients))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    name: String,
}

async fn search_clients(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<Vec<Client>>, AppError> {
    let Query(query) = query?;
    Ok(Json(state.clinic.clients.search_by_name(&query.name).await?))
}

async fn get_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Client>, AppError> {
    Ok(Json(state.clinic.clients.get(&id).await?))
}

async fn create_client(
    State(state): State<AppState>,
    payload: Result<Json<ClientDetails>, JsonRejection>,
) -> Result<(StatusCode, Json<Client>), AppError> {
    let Json(details) = payload?;
    let client = state.clinic.clients.create(details).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

async fn update_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ClientDetails>, JsonRejection>,
) -> Result<Json<Client>, AppError> {
    let Json(details) = payload?;
    Ok(Json(state.clinic.clients.update(&id, details).await?))
}

async fn delete_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.clinic.clients.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn sync_clients(State(state): State<AppState>) -> Result<Json<SyncResponse>, AppError> {
    manual_sync(&state, EntityKind::Client).await
}

// ---------------------------------------------------------------------------
// Manual reconciliation
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SyncResponse {
    message: String,
    outcome: ReconcileOutcome,
}

async fn manual_sync(state: &AppState, kind: EntityKind) -> Result<Json<SyncResponse>, AppError> {
    let outcome = state
        .clinic
        .reconciler(kind)
        .reconcile_now()
        .await
        .map_err(|error| AppError::internal(format!("{kind} sync failed: {error}")))?;

    let message = match &outcome {
        ReconcileOutcome::Completed(report) => format!(
            "Sync completed successfully: {} inserted, {} updated",
            report.inserted, report.updated
        ),
        ReconcileOutcome::Skipped { reason, .. } => format!("Sync skipped: {reason}"),
    };
    tracing::info!(%kind, %message, "Manual sync requested");
    Ok(Json(SyncResponse { message, outcome }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use clinic_core::clock::FixedClock;
    use clinic_core::config::ClinicConfig;
    use clinic_core::services::DatabaseService;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn now() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2030, 6, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    async fn router() -> Router {
        let db = DatabaseService::open_in_memory().await.unwrap();
        let clinic_config = ClinicConfig::default();
        let clinic =
            Clinic::new(db, &clinic_config, Arc::new(FixedClock::new(now()))).unwrap();
        let config = Arc::new(AppConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            db_path: ":memory:".into(),
            clinic: clinic_config,
        });
        app_router(AppState::new(config, clinic))
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn healthz_reports_ok() {
        let router = router().await;
        let (status, body) = send(&router, "GET", "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["reconciliation"]["appointments"], Value::Null);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn double_booking_is_a_bad_request_until_cancelled() {
        let router = router().await;
        let booking = json!({"clientId": "c-1", "time": "2030-06-02T09:00:00"});

        let (status, first) = send(&router, "POST", "/appointments", Some(booking.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(first["status"], "SCHEDULED");
        let id = first["id"].as_str().unwrap().to_string();

        let (status, body) = send(&router, "POST", "/appointments", Some(booking.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("already booked"));

        let (status, cancelled) =
            send(&router, "PATCH", &format!("/appointments/{id}/cancel"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cancelled["status"], "CANCELLED");

        let (status, _) = send(&router, "POST", "/appointments", Some(booking)).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, count) =
            send(&router, "GET", "/appointments/stats/count/cancelled", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(count, json!(1));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn past_time_and_malformed_bodies_are_rejected() {
        let router = router().await;
        let (status, _) = send(
            &router,
            "POST",
            "/appointments",
            Some(json!({"clientId": "c-1", "time": "2020-01-01T09:00:00"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &router,
            "POST",
            "/appointments",
            Some(json!({"clientId": "c-1", "time": "2030-06-02T09:00:00", "status": "LATE"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&router, "GET", "/appointments/status/LATE", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_appointment_is_not_found() {
        let router = router().await;
        let (status, _) = send(&router, "GET", "/appointments/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&router, "DELETE", "/appointments/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&router, "PATCH", "/appointments/nope/cancel", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_and_delete_appointment() {
        let router = router().await;
        let (_, created) = send(
            &router,
            "POST",
            "/appointments",
            Some(json!({"clientId": "c-1", "time": "2030-06-02T09:00:00"})),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();

        let (status, updated) = send(
            &router,
            "PUT",
            &format!("/appointments/{id}"),
            Some(json!({"notes": "bring referral", "status": "CONFIRMED"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["notes"], "bring referral");
        assert_eq!(updated["time"], created["time"]);

        let (status, body) = send(&router, "DELETE", &format!("/appointments/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn date_routes_filter_appointments() {
        let router = router().await;
        for time in ["2030-06-01T15:00:00", "2030-06-03T09:00:00"] {
            send(
                &router,
                "POST",
                "/appointments",
                Some(json!({"clientId": "c-1", "time": time})),
            )
            .await;
        }

        let (_, today) = send(&router, "GET", "/appointments/today", None).await;
        assert_eq!(today.as_array().unwrap().len(), 1);
        let (_, upcoming) = send(&router, "GET", "/appointments/upcoming", None).await;
        assert_eq!(upcoming.as_array().unwrap().len(), 2);
        let (_, range) = send(
            &router,
            "GET",
            "/appointments/range?startTime=2030-06-02T00:00:00&endTime=2030-06-04T00:00:00",
            None,
        )
        .await;
        assert_eq!(range.as_array().unwrap().len(), 1);
        let (_, by_client) = send(&router, "GET", "/appointments/client/c-1", None).await;
        assert_eq!(by_client.as_array().unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn duplicate_client_identity_is_a_conflict() {
        let router = router().await;
        let ada = json!({"name": "Ada", "email": "ada@example.com", "phone": "555-0100"});

        let (status, created) = send(&router, "POST", "/clients", Some(ada.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = send(&router, "POST", "/clients", Some(ada)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, found) = send(&router, "GET", "/clients/search?name=ad", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found[0]["id"], created["id"]);

        let (_, by_email) = send(&router, "GET", "/clients?email=ada@example.com", None).await;
        assert_eq!(by_email.as_array().unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn manual_sync_without_remote_is_a_soft_skip() {
        let router = router().await;
        let (status, body) = send(&router, "POST", "/clients/sync", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"]["status"], "skipped");
        assert_eq!(body["outcome"]["reason"], "not_configured");
        assert!(body["message"].as_str().unwrap().starts_with("Sync skipped"));
    }
}
