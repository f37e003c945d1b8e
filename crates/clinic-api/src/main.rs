mod config;
mod error;
mod routes;

use std::sync::Arc;

use clinic_core::clock::SystemClock;
use clinic_core::services::{Clinic, DatabaseService};
use config::AppConfig;
use routes::{app_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinic_api=info".parse().expect("valid directive"))
                .add_directive("clinic_core=info".parse().expect("valid directive")),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!("Starting clinic-api with config: {:?}", config);

    let db = DatabaseService::open_path(config.db_path.clone()).await?;
    let clinic = Clinic::new(db, &config.clinic, Arc::new(SystemClock))?;
    let scheduler = clinic.scheduler(&config.clinic).start();

    let appointments = clinic.appointments.clone();
    let state = AppState::new(config.clone(), clinic);
    let bind_addr = state.config.bind_addr.clone();
    let router = app_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("clinic-api listening on {}", bind_addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await;
    appointments.wait_for_mirrors().await;
    tracing::info!("clinic-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "Failed to listen for shutdown signal");
    }
}
