//! Wiring of store, remote feeds, booking services and reconcilers.

use std::sync::Arc;

use crate::booking::{AppointmentService, ClientService};
use crate::clock::Clock;
use crate::config::ClinicConfig;
use crate::models::{Appointment, Client, EntityKind};
use crate::remote::{ExternalSink, ExternalSource, HttpExternalSource};
use crate::sync::{ReconcileScheduler, ReconciliationEngine, Reconciler, SyncRecord, WriteLock};
use crate::Result;

use super::DatabaseService;

/// External endpoints per kind. A `None` side stays local-only.
#[derive(Clone, Default)]
pub struct Remotes {
    pub appointments: Option<Arc<dyn ExternalSource<Appointment>>>,
    /// Receives local appointment creates
    pub appointment_mirror: Option<Arc<dyn ExternalSink<Appointment>>>,
    pub clients: Option<Arc<dyn ExternalSource<Client>>>,
}

impl Remotes {
    /// HTTP feeds for every kind with a configured endpoint.
    pub fn from_config(config: &ClinicConfig) -> Result<Self> {
        let appointments = http_source::<Appointment>(config)?;
        let clients = http_source::<Client>(config)?;
        Ok(Self {
            appointments: appointments
                .clone()
                .map(|source| source as Arc<dyn ExternalSource<Appointment>>),
            appointment_mirror: appointments
                .map(|source| source as Arc<dyn ExternalSink<Appointment>>),
            clients: clients.map(|source| source as Arc<dyn ExternalSource<Client>>),
        })
    }
}

/// Everything the API and CLI need, built once from configuration.
#[derive(Clone)]
pub struct Clinic {
    pub appointments: Arc<AppointmentService>,
    pub clients: Arc<ClientService>,
    appointment_sync: Arc<ReconciliationEngine<Appointment>>,
    client_sync: Arc<ReconciliationEngine<Client>>,
}

impl Clinic {
    pub fn new(db: DatabaseService, config: &ClinicConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self::with_remotes(
            db,
            Remotes::from_config(config)?,
            clock,
            config,
        ))
    }

    /// Build with explicit remotes instead of the configured HTTP ones.
    pub fn with_remotes(
        db: DatabaseService,
        remotes: Remotes,
        clock: Arc<dyn Clock>,
        config: &ClinicConfig,
    ) -> Self {
        let store = Arc::new(db);
        let appointment_writes = WriteLock::new();
        let client_writes = WriteLock::new();

        let appointments = Arc::new(
            AppointmentService::new(
                store.clone(),
                remotes.appointment_mirror,
                clock.clone(),
                config.remote_timeout,
            )
            .with_write_lock(appointment_writes.clone()),
        );
        let clients = Arc::new(
            ClientService::new(store.clone(), clock.clone())
                .with_write_lock(client_writes.clone()),
        );
        let appointment_sync = Arc::new(
            ReconciliationEngine::<Appointment>::new(
                store.clone(),
                remotes.appointments,
                clock.clone(),
                config.remote_timeout,
            )
            .with_write_lock(appointment_writes),
        );
        let client_sync = Arc::new(
            ReconciliationEngine::<Client>::new(store, remotes.clients, clock, config.remote_timeout)
                .with_write_lock(client_writes),
        );

        Self {
            appointments,
            clients,
            appointment_sync,
            client_sync,
        }
    }

    pub fn reconciler(&self, kind: EntityKind) -> Arc<dyn Reconciler> {
        match kind {
            EntityKind::Appointment => self.appointment_sync.clone(),
            EntityKind::Client => self.client_sync.clone(),
        }
    }

    /// A scheduler covering every kind, not yet started.
    pub fn scheduler(&self, config: &ClinicConfig) -> ReconcileScheduler {
        EntityKind::ALL
            .into_iter()
            .fold(ReconcileScheduler::new(config.sync_interval), |scheduler, kind| {
                scheduler.with(self.reconciler(kind))
            })
    }
}

fn http_source<R: SyncRecord>(
    config: &ClinicConfig,
) -> Result<Option<Arc<HttpExternalSource<R>>>> {
    let Some(endpoint) = config.remote(R::KIND) else {
        tracing::info!(kind = %R::KIND, "No external source configured");
        return Ok(None);
    };
    let source = HttpExternalSource::<R>::new(endpoint, config.remote_timeout)?;
    tracing::info!(kind = %R::KIND, url = source.url(), "External source configured");
    Ok(Some(Arc::new(source)))
}
