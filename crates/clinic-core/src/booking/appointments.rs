//! Appointment lifecycle: booking, rescheduling, cancellation.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::timeout;

use crate::clock::Clock;
use crate::db::AppointmentStore;
use crate::error::{Error, Result};
use crate::models::{
    validate_notes, Appointment, AppointmentFilter, AppointmentStatus, AppointmentUpdate,
    EntityKind, NewAppointment,
};
use crate::remote::ExternalSink;
use crate::sync::WriteLock;
use crate::util::truncate_to_millis;

use super::guard::ConflictGuard;

/// Appointment writes and queries.
///
/// Writes run one at a time under the kind's [`WriteLock`]; the storage index
/// catches anything that slips past from another process.
pub struct AppointmentService {
    store: Arc<dyn AppointmentStore>,
    guard: ConflictGuard,
    remote: Option<Arc<dyn ExternalSink<Appointment>>>,
    clock: Arc<dyn Clock>,
    remote_deadline: Duration,
    writes: WriteLock,
    mirrors: Mutex<JoinSet<()>>,
}

impl AppointmentService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        remote: Option<Arc<dyn ExternalSink<Appointment>>>,
        clock: Arc<dyn Clock>,
        remote_deadline: Duration,
    ) -> Self {
        Self {
            guard: ConflictGuard::new(store.clone()),
            store,
            remote,
            clock,
            remote_deadline,
            writes: WriteLock::new(),
            mirrors: Mutex::new(JoinSet::new()),
        }
    }

    /// Share the write lock used by the appointment reconciliation engine.
    #[must_use]
    pub fn with_write_lock(mut self, writes: WriteLock) -> Self {
        self.writes = writes;
        self
    }

    pub async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>> {
        self.store.list(filter).await
    }

    /// Appointments strictly after now, earliest first.
    pub async fn upcoming(&self) -> Result<Vec<Appointment>> {
        self.store
            .list(&AppointmentFilter {
                after: Some(self.clock.now()),
                ..AppointmentFilter::default()
            })
            .await
    }

    pub async fn today(&self) -> Result<Vec<Appointment>> {
        self.store
            .list(&AppointmentFilter::on_day(self.clock.now()))
            .await
    }

    /// Appointments with `from <= time <= until`.
    pub async fn between(
        &self,
        from: NaiveDateTime,
        until: NaiveDateTime,
    ) -> Result<Vec<Appointment>> {
        if from > until {
            return Err(Error::InvalidInput(
                "Range start must not be after its end".to_string(),
            ));
        }
        self.store
            .list(&AppointmentFilter {
                from: Some(from),
                until: Some(until),
                ..AppointmentFilter::default()
            })
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Appointment> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(EntityKind::Appointment, id))
    }

    pub async fn count_by_status(&self, status: AppointmentStatus) -> Result<u64> {
        self.store.count_by_status(status).await
    }

    /// Book a new appointment. Mirroring to the external source runs in the
    /// background and never delays or fails the booking.
    pub async fn create(&self, input: NewAppointment) -> Result<Appointment> {
        let now = self.clock.now();
        let appointment = input.into_appointment(now)?;
        if appointment.time <= now {
            return Err(Error::InvalidInput(
                "Appointment time must be in the future".to_string(),
            ));
        }

        let stored = {
            let _writes = self.writes.acquire().await;
            if self.store.exists_by_id(&appointment.id).await? {
                return Err(Error::InvalidInput(format!(
                    "Appointment already exists with id: {}",
                    appointment.id
                )));
            }
            if appointment.status.holds_slot() {
                self.guard.ensure_available(appointment.time, None).await?;
            }
            self.store.upsert(&appointment).await?
        };

        tracing::info!(
            id = %stored.id,
            client_id = %stored.client_id,
            time = %stored.time,
            "Appointment booked"
        );
        self.spawn_mirror(stored.clone()).await;
        Ok(stored)
    }

    /// Apply the provided fields. Keeping the current time never conflicts.
    pub async fn update(&self, id: &str, changes: AppointmentUpdate) -> Result<Appointment> {
        let notes = match changes.notes {
            Some(notes) => Some(validate_notes(Some(notes))?),
            None => None,
        };

        let _writes = self.writes.acquire().await;
        let mut appointment = self.get(id).await?;

        if let Some(time) = changes.time {
            appointment.time = truncate_to_millis(time);
        }
        if let Some(notes) = notes {
            appointment.notes = notes;
        }
        if let Some(status) = changes.status {
            appointment.status = status;
        }

        if appointment.status.holds_slot() {
            self.guard
                .ensure_available(appointment.time, Some(&appointment.id))
                .await?;
        }

        appointment.touch(self.clock.now());
        let stored = self.store.upsert(&appointment).await?;
        tracing::info!(id = %stored.id, status = %stored.status, "Appointment updated");
        Ok(stored)
    }

    /// Force `CANCELLED`, releasing the slot.
    pub async fn cancel(&self, id: &str) -> Result<Appointment> {
        let _writes = self.writes.acquire().await;
        let mut appointment = self.get(id).await?;
        appointment.cancel(self.clock.now());
        let stored = self.store.upsert(&appointment).await?;
        tracing::info!(id = %stored.id, "Appointment cancelled");
        Ok(stored)
    }

    /// Remove regardless of status.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let _writes = self.writes.acquire().await;
        if !self.store.delete(id).await? {
            return Err(Error::not_found(EntityKind::Appointment, id));
        }
        tracing::info!(%id, "Appointment deleted");
        Ok(())
    }

    /// Wait for every in-flight mirror call to finish.
    pub async fn wait_for_mirrors(&self) {
        let mut pending = std::mem::take(&mut *self.mirrors.lock().await);
        while let Some(result) = pending.join_next().await {
            if let Err(error) = result {
                tracing::warn!(%error, "Mirror task failed");
            }
        }
    }

    async fn spawn_mirror(&self, appointment: Appointment) {
        let Some(remote) = self.remote.clone() else {
            return;
        };

        let mut mirrors = self.mirrors.lock().await;
        while mirrors.try_join_next().is_some() {}
        mirrors.spawn(mirror(remote, appointment, self.remote_deadline));
    }
}

async fn mirror(
    remote: Arc<dyn ExternalSink<Appointment>>,
    appointment: Appointment,
    deadline: Duration,
) {
    let available = timeout(deadline, remote.is_available())
        .await
        .unwrap_or(false);
    if !available {
        tracing::warn!(id = %appointment.id, "External source unavailable; appointment not mirrored");
        return;
    }

    match timeout(deadline, remote.create(&appointment)).await {
        Ok(Ok(Some(_))) => {
            tracing::info!(id = %appointment.id, "Appointment mirrored to external source");
        }
        Ok(Ok(None)) => {
            tracing::warn!(id = %appointment.id, "External source did not accept appointment");
        }
        Ok(Err(error)) => {
            tracing::warn!(id = %appointment.id, %error, "Failed to mirror appointment");
        }
        Err(_) => {
            tracing::warn!(id = %appointment.id, "Mirroring appointment timed out");
        }
    }
}
