//! Storage abstractions consumed by reconciliation and booking.

use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeDelta};

use crate::error::Result;
use crate::models::{Appointment, AppointmentStatus, Client};
use crate::sync::SyncRecord;

/// Keyed local storage for one record kind.
#[async_trait]
pub trait LocalStore<R: SyncRecord>: Send + Sync {
    async fn get_by_id(&self, id: &str) -> Result<Option<R>>;

    async fn list(&self, filter: &R::Filter) -> Result<Vec<R>>;

    /// Insert or replace by id; returns the stored record.
    async fn upsert(&self, record: &R) -> Result<R>;

    /// Returns `false` when nothing was deleted.
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn exists_by_id(&self, id: &str) -> Result<bool>;

    /// Insert `record` unless its id is already stored.
    async fn insert_new(&self, record: &R) -> Result<bool>;

    /// Write the externally owned fields of `merged`, provided the stored row
    /// still carries the values read in `current`. Locally owned fields are
    /// left as they are. `false` means the row changed or vanished.
    async fn apply_external(&self, current: &R, merged: &R) -> Result<bool>;

    /// Claim the reconciliation lease for this kind. Leases are shared by
    /// every process using the same database.
    async fn try_acquire_lease(
        &self,
        holder: &str,
        now: NaiveDateTime,
        ttl: TimeDelta,
    ) -> Result<bool>;

    async fn release_lease(&self, holder: &str) -> Result<()>;
}

#[async_trait]
pub trait AppointmentStore: LocalStore<Appointment> {
    /// Non-cancelled appointments at exactly `time`, ignoring `excluding_id`.
    async fn find_by_time_excluding_cancelled(
        &self,
        time: NaiveDateTime,
        excluding_id: Option<&str>,
    ) -> Result<Vec<Appointment>>;

    async fn count_by_status(&self, status: AppointmentStatus) -> Result<u64>;
}

#[async_trait]
pub trait ClientStore: LocalStore<Client> {
    async fn find_by_email(&self, email: &str) -> Result<Option<Client>>;

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Client>>;
}
