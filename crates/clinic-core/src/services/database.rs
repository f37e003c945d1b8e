//! Shared database service wrapper used across the API and CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeDelta};
use tokio::sync::Mutex;

use crate::db::{
    AppointmentStore, ClientStore, Database, LibSqlAppointmentRepository, LibSqlClientRepository,
    LibSqlLeaseRepository, LocalStore,
};
use crate::models::{
    Appointment, AppointmentFilter, AppointmentStatus, Client, ClientFilter, EntityKind,
};
use crate::Result;

/// Thread-safe service for DB and repository operations.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %db_path.display(), "Opening clinic database");
        let db = Database::open(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Backing file, if any.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }
}

#[async_trait]
impl LocalStore<Appointment> for DatabaseService {
    async fn get_by_id(&self, id: &str) -> Result<Option<Appointment>> {
        let db = self.db.lock().await;
        let repo = LibSqlAppointmentRepository::new(db.connection());
        repo.get(id).await
    }

    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>> {
        let db = self.db.lock().await;
        let repo = LibSqlAppointmentRepository::new(db.connection());
        repo.list(filter).await
    }

    async fn upsert(&self, record: &Appointment) -> Result<Appointment> {
        let db = self.db.lock().await;
        let repo = LibSqlAppointmentRepository::new(db.connection());
        repo.upsert(record).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlAppointmentRepository::new(db.connection());
        repo.delete(id).await
    }

    async fn exists_by_id(&self, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlAppointmentRepository::new(db.connection());
        repo.exists(id).await
    }

    async fn insert_new(&self, record: &Appointment) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlAppointmentRepository::new(db.connection());
        repo.insert_new(record).await
    }

    async fn apply_external(&self, current: &Appointment, merged: &Appointment) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlAppointmentRepository::new(db.connection());
        repo.apply_external(current, merged).await
    }

    async fn try_acquire_lease(
        &self,
        holder: &str,
        now: NaiveDateTime,
        ttl: TimeDelta,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlLeaseRepository::new(db.connection());
        repo.try_acquire(EntityKind::Appointment, holder, now, ttl).await
    }

    async fn release_lease(&self, holder: &str) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlLeaseRepository::new(db.connection());
        repo.release(EntityKind::Appointment, holder).await
    }
}

#[async_trait]
impl AppointmentStore for DatabaseService {
    async fn find_by_time_excluding_cancelled(
        &self,
        time: NaiveDateTime,
        excluding_id: Option<&str>,
    ) -> Result<Vec<Appointment>> {
        let db = self.db.lock().await;
        let repo = LibSqlAppointmentRepository::new(db.connection());
        repo.find_by_time_excluding_cancelled(time, excluding_id)
            .await
    }

    async fn count_by_status(&self, status: AppointmentStatus) -> Result<u64> {
        let db = self.db.lock().await;
        let repo = LibSqlAppointmentRepository::new(db.connection());
        repo.count_by_status(status).await
    }
}

#[async_trait]
impl LocalStore<Client> for DatabaseService {
    async fn get_by_id(&self, id: &str) -> Result<Option<Client>> {
        let db = self.db.lock().await;
        let repo = LibSqlClientRepository::new(db.connection());
        repo.get(id).await
    }

    async fn list(&self, filter: &ClientFilter) -> Result<Vec<Client>> {
        let db = self.db.lock().await;
        let repo = LibSqlClientRepository::new(db.connection());
        repo.list(filter).await
    }

    async fn upsert(&self, record: &Client) -> Result<Client> {
        let db = self.db.lock().await;
        let repo = LibSqlClientRepository::new(db.connection());
        repo.upsert(record).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlClientRepository::new(db.connection());
        repo.delete(id).await
    }

    async fn exists_by_id(&self, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlClientRepository::new(db.connection());
        repo.exists(id).await
    }

    async fn insert_new(&self, record: &Client) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlClientRepository::new(db.connection());
        repo.insert_new(record).await
    }

    async fn apply_external(&self, current: &Client, merged: &Client) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlClientRepository::new(db.connection());
        repo.apply_external(current, merged).await
    }

    async fn try_acquire_lease(
        &self,
        holder: &str,
        now: NaiveDateTime,
        ttl: TimeDelta,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlLeaseRepository::new(db.connection());
        repo.try_acquire(EntityKind::Client, holder, now, ttl).await
    }

    async fn release_lease(&self, holder: &str) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlLeaseRepository::new(db.connection());
        repo.release(EntityKind::Client, holder).await
    }
}

#[async_trait]
impl ClientStore for DatabaseService {
    async fn find_by_email(&self, email: &str) -> Result<Option<Client>> {
        let db = self.db.lock().await;
        let repo = LibSqlClientRepository::new(db.connection());
        repo.find_by_email(email).await
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Client>> {
        let db = self.db.lock().await;
        let repo = LibSqlClientRepository::new(db.connection());
        repo.find_by_phone(phone).await
    }
}
