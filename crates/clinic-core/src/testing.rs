//! In-crate fakes shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use tokio::sync::Notify;

use crate::db::LocalStore;
use crate::error::{Error, Result};
use crate::models::{Appointment, AppointmentFilter};
use crate::remote::{ExternalSink, ExternalSource};
use crate::sync::{MirroredRecord, SyncRecord};

/// 2030-06-`day` at `hour`:00 UTC.
pub fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2030, 6, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

/// Scripted external feed.
pub struct FakeSource<R: SyncRecord> {
    available: AtomicBool,
    fail_fetch: AtomicBool,
    fail_create: AtomicBool,
    fetch_delay: Mutex<Option<Duration>>,
    create_delay: Mutex<Option<Duration>>,
    batch: Mutex<Vec<R::Wire>>,
    create_reply: Mutex<Option<R::Wire>>,
    fetches: AtomicUsize,
    created: Mutex<Vec<String>>,
}

impl<R: SyncRecord> FakeSource<R>
where
    R::Wire: Clone,
{
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            fail_fetch: AtomicBool::new(false),
            fail_create: AtomicBool::new(false),
            fetch_delay: Mutex::new(None),
            create_delay: Mutex::new(None),
            batch: Mutex::new(Vec::new()),
            create_reply: Mutex::new(None),
            fetches: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn set_batch(&self, batch: Vec<R::Wire>) {
        *self.batch.lock().unwrap() = batch;
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_create_delay(&self, delay: Duration) {
        *self.create_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_create_reply(&self, reply: Option<R::Wire>) {
        *self.create_reply.lock().unwrap() = reply;
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Ids passed to `create`, in call order.
    pub fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl<R: SyncRecord> ExternalSource<R> for FakeSource<R>
where
    R::Wire: Clone,
{
    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn fetch_all(&self) -> Result<Vec<R::Wire>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(Error::Remote("feed returned HTTP 502".to_string()));
        }
        Ok(self.batch.lock().unwrap().clone())
    }
}

#[async_trait]
impl<R: MirroredRecord> ExternalSink<R> for FakeSource<R>
where
    R::Wire: Clone,
{
    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn create(&self, record: &R) -> Result<Option<R::Wire>> {
        let delay = *self.create_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.created.lock().unwrap().push(record.id().to_string());
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Error::Remote("connection reset".to_string()));
        }
        Ok(self.create_reply.lock().unwrap().clone())
    }
}

/// Delegating store that counts writes.
pub struct CountingStore<S> {
    inner: S,
    writes: AtomicUsize,
}

impl<S> CountingStore<S> {
    pub const fn new(inner: S) -> Self {
        Self {
            inner,
            writes: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<R: SyncRecord, S: LocalStore<R>> LocalStore<R> for CountingStore<S> {
    async fn get_by_id(&self, id: &str) -> Result<Option<R>> {
        self.inner.get_by_id(id).await
    }

    async fn list(&self, filter: &R::Filter) -> Result<Vec<R>> {
        self.inner.list(filter).await
    }

    async fn upsert(&self, record: &R) -> Result<R> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert(record).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(id).await
    }

    async fn exists_by_id(&self, id: &str) -> Result<bool> {
        self.inner.exists_by_id(id).await
    }

    async fn insert_new(&self, record: &R) -> Result<bool> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_new(record).await
    }

    async fn apply_external(&self, current: &R, merged: &R) -> Result<bool> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.apply_external(current, merged).await
    }

    async fn try_acquire_lease(
        &self,
        holder: &str,
        now: NaiveDateTime,
        ttl: TimeDelta,
    ) -> Result<bool> {
        self.inner.try_acquire_lease(holder, now, ttl).await
    }

    async fn release_lease(&self, holder: &str) -> Result<()> {
        self.inner.release_lease(holder).await
    }
}

/// Delegating store that parks the first `get_by_id` after `pause_next_read`
/// until `resume` is called, so tests can write between a read and the write
/// that follows it.
pub struct PausingStore<S> {
    inner: S,
    armed: AtomicBool,
    reached: Notify,
    resumed: Notify,
}

impl<S> PausingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(false),
            reached: Notify::new(),
            resumed: Notify::new(),
        }
    }

    pub fn pause_next_read(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Wait until a read is parked.
    pub async fn paused(&self) {
        self.reached.notified().await;
    }

    pub fn resume(&self) {
        self.resumed.notify_one();
    }
}

#[async_trait]
impl<R: SyncRecord, S: LocalStore<R>> LocalStore<R> for PausingStore<S> {
    async fn get_by_id(&self, id: &str) -> Result<Option<R>> {
        let record = self.inner.get_by_id(id).await?;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.reached.notify_one();
            self.resumed.notified().await;
        }
        Ok(record)
    }

    async fn list(&self, filter: &R::Filter) -> Result<Vec<R>> {
        self.inner.list(filter).await
    }

    async fn upsert(&self, record: &R) -> Result<R> {
        self.inner.upsert(record).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.inner.delete(id).await
    }

    async fn exists_by_id(&self, id: &str) -> Result<bool> {
        self.inner.exists_by_id(id).await
    }

    async fn insert_new(&self, record: &R) -> Result<bool> {
        self.inner.insert_new(record).await
    }

    async fn apply_external(&self, current: &R, merged: &R) -> Result<bool> {
        self.inner.apply_external(current, merged).await
    }

    async fn try_acquire_lease(
        &self,
        holder: &str,
        now: NaiveDateTime,
        ttl: TimeDelta,
    ) -> Result<bool> {
        self.inner.try_acquire_lease(holder, now, ttl).await
    }

    async fn release_lease(&self, holder: &str) -> Result<()> {
        self.inner.release_lease(holder).await
    }
}

/// Store whose every call fails as if the database were gone.
pub struct FailingStore;

fn gone() -> Error {
    Error::Database("unable to open database file".to_string())
}

#[async_trait]
impl LocalStore<Appointment> for FailingStore {
    async fn get_by_id(&self, _id: &str) -> Result<Option<Appointment>> {
        Err(gone())
    }

    async fn list(&self, _filter: &AppointmentFilter) -> Result<Vec<Appointment>> {
        Err(gone())
    }

    async fn upsert(&self, _record: &Appointment) -> Result<Appointment> {
        Err(gone())
    }

    async fn delete(&self, _id: &str) -> Result<bool> {
        Err(gone())
    }

    async fn exists_by_id(&self, _id: &str) -> Result<bool> {
        Err(gone())
    }

    async fn insert_new(&self, _record: &Appointment) -> Result<bool> {
        Err(gone())
    }

    async fn apply_external(&self, _current: &Appointment, _merged: &Appointment) -> Result<bool> {
        Err(gone())
    }

    // The lease is granted so cycles reach the per-record writes
    async fn try_acquire_lease(
        &self,
        _holder: &str,
        _now: NaiveDateTime,
        _ttl: TimeDelta,
    ) -> Result<bool> {
        Ok(true)
    }

    async fn release_lease(&self, _holder: &str) -> Result<()> {
        Ok(())
    }
}
