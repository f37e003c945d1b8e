//! Reconciliation of local records against the external system of record.

mod engine;
mod scheduler;

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};

use crate::models::EntityKind;

pub use engine::{
    LastReconcile, ReconcileOutcome, ReconcileReport, ReconciliationEngine, SkipReason,
};
pub use scheduler::{ReconcileScheduler, Reconciler, SchedulerHandle};

/// A record kind that can be mirrored from an external source.
///
/// Externally owned fields are merged by [`SyncRecord::absorb_external`];
/// everything else on the local record is left alone.
pub trait SyncRecord: Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    /// Shape served by the external feed
    type Wire: DeserializeOwned + Send + Sync + 'static;
    type Filter: Default + Send + Sync;

    fn id(&self) -> &str;

    /// Build a fresh local record stamped with `now`.
    fn from_external(wire: Self::Wire, now: NaiveDateTime) -> Self;

    /// Copy externally owned fields from `external`. Returns whether anything
    /// changed; `updated_at` only moves when it did.
    fn absorb_external(&mut self, external: &Self, now: NaiveDateTime) -> bool;
}

/// A record kind whose local creates are pushed to the external system.
pub trait MirroredRecord: SyncRecord {
    /// Body posted when mirroring a local create
    type CreateRequest: Serialize + Send;

    fn create_request(&self) -> Self::CreateRequest;
}

/// Serializes local writes to one record kind.
///
/// The booking service and the reconciliation engine for a kind share one
/// lock, so a merge never interleaves with a cancel or update in the same
/// process.
#[derive(Clone, Default)]
pub struct WriteLock(Arc<Mutex<()>>);

impl WriteLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.0.lock().await
    }
}
