//! Merge an external feed into the local store.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;

use crate::clock::Clock;
use crate::db::LocalStore;
use crate::error::{Error, Result};
use crate::models::{new_record_id, EntityKind};
use crate::remote::ExternalSource;

use super::{SyncRecord, WriteLock};

/// How long a crashed holder blocks other processes from reconciling a kind
const LEASE_TTL: TimeDelta = TimeDelta::minutes(15);

/// Re-reads allowed when a record changes between read and write
const MERGE_ATTEMPTS: usize = 3;

/// Counts for one completed reconciliation cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub kind: EntityKind,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Records skipped after a per-record error
    pub failed: usize,
}

impl ReconcileReport {
    const fn empty(kind: EntityKind) -> Self {
        Self {
            kind,
            inserted: 0,
            updated: 0,
            unchanged: 0,
            failed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No external source configured for the kind
    NotConfigured,
    RemoteUnavailable,
    RemoteError(String),
    /// Another cycle for the same kind holds the guard or the lease
    AlreadyRunning,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => f.write_str("no external source is configured"),
            Self::RemoteUnavailable => f.write_str("external source is not available"),
            Self::RemoteError(error) => write!(f, "external source error: {error}"),
            Self::AlreadyRunning => f.write_str("a reconciliation is already running"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Completed(ReconcileReport),
    Skipped { kind: EntityKind, reason: SkipReason },
}

impl ReconcileOutcome {
    pub const fn report(&self) -> Option<&ReconcileReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Skipped { .. } => None,
        }
    }
}

/// Result of the most recent finished cycle, kept for health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastReconcile {
    pub finished_at: NaiveDateTime,
    pub outcome: Option<ReconcileOutcome>,
    pub error: Option<String>,
}

enum Merge {
    Inserted,
    Updated,
    Unchanged,
}

/// Reconciles one record kind.
///
/// At most one cycle per engine runs at a time, and a lease row in the store
/// keeps engines in other processes off the same kind while a cycle runs.
pub struct ReconciliationEngine<R: SyncRecord> {
    store: Arc<dyn LocalStore<R>>,
    source: Option<Arc<dyn ExternalSource<R>>>,
    clock: Arc<dyn Clock>,
    remote_deadline: Duration,
    guard: Mutex<()>,
    writes: WriteLock,
    holder: String,
    last: RwLock<Option<LastReconcile>>,
}

impl<R: SyncRecord> ReconciliationEngine<R> {
    pub fn new(
        store: Arc<dyn LocalStore<R>>,
        source: Option<Arc<dyn ExternalSource<R>>>,
        clock: Arc<dyn Clock>,
        remote_deadline: Duration,
    ) -> Self {
        Self {
            store,
            source,
            clock,
            remote_deadline,
            guard: Mutex::new(()),
            writes: WriteLock::new(),
            holder: new_record_id(),
            last: RwLock::new(None),
        }
    }

    /// Share the write lock used by the booking service for this kind.
    #[must_use]
    pub fn with_write_lock(mut self, writes: WriteLock) -> Self {
        self.writes = writes;
        self
    }

    pub const fn kind(&self) -> EntityKind {
        R::KIND
    }

    /// On-demand cycle. Waits for a running cycle of the same kind to finish.
    pub async fn reconcile_now(&self) -> Result<ReconcileOutcome> {
        let Some(source) = self.source.clone() else {
            return Ok(self.not_configured());
        };

        let _guard = self.guard.lock().await;
        let result = self.leased_cycle(source.as_ref()).await;
        self.remember(&result).await;
        result
    }

    /// Timer-driven cycle. Skips instead of queueing behind a running cycle.
    pub async fn reconcile_scheduled(&self) -> Result<ReconcileOutcome> {
        let Some(source) = self.source.clone() else {
            return Ok(self.not_configured());
        };

        let Ok(_guard) = self.guard.try_lock() else {
            tracing::debug!(kind = %R::KIND, "Reconciliation already running; skipping tick");
            let skipped = Ok(already_running::<R>());
            self.remember(&skipped).await;
            return skipped;
        };
        let result = self.leased_cycle(source.as_ref()).await;
        self.remember(&result).await;
        result
    }

    pub async fn last_reconcile(&self) -> Option<LastReconcile> {
        self.last.read().await.clone()
    }

    fn not_configured(&self) -> ReconcileOutcome {
        tracing::debug!(kind = %R::KIND, "No external source configured");
        ReconcileOutcome::Skipped {
            kind: self.kind(),
            reason: SkipReason::NotConfigured,
        }
    }

    async fn remember(&self, result: &Result<ReconcileOutcome>) {
        let entry = LastReconcile {
            finished_at: self.clock.now(),
            outcome: result.as_ref().ok().cloned(),
            error: result.as_ref().err().map(ToString::to_string),
        };
        *self.last.write().await = Some(entry);
    }

    async fn leased_cycle(&self, source: &dyn ExternalSource<R>) -> Result<ReconcileOutcome> {
        let acquired = self
            .store
            .try_acquire_lease(&self.holder, self.clock.now(), LEASE_TTL)
            .await?;
        if !acquired {
            tracing::info!(kind = %R::KIND, "Reconciliation lease held elsewhere; skipping");
            return Ok(already_running::<R>());
        }

        let result = self.run_cycle(source).await;
        if let Err(error) = self.store.release_lease(&self.holder).await {
            tracing::warn!(kind = %R::KIND, %error, "Failed to release reconciliation lease");
        }
        result
    }

    async fn run_cycle(&self, source: &dyn ExternalSource<R>) -> Result<ReconcileOutcome> {
        let available = timeout(self.remote_deadline, source.is_available())
            .await
            .unwrap_or(false);
        if !available {
            tracing::info!(kind = %R::KIND, "External source unavailable; skipping reconciliation");
            return Ok(ReconcileOutcome::Skipped {
                kind: R::KIND,
                reason: SkipReason::RemoteUnavailable,
            });
        }

        let batch = match timeout(self.remote_deadline, source.fetch_all()).await {
            Ok(Ok(batch)) => batch,
            Ok(Err(error)) => {
                tracing::warn!(kind = %R::KIND, %error, "Failed to fetch external records");
                return Ok(ReconcileOutcome::Skipped {
                    kind: R::KIND,
                    reason: SkipReason::RemoteError(error.to_string()),
                });
            }
            Err(_) => {
                tracing::warn!(
                    kind = %R::KIND,
                    deadline = ?self.remote_deadline,
                    "External fetch timed out"
                );
                return Ok(ReconcileOutcome::Skipped {
                    kind: R::KIND,
                    reason: SkipReason::RemoteError(format!(
                        "fetch timed out after {:?}",
                        self.remote_deadline
                    )),
                });
            }
        };

        let now = self.clock.now();
        let total = batch.len();
        let mut report = ReconcileReport::empty(R::KIND);
        let mut store_failures = 0;
        let mut last_store_error = None;

        for wire in batch {
            let external = R::from_external(wire, now);
            match self.merge(external.clone(), now).await {
                Ok(Merge::Inserted) => report.inserted += 1,
                Ok(Merge::Updated) => report.updated += 1,
                Ok(Merge::Unchanged) => report.unchanged += 1,
                Err(error) => {
                    report.failed += 1;
                    tracing::warn!(
                        kind = %R::KIND,
                        id = external.id(),
                        %error,
                        "Failed to reconcile record"
                    );
                    if error.is_store_failure() {
                        store_failures += 1;
                        last_store_error = Some(error);
                    }
                }
            }
        }

        if total > 0 && store_failures == total {
            if let Some(error) = last_store_error {
                tracing::error!(kind = %R::KIND, %error, "Local store unreachable during reconciliation");
                return Err(error);
            }
        }

        tracing::info!(
            kind = %R::KIND,
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            failed = report.failed,
            "Reconciliation finished"
        );
        Ok(ReconcileOutcome::Completed(report))
    }

    async fn merge(&self, external: R, now: NaiveDateTime) -> Result<Merge> {
        if external.id().trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "external {} without id",
                R::KIND
            )));
        }

        let _writes = self.writes.acquire().await;
        for _ in 0..MERGE_ATTEMPTS {
            match self.store.get_by_id(external.id()).await? {
                None => {
                    if self.store.insert_new(&external).await? {
                        return Ok(Merge::Inserted);
                    }
                }
                Some(current) => {
                    let mut merged = current.clone();
                    if !merged.absorb_external(&external, now) {
                        return Ok(Merge::Unchanged);
                    }
                    if self.store.apply_external(&current, &merged).await? {
                        return Ok(Merge::Updated);
                    }
                }
            }
            tracing::debug!(kind = %R::KIND, id = external.id(), "Record changed during merge; retrying");
        }

        Err(Error::Contended {
            kind: R::KIND,
            id: external.id().to_string(),
        })
    }
}

const fn already_running<R: SyncRecord>() -> ReconcileOutcome {
    ReconcileOutcome::Skipped {
        kind: R::KIND,
        reason: SkipReason::AlreadyRunning,
    }
}
