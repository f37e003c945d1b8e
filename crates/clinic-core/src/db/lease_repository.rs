//! Reconciliation lease rows

use chrono::{NaiveDateTime, TimeDelta};
use libsql::{params, Connection};

use crate::error::Result;
use crate::models::EntityKind;
use crate::util::to_millis;

/// libSQL-backed lease table access.
///
/// A lease is held by one `holder` per record kind until it is released or
/// its `expires_at` passes, so separate processes sharing one database file
/// never reconcile the same kind at once.
pub struct LibSqlLeaseRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlLeaseRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Take the lease for `kind` unless another holder has an unexpired one.
    pub async fn try_acquire(
        &self,
        kind: EntityKind,
        holder: &str,
        now: NaiveDateTime,
        ttl: TimeDelta,
    ) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "INSERT INTO reconcile_leases (kind, holder, expires_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(kind) DO UPDATE SET
                     holder = excluded.holder,
                     expires_at = excluded.expires_at
                 WHERE reconcile_leases.expires_at <= ?4
                    OR reconcile_leases.holder = excluded.holder",
                params![
                    kind.as_str(),
                    holder,
                    to_millis(now + ttl),
                    to_millis(now)
                ],
            )
            .await?;
        Ok(changed > 0)
    }

    /// Drop the lease if `holder` still owns it.
    pub async fn release(&self, kind: EntityKind, holder: &str) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM reconcile_leases WHERE kind = ? AND holder = ?",
                params![kind.as_str(), holder],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::NaiveDate;

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 6, 1)
            .unwrap()
            .and_hms_opt(8, minute, 0)
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_lease_is_exclusive_until_released() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlLeaseRepository::new(db.connection());
        let ttl = TimeDelta::minutes(10);

        assert!(repo
            .try_acquire(EntityKind::Appointment, "api", at(0), ttl)
            .await
            .unwrap());
        assert!(!repo
            .try_acquire(EntityKind::Appointment, "cli", at(1), ttl)
            .await
            .unwrap());
        // Kinds are leased independently
        assert!(repo
            .try_acquire(EntityKind::Client, "cli", at(1), ttl)
            .await
            .unwrap());

        // Only the holder can release
        repo.release(EntityKind::Appointment, "cli").await.unwrap();
        assert!(!repo
            .try_acquire(EntityKind::Appointment, "cli", at(2), ttl)
            .await
            .unwrap());

        repo.release(EntityKind::Appointment, "api").await.unwrap();
        assert!(repo
            .try_acquire(EntityKind::Appointment, "cli", at(3), ttl)
            .await
            .unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_expired_lease_can_be_taken_over() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlLeaseRepository::new(db.connection());
        let ttl = TimeDelta::minutes(10);

        assert!(repo
            .try_acquire(EntityKind::Client, "crashed", at(0), ttl)
            .await
            .unwrap());
        assert!(!repo
            .try_acquire(EntityKind::Client, "api", at(9), ttl)
            .await
            .unwrap());
        assert!(repo
            .try_acquire(EntityKind::Client, "api", at(10), ttl)
            .await
            .unwrap());
    }
}
