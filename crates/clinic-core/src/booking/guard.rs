//! Slot availability checks.

use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::db::AppointmentStore;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    /// Ids of the live appointments holding the slot
    Conflict(Vec<String>),
}

/// Decides whether a slot may be booked.
///
/// Only exact timestamp equality counts as a clash. The partial unique index
/// on `appointments(time)` enforces the same rule at write time.
#[derive(Clone)]
pub struct ConflictGuard {
    store: Arc<dyn AppointmentStore>,
}

impl ConflictGuard {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    pub async fn check_available(
        &self,
        time: NaiveDateTime,
        excluding_id: Option<&str>,
    ) -> Result<Availability> {
        let holders = self
            .store
            .find_by_time_excluding_cancelled(time, excluding_id)
            .await?;
        if holders.is_empty() {
            Ok(Availability::Available)
        } else {
            Ok(Availability::Conflict(
                holders.into_iter().map(|appointment| appointment.id).collect(),
            ))
        }
    }

    /// Like [`Self::check_available`], but a taken slot is an
    /// [`Error::Conflict`].
    pub async fn ensure_available(
        &self,
        time: NaiveDateTime,
        excluding_id: Option<&str>,
    ) -> Result<()> {
        match self.check_available(time, excluding_id).await? {
            Availability::Available => Ok(()),
            Availability::Conflict(holders) => {
                tracing::info!(%time, ?holders, "Rejected booking for taken slot");
                Err(Error::Conflict(time.to_string()))
            }
        }
    }
}
