//! Appointment model

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::models::EntityKind;
use crate::sync::{MirroredRecord, SyncRecord};
use crate::util::{normalize_text_option, truncate_to_millis};

/// Maximum stored length of appointment notes, in characters
pub const MAX_NOTES_CHARS: usize = 500;

/// Appointment status. Any status may be replaced by any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub const ALL: [Self; 5] = [
        Self::Scheduled,
        Self::Confirmed,
        Self::Completed,
        Self::Cancelled,
        Self::NoShow,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::Confirmed => "CONFIRMED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::NoShow => "NO_SHOW",
        }
    }

    /// Whether this appointment still holds its time slot.
    pub const fn holds_slot(self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| Error::InvalidInput(format!("Invalid appointment status: {s}")))
    }
}

/// A booked appointment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    /// Unique identifier, immutable once assigned
    pub id: String,
    /// Client reference (not enforced)
    pub client_id: String,
    /// Booked slot; the sole booking key
    pub time: NaiveDateTime,
    /// Free-text notes, owned locally
    pub notes: Option<String>,
    /// Lifecycle status, owned locally
    pub status: AppointmentStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Appointment {
    /// Force the status to `CANCELLED`.
    pub fn cancel(&mut self, now: NaiveDateTime) {
        self.status = AppointmentStatus::Cancelled;
        self.touch(now);
    }

    /// Refresh `updated_at`, never moving it before `created_at`.
    pub fn touch(&mut self, now: NaiveDateTime) {
        self.updated_at = now.max(self.created_at);
    }
}

/// Input for booking a new appointment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    #[serde(default)]
    pub id: Option<String>,
    pub client_id: String,
    pub time: NaiveDateTime,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
}

impl NewAppointment {
    /// Validate shape and build the record to store.
    ///
    /// Generates a UUID v7 id when none was supplied and defaults the status to
    /// `SCHEDULED`.
    pub fn into_appointment(self, now: NaiveDateTime) -> Result<Appointment> {
        let client_id = normalize_text_option(Some(self.client_id))
            .ok_or_else(|| Error::InvalidInput("Client ID is required".to_string()))?;
        let notes = validate_notes(self.notes)?;
        let id = normalize_text_option(self.id).unwrap_or_else(new_record_id);

        Ok(Appointment {
            id,
            client_id,
            time: truncate_to_millis(self.time),
            notes,
            status: self.status.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentUpdate {
    #[serde(default)]
    pub time: Option<NaiveDateTime>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
}

/// Store query for appointments; all set fields must match
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentFilter {
    pub client_id: Option<String>,
    pub status: Option<AppointmentStatus>,
    /// Strictly after this time
    pub after: Option<NaiveDateTime>,
    /// At or after this time
    pub from: Option<NaiveDateTime>,
    /// At or before this time
    pub until: Option<NaiveDateTime>,
}

impl AppointmentFilter {
    /// Appointments on the calendar day of `now`.
    pub fn on_day(now: NaiveDateTime) -> Self {
        let start = now.date().and_time(chrono::NaiveTime::MIN);
        Self {
            from: Some(start),
            until: Some(start + chrono::Duration::days(1) - chrono::Duration::milliseconds(1)),
            ..Self::default()
        }
    }
}

/// Appointment as served by the external feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAppointment {
    pub id: String,
    #[serde(alias = "client_id")]
    pub client_id: String,
    pub time: NaiveDateTime,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
}

/// Body posted when mirroring a local booking to the external feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalAppointmentRequest {
    pub client_id: String,
    pub time: NaiveDateTime,
}

impl SyncRecord for Appointment {
    const KIND: EntityKind = EntityKind::Appointment;

    type Wire = ExternalAppointment;
    type Filter = AppointmentFilter;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_external(wire: Self::Wire, now: NaiveDateTime) -> Self {
        // Oversized feed notes are dropped; the record itself still merges.
        let notes = validate_notes(wire.notes).unwrap_or_else(|error| {
            tracing::warn!(id = %wire.id, %error, "Dropping invalid notes from external appointment");
            None
        });
        Self {
            id: wire.id,
            client_id: wire.client_id,
            time: truncate_to_millis(wire.time),
            notes,
            status: wire.status.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn absorb_external(&mut self, external: &Self, now: NaiveDateTime) -> bool {
        let mut changed = false;
        if self.time != external.time {
            self.time = external.time;
            changed = true;
        }
        if self.client_id != external.client_id {
            self.client_id.clone_from(&external.client_id);
            changed = true;
        }
        if changed {
            self.touch(now);
        }
        changed
    }
}

impl MirroredRecord for Appointment {
    type CreateRequest = ExternalAppointmentRequest;

    fn create_request(&self) -> Self::CreateRequest {
        ExternalAppointmentRequest {
            client_id: self.client_id.clone(),
            time: self.time,
        }
    }
}

/// Generate a fresh record id (UUID v7, time-sortable).
pub fn new_record_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

pub(crate) fn validate_notes(notes: Option<String>) -> Result<Option<String>> {
    let notes = normalize_text_option(notes);
    if let Some(text) = notes.as_deref() {
        if text.chars().count() > MAX_NOTES_CHARS {
            return Err(Error::InvalidInput(format!(
                "Notes must be at most {MAX_NOTES_CHARS} characters"
            )));
        }
    }
    Ok(notes)
}
