//! Appointment repository implementation

use chrono::NaiveDateTime;
use libsql::{params, Connection, Row, Value};

use crate::error::{Error, Result};
use crate::models::{Appointment, AppointmentFilter, AppointmentStatus};
use crate::util::{from_millis, to_millis};

const SELECT_COLUMNS: &str =
    "SELECT id, client_id, time, notes, status, created_at, updated_at FROM appointments";

/// libSQL-backed appointment table access
pub struct LibSqlAppointmentRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlAppointmentRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: &str) -> Result<Option<Appointment>> {
        let mut rows = self
            .conn
            .query(&format!("{SELECT_COLUMNS} WHERE id = ?"), [id])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(parse_appointment(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn exists(&self, id: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query("SELECT EXISTS(SELECT 1 FROM appointments WHERE id = ?)", [id])
            .await?;
        Ok(match rows.next().await? {
            Some(row) => row.get::<i64>(0)? != 0,
            None => false,
        })
    }

    /// List appointments matching `filter`, earliest slot first.
    pub async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>> {
        let mut clauses = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(client_id) = &filter.client_id {
            clauses.push("client_id = ?");
            values.push(Value::Text(client_id.clone()));
        }
        if let Some(status) = filter.status {
            clauses.push("status = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(after) = filter.after {
            clauses.push("time > ?");
            values.push(Value::Integer(to_millis(after)));
        }
        if let Some(from) = filter.from {
            clauses.push("time >= ?");
            values.push(Value::Integer(to_millis(from)));
        }
        if let Some(until) = filter.until {
            clauses.push("time <= ?");
            values.push(Value::Integer(to_millis(until)));
        }

        let mut sql = SELECT_COLUMNS.to_string();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY time ASC, id ASC");

        let mut rows = self
            .conn
            .query(&sql, libsql::params::params_from_iter(values))
            .await?;
        let mut appointments = Vec::new();
        while let Some(row) = rows.next().await? {
            appointments.push(parse_appointment(&row)?);
        }
        Ok(appointments)
    }

    /// Insert or replace by id.
    ///
    /// A second live appointment in the same slot violates
    /// `idx_appointments_live_slot` and surfaces as [`Error::Conflict`].
    pub async fn upsert(&self, appointment: &Appointment) -> Result<Appointment> {
        self.conn
            .execute(
                "INSERT INTO appointments (id, client_id, time, notes, status, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     client_id = excluded.client_id,
                     time = excluded.time,
                     notes = excluded.notes,
                     status = excluded.status,
                     updated_at = excluded.updated_at",
                params![
                    appointment.id.as_str(),
                    appointment.client_id.as_str(),
                    to_millis(appointment.time),
                    appointment.notes.clone(),
                    appointment.status.as_str(),
                    to_millis(appointment.created_at),
                    to_millis(appointment.updated_at)
                ],
            )
            .await
            .map_err(|error| slot_error(error.into(), appointment.time))?;

        self.get(&appointment.id)
            .await?
            .ok_or_else(|| Error::Database(format!("appointment {} vanished", appointment.id)))
    }

    /// Insert `appointment` unless its id is already stored.
    pub async fn insert_new(&self, appointment: &Appointment) -> Result<bool> {
        let inserted = self
            .conn
            .execute(
                "INSERT INTO appointments (id, client_id, time, notes, status, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO NOTHING",
                params![
                    appointment.id.as_str(),
                    appointment.client_id.as_str(),
                    to_millis(appointment.time),
                    appointment.notes.clone(),
                    appointment.status.as_str(),
                    to_millis(appointment.created_at),
                    to_millis(appointment.updated_at)
                ],
            )
            .await
            .map_err(|error| slot_error(error.into(), appointment.time))?;
        Ok(inserted > 0)
    }

    /// Write the feed-owned columns of `merged`, but only while the row still
    /// holds the client and slot seen in `current`. Notes and status are never
    /// touched. Returns `false` when the row moved on or is gone.
    pub async fn apply_external(&self, current: &Appointment, merged: &Appointment) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE appointments
                 SET client_id = ?, time = ?, updated_at = ?
                 WHERE id = ? AND client_id = ? AND time = ?",
                params![
                    merged.client_id.as_str(),
                    to_millis(merged.time),
                    to_millis(merged.updated_at),
                    current.id.as_str(),
                    current.client_id.as_str(),
                    to_millis(current.time)
                ],
            )
            .await
            .map_err(|error| slot_error(error.into(), merged.time))?;
        Ok(changed > 0)
    }

    /// Returns `false` when no row had this id.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM appointments WHERE id = ?", [id])
            .await?;
        Ok(rows > 0)
    }

    /// Live appointments at exactly `time`, optionally ignoring one id.
    pub async fn find_by_time_excluding_cancelled(
        &self,
        time: NaiveDateTime,
        excluding_id: Option<&str>,
    ) -> Result<Vec<Appointment>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "{SELECT_COLUMNS}
                     WHERE time = ? AND status != 'CANCELLED' AND (? IS NULL OR id != ?)
                     ORDER BY id"
                ),
                params![
                    to_millis(time),
                    excluding_id.map(str::to_string),
                    excluding_id.map(str::to_string)
                ],
            )
            .await?;

        let mut appointments = Vec::new();
        while let Some(row) = rows.next().await? {
            appointments.push(parse_appointment(&row)?);
        }
        Ok(appointments)
    }

    pub async fn count_by_status(&self, status: AppointmentStatus) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM appointments WHERE status = ?",
                [status.as_str()],
            )
            .await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

/// A second live appointment in one slot trips `idx_appointments_live_slot`.
fn slot_error(error: Error, time: NaiveDateTime) -> Error {
    if error.is_unique_violation("appointments.time") {
        Error::Conflict(time.to_string())
    } else {
        error
    }
}

fn parse_appointment(row: &Row) -> Result<Appointment> {
    let status: String = row.get(4)?;
    Ok(Appointment {
        id: row.get(0)?,
        client_id: row.get(1)?,
        time: timestamp(row, 2)?,
        notes: row.get::<Option<String>>(3)?,
        status: status.parse()?,
        created_at: timestamp(row, 5)?,
        updated_at: timestamp(row, 6)?,
    })
}

pub(super) fn timestamp(row: &Row, idx: i32) -> Result<NaiveDateTime> {
    let millis: i64 = row.get(idx)?;
    from_millis(millis).ok_or_else(|| Error::Database(format!("timestamp out of range: {millis}")))
}
