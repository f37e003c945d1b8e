//! Data models for Clinic

mod appointment;
mod client;
mod kind;

pub(crate) use appointment::validate_notes;
pub use appointment::{
    new_record_id, Appointment, AppointmentFilter, AppointmentStatus, AppointmentUpdate,
    ExternalAppointment, ExternalAppointmentRequest, NewAppointment, MAX_NOTES_CHARS,
};
pub use client::{Client, ClientDetails, ClientFilter, ExternalClient};
pub use kind::EntityKind;
