//! Write paths for appointments and clients.

mod appointments;
mod clients;
mod guard;

pub use appointments::AppointmentService;
pub use clients::ClientService;
pub use guard::{Availability, ConflictGuard};
