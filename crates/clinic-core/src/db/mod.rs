//! Database layer for Clinic

mod appointment_repository;
mod client_repository;
mod connection;
mod lease_repository;
mod migrations;
mod store;

pub use appointment_repository::LibSqlAppointmentRepository;
pub use client_repository::LibSqlClientRepository;
pub use connection::Database;
pub use lease_repository::LibSqlLeaseRepository;
pub use store::{AppointmentStore, ClientStore, LocalStore};
