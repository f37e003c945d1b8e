//! clinic-core - Core library for Clinic
//!
//! This crate contains the models, libSQL store, reconciliation engine and
//! booking services shared by the API server and the CLI.

pub mod booking;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;
pub mod sync;
pub mod util;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use models::{Appointment, Client, EntityKind};
