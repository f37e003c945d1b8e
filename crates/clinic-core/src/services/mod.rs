//! Shared service layer.

mod clinic;
mod database;

pub use clinic::{Clinic, Remotes};
pub use database::DatabaseService;
