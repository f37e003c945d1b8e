pub mod appointments;
pub mod cancel;
pub mod clients;
pub mod common;
pub mod count;
pub mod delete;
pub mod sync;
