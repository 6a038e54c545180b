//! SQLite record store for published files.
//!
//! Each row tracks one file's metadata and its lifecycle [`Status`]. The
//! store is the single arbiter of which operation owns a status transition:
//! every transition goes through
//! [`Repository::compare_and_set_status`] (or [`Repository::mark_available`]),
//! which is a single conditional `UPDATE` and therefore atomic even with
//! several connections and processes sharing the database.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::models::{FileRecord, NewRecord, Sibling, Status};
pub use crate::repo::{Page, Repository};
