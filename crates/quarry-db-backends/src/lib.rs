//! # quarry-db-backends
//!
//! Database drivers implementing [`DbExecutor`](quarry_db::DbExecutor).
//!
//! Supported backends:
//! - `SQLite` (feature `sqlite`)

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;
