//! # quarry-test
//!
//! Testing utilities for quarry: an in-memory [`TestDatabase`] that counts
//! and records the statements it runs, and assertions built on it for
//! catching N+1 query patterns.

pub mod assert_queries;
pub mod test_database;

pub use assert_queries::{assert_max_queries, assert_num_queries};
pub use test_database::TestDatabase;
