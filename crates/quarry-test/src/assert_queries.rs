//! Query count assertions.
//!
//! [`assert_num_queries`] and [`assert_max_queries`] run an async closure
//! against a [`TestDatabase`] and check how many statements it issued. Lazy
//! relation loading makes N+1 patterns easy to introduce; these pin them down.
//! Both return the closure's output so the assertion can wrap real work.
//!
//! ## Example
//!
//! ```rust,no_run
//! use quarry_test::{assert_num_queries, TestDatabase};
//! use quarry_db::{DbExecutor, Value};
//!
//! async fn example() {
//!     let db = TestDatabase::new();
//!     db.execute_raw("CREATE TABLE t (id INTEGER PRIMARY KEY, val TEXT)")
//!         .await
//!         .unwrap();
//!
//!     let rows = assert_num_queries(&db, 1, || async {
//!         db.query("SELECT * FROM t", &[]).await.unwrap()
//!     })
//!     .await;
//!     assert!(rows.is_empty());
//! }
//! ```

use std::future::Future;

use crate::test_database::TestDatabase;

fn describe(db: &TestDatabase) -> String {
    db.executed()
        .iter()
        .enumerate()
        .map(|(i, sql)| format!("\n  {}. {sql}", i + 1))
        .collect()
}

/// Asserts that exactly `expected_count` statements run during `f`.
///
/// The counter is reset before `f` runs.
///
/// # Panics
///
/// Panics if the count differs; the message lists the statements that ran.
pub async fn assert_num_queries<F, Fut, T>(db: &TestDatabase, expected_count: usize, f: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    db.reset_query_count();
    let output = f().await;
    let actual = db.query_count();
    assert!(
        actual == expected_count,
        "Expected {expected_count} SQL queries, but {actual} were executed:{}",
        describe(db)
    );
    output
}

/// Asserts that at most `max_count` statements run during `f`.
///
/// # Panics
///
/// Panics if more than `max_count` statements run.
pub async fn assert_max_queries<F, Fut, T>(db: &TestDatabase, max_count: usize, f: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    db.reset_query_count();
    let output = f().await;
    let actual = db.query_count();
    assert!(
        actual <= max_count,
        "Expected at most {max_count} SQL queries, but {actual} were executed:{}",
        describe(db)
    );
    output
}
