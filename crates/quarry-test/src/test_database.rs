//! Test database utilities for quarry.
//!
//! Provides [`TestDatabase`], an in-memory SQLite database for tests. It
//! implements [`DbExecutor`] so tables and relations can run against it, and
//! it counts and records every statement.
//!
//! ## Example
//!
//! ```rust,no_run
//! use quarry_test::TestDatabase;
//!
//! async fn example() {
//!     let db = TestDatabase::new();
//!     db.execute_raw("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
//!         .await
//!         .unwrap();
//! }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use quarry_core::QuarryResult;
use quarry_db::dialect::Dialect;
use quarry_db::executor::{DbExecutor, ExecResult};
use quarry_db::row::Row;
use quarry_db::schema::{Catalog, TableSchema};
use quarry_db::value::Value;
use quarry_db_backends::sqlite::SqliteBackend;

/// An in-memory SQLite database for testing.
///
/// Every `TestDatabase::new()` call creates a fresh database. Clones share
/// the database and the counters.
#[derive(Clone)]
pub struct TestDatabase {
    backend: Arc<SqliteBackend>,
    query_count: Arc<AtomicUsize>,
    log: Arc<Mutex<Vec<String>>>,
}

impl std::fmt::Debug for TestDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestDatabase")
            .field("query_count", &self.query_count())
            .finish_non_exhaustive()
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl TestDatabase {
    /// Creates a new in-memory SQLite test database.
    ///
    /// # Panics
    ///
    /// Panics if the in-memory database cannot be created.
    pub fn new() -> Self {
        let backend = SqliteBackend::memory().expect("Failed to create in-memory SQLite database");
        Self {
            backend: Arc::new(backend),
            query_count: Arc::new(AtomicUsize::new(0)),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Creates a table for every schema in `catalog`.
    ///
    /// Columns are untyped; the identity column becomes the
    /// `INTEGER PRIMARY KEY`. Does not count towards the query counter.
    pub async fn setup_catalog(&self, catalog: &Catalog) -> QuarryResult<()> {
        for name in catalog.names() {
            let schema = catalog.table(name)?;
            self.backend
                .execute_batch(&Self::create_table_sql(schema))
                .await?;
        }
        Ok(())
    }

    /// Executes a raw SQL script with no parameters.
    ///
    /// Increments the query counter.
    pub async fn execute_raw(&self, sql: &str) -> QuarryResult<()> {
        self.record(sql);
        self.backend.execute_batch(sql).await
    }

    /// Returns the current query count.
    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::Relaxed)
    }

    /// Resets the query counter and the statement log.
    pub fn reset_query_count(&self) {
        self.query_count.store(0, Ordering::Relaxed);
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// The statements run since the last reset, in order.
    pub fn executed(&self) -> Vec<String> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns a reference to the inner `SqliteBackend`.
    pub fn backend(&self) -> &SqliteBackend {
        &self.backend
    }

    fn record(&self, sql: &str) {
        self.query_count.fetch_add(1, Ordering::Relaxed);
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sql.to_string());
    }

    /// Generates a `CREATE TABLE IF NOT EXISTS` statement for a schema.
    fn create_table_sql(schema: &TableSchema) -> String {
        let dialect = Dialect::SQLite;
        let columns: Vec<String> = schema
            .columns()
            .iter()
            .filter(|c| !c.is_virtual())
            .map(|c| {
                let column = dialect.quote_ident(&c.column);
                if c.name == schema.identity() {
                    format!("{column} INTEGER PRIMARY KEY")
                } else {
                    column
                }
            })
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            dialect.quote_ident(schema.name()),
            columns.join(", ")
        )
    }
}

#[async_trait::async_trait]
impl DbExecutor for TestDatabase {
    fn dialect(&self) -> Dialect {
        Dialect::SQLite
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> QuarryResult<ExecResult> {
        self.record(sql);
        self.backend.execute(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> QuarryResult<Vec<Row>> {
        self.record(sql);
        self.backend.query(sql, params).await
    }
}
