//! Database executor trait.
//!
//! [`DbExecutor`] is the boundary between quarry and a database driver. The
//! core hands the driver rendered SQL plus positional bindings in emission
//! order; the driver returns result rows, or a change count and optional
//! identity for mutating statements. Connection handling, transactions,
//! and retries all live behind this trait.
//!
//! Backends are implemented in the `quarry-db-backends` crate.

use quarry_core::{QuarryError, QuarryResult};

use crate::builder::Statement;
use crate::dialect::Dialect;
use crate::row::Row;
use crate::value::Value;

/// The outcome of a statement that does not return rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecResult {
    /// Number of rows inserted, updated or deleted.
    pub changes: u64,
    /// Identity of the inserted row, when the driver reports one.
    pub id: Option<Value>,
}

/// Minimal async database executor trait.
///
/// Table wrappers and the relation resolver accept `&dyn DbExecutor`, which
/// backends implement.
#[async_trait::async_trait]
pub trait DbExecutor: Send + Sync {
    /// Returns the dialect statements must be rendered in for this backend.
    fn dialect(&self) -> Dialect;

    /// Runs a SQL statement that does not return rows.
    async fn execute(&self, sql: &str, params: &[Value]) -> QuarryResult<ExecResult>;

    /// Runs a SQL query and returns all result rows.
    async fn query(&self, sql: &str, params: &[Value]) -> QuarryResult<Vec<Row>>;

    /// Runs a SQL query that must return exactly one row.
    ///
    /// Zero or several rows are reported as
    /// [`QuarryError::UnexpectedRowCount`].
    async fn query_one(&self, sql: &str, params: &[Value]) -> QuarryResult<Row> {
        let mut rows = self.query(sql, params).await?;
        if rows.len() == 1 {
            Ok(rows.remove(0))
        } else {
            Err(QuarryError::expected_one(rows.len(), sql))
        }
    }

    /// Runs a SQL query that may return zero or one row.
    async fn query_any(&self, sql: &str, params: &[Value]) -> QuarryResult<Option<Row>> {
        let mut rows = self.query(sql, params).await?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(Some(rows.remove(0))),
            n => Err(QuarryError::UnexpectedRowCount {
                expected: "Zero or one row".to_string(),
                found: n,
                context: sql.to_string(),
            }),
        }
    }

    /// Renders a statement, fills its open placeholders from `values`, and
    /// returns all result rows.
    async fn fetch(&self, statement: &Statement, values: Vec<Value>) -> QuarryResult<Vec<Row>> {
        let params = statement.bind(values)?;
        tracing::debug!(sql = %statement.sql(), params = params.len(), "quarry.fetch");
        self.query(statement.sql(), &params).await
    }

    /// Renders a mutating statement, fills its open placeholders from
    /// `values`, and runs it.
    async fn run(&self, statement: &Statement, values: Vec<Value>) -> QuarryResult<ExecResult> {
        let params = statement.bind(values)?;
        tracing::debug!(sql = %statement.sql(), params = params.len(), "quarry.run");
        self.execute(statement.sql(), &params).await
    }
}
