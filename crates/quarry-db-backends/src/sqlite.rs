//! SQLite database backend using `rusqlite`.
//!
//! This module provides the [`SqliteBackend`] which implements
//! [`DbExecutor`] using `rusqlite` wrapped in `tokio::task::spawn_blocking`
//! for async compatibility.
//!
//! Features:
//! - WAL mode and foreign keys enabled on open
//! - In-memory database support via `:memory:` path (great for testing)
//! - Simple `Mutex`-based concurrency control

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use quarry_core::settings::DatabaseSettings;
use quarry_core::utils::is_identifier;
use quarry_core::{QuarryError, QuarryResult};
use quarry_db::dialect::Dialect;
use quarry_db::executor::{DbExecutor, ExecResult};
use quarry_db::row::Row;
use quarry_db::value::Value;

/// A SQLite database backend.
///
/// All operations run via `tokio::task::spawn_blocking` on a single
/// connection guarded by an async mutex.
pub struct SqliteBackend {
    /// The path to the database file (or ":memory:").
    path: PathBuf,
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn db_error(e: impl std::fmt::Display) -> QuarryError {
    QuarryError::DatabaseError(e.to_string())
}

impl SqliteBackend {
    /// Opens a SQLite database at the given path.
    ///
    /// If the path is `:memory:`, an in-memory database is created.
    pub fn open(path: impl Into<PathBuf>) -> QuarryResult<Self> {
        Self::open_with_pragmas(path.into(), &HashMap::new())
    }

    fn open_with_pragmas(path: PathBuf, pragmas: &HashMap<String, String>) -> QuarryResult<Self> {
        let conn = if path.to_str() == Some(":memory:") {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(&path)
        }
        .map_err(|e| QuarryError::OperationalError(format!("SQLite open failed: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| QuarryError::OperationalError(format!("Failed to set pragmas: {e}")))?;

        let mut names: Vec<&String> = pragmas.keys().collect();
        names.sort();
        for name in names {
            let value = &pragmas[name];
            let valid_value = !value.is_empty()
                && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
            if !is_identifier(name) || !valid_value {
                return Err(QuarryError::ConfigurationError(format!(
                    "Invalid SQLite option \"{name}\" = \"{value}\""
                )));
            }
            conn.execute_batch(&format!("PRAGMA {name} = {value};"))
                .map_err(|e| QuarryError::OperationalError(format!("Failed to set PRAGMA {name}: {e}")))?;
        }

        tracing::debug!(path = %path.display(), "quarry.sqlite.open");
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database.
    pub fn memory() -> QuarryResult<Self> {
        Self::open(":memory:")
    }

    /// Opens the database described by the `database` settings block.
    ///
    /// The engine must be `sqlite`; `name` is the file path or `:memory:`.
    /// Each entry of `options` is applied as a `PRAGMA`.
    pub fn from_settings(settings: &DatabaseSettings) -> QuarryResult<Self> {
        if !settings.engine.eq_ignore_ascii_case("sqlite") {
            return Err(QuarryError::ConfigurationError(format!(
                "Unsupported database engine \"{}\" for the SQLite backend",
                settings.engine
            )));
        }
        Self::open_with_pragmas(PathBuf::from(&settings.name), &settings.options)
    }

    /// Returns the database file path.
    pub const fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Runs several `;`-separated statements without parameters, e.g. a
    /// schema script.
    pub async fn execute_batch(&self, sql: &str) -> QuarryResult<()> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || conn.blocking_lock().execute_batch(&sql).map_err(db_error))
            .await
            .map_err(|e| db_error(format!("Task join error: {e}")))?
    }

    /// Binds quarry `Value`s to a `rusqlite` statement.
    fn bind_params(stmt: &mut rusqlite::Statement<'_>, params: &[Value]) -> QuarryResult<()> {
        for (i, param) in params.iter().enumerate() {
            let idx = i + 1;
            match param {
                Value::Null => stmt.raw_bind_parameter(idx, rusqlite::types::Null),
                Value::Bool(b) => stmt.raw_bind_parameter(idx, b),
                Value::Int(v) => stmt.raw_bind_parameter(idx, v),
                Value::Float(v) => stmt.raw_bind_parameter(idx, v),
                Value::String(s) => stmt.raw_bind_parameter(idx, s.as_str()),
                Value::Bytes(b) => stmt.raw_bind_parameter(idx, b.as_slice()),
                Value::Date(d) => stmt.raw_bind_parameter(idx, d.to_string().as_str()),
                Value::DateTime(dt) => stmt.raw_bind_parameter(idx, dt.to_string().as_str()),
                Value::Time(t) => stmt.raw_bind_parameter(idx, t.to_string().as_str()),
                Value::Uuid(u) => stmt.raw_bind_parameter(idx, u.to_string().as_str()),
                Value::Json(j) => stmt.raw_bind_parameter(idx, j.to_string().as_str()),
                Value::List(vals) => {
                    let json = serde_json::to_string(
                        &vals.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    )?;
                    stmt.raw_bind_parameter(idx, json.as_str())
                }
            }
            .map_err(|e| db_error(format!("Bind error: {e}")))?;
        }
        Ok(())
    }

    /// Converts a `rusqlite::Row` to a quarry [`Row`].
    fn convert_row(sqlite_row: &rusqlite::Row<'_>, column_names: &[String]) -> Row {
        let values: Vec<Value> = (0..column_names.len())
            .map(|i| {
                match sqlite_row.get_ref(i).unwrap_or(rusqlite::types::ValueRef::Null) {
                    rusqlite::types::ValueRef::Null => Value::Null,
                    rusqlite::types::ValueRef::Integer(v) => Value::Int(v),
                    rusqlite::types::ValueRef::Real(v) => Value::Float(v),
                    rusqlite::types::ValueRef::Text(b) => {
                        Value::String(String::from_utf8_lossy(b).to_string())
                    }
                    rusqlite::types::ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
                }
            })
            .collect();
        Row::new(column_names.to_vec(), values)
    }
}

fn is_insert(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("insert"))
}

#[async_trait::async_trait]
impl DbExecutor for SqliteBackend {
    fn dialect(&self) -> Dialect {
        Dialect::SQLite
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> QuarryResult<ExecResult> {
        tracing::trace!(sql, params = params.len(), "quarry.sqlite.execute");
        let conn = self.conn.clone();
        let sql = sql.to_string();
        let params = params.to_vec();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(&sql).map_err(db_error)?;
            Self::bind_params(&mut stmt, &params)?;
            let changes = stmt.raw_execute().map_err(db_error)?;
            let id = (is_insert(&sql) && changes > 0).then(|| Value::Int(conn.last_insert_rowid()));
            Ok(ExecResult {
                changes: changes as u64,
                id,
            })
        })
        .await
        .map_err(|e| db_error(format!("Task join error: {e}")))?
    }

    async fn query(&self, sql: &str, params: &[Value]) -> QuarryResult<Vec<Row>> {
        tracing::trace!(sql, params = params.len(), "quarry.sqlite.query");
        let conn = self.conn.clone();
        let sql = sql.to_string();
        let params = params.to_vec();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(&sql).map_err(db_error)?;

            let column_names: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();

            Self::bind_params(&mut stmt, &params)?;

            let mut raw_rows = stmt.raw_query();
            let mut rows = Vec::new();
            while let Some(row) = raw_rows.next().map_err(db_error)? {
                rows.push(Self::convert_row(row, &column_names));
            }
            Ok(rows)
        })
        .await
        .map_err(|e| db_error(format!("Task join error: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::ErrorKind;

    async fn users() -> SqliteBackend {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute_batch(
                "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER);",
            )
            .await
            .unwrap();
        backend
    }

    #[tokio::test]
    async fn test_sqlite_memory_open() {
        let backend = SqliteBackend::memory().unwrap();
        assert_eq!(backend.dialect(), Dialect::SQLite);
        assert_eq!(backend.path().to_str(), Some(":memory:"));
    }

    #[tokio::test]
    async fn test_sqlite_insert_reports_id() {
        let backend = users().await;
        let result = backend
            .execute(
                "INSERT INTO users (name, age) VALUES (?, ?)",
                &[Value::from("Alice"), Value::from(30)],
            )
            .await
            .unwrap();
        assert_eq!(result.changes, 1);
        assert_eq!(result.id, Some(Value::Int(1)));

        let result = backend
            .execute("UPDATE users SET age = ? WHERE id = ?", &[Value::from(31), Value::from(1)])
            .await
            .unwrap();
        assert_eq!(result.changes, 1);
        assert_eq!(result.id, None);
    }

    #[tokio::test]
    async fn test_sqlite_query_converts_values() {
        let backend = users().await;
        backend
            .execute(
                "INSERT INTO users (name, age) VALUES (?, ?)",
                &[Value::from("Bob"), Value::Null],
            )
            .await
            .unwrap();
        let row = backend
            .query_one("SELECT id, name, age FROM users", &[])
            .await
            .unwrap();
        assert_eq!(row.columns(), ["id", "name", "age"]);
        assert_eq!(row.get::<String>("name").unwrap(), "Bob");
        assert_eq!(row.get_value("age"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_sqlite_errors_are_database_kind() {
        let backend = users().await;
        let err = backend.query("SELECT * FROM nope", &[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Database);
    }

    #[test]
    fn test_from_settings() {
        let backend = SqliteBackend::from_settings(&DatabaseSettings::default()).unwrap();
        assert_eq!(backend.path().to_str(), Some(":memory:"));

        let settings = DatabaseSettings {
            engine: "postgres".to_string(),
            ..DatabaseSettings::default()
        };
        let err = SqliteBackend::from_settings(&settings).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_from_settings_applies_options() {
        let mut settings = DatabaseSettings::default();
        settings.options.insert("user_version".to_string(), "7".to_string());
        let backend = SqliteBackend::from_settings(&settings).unwrap();
        let rows = backend.query("PRAGMA user_version", &[]).await.unwrap();
        assert_eq!(rows[0].get::<i64>("user_version").unwrap(), 7);

        settings.options.insert("cache_size".to_string(), "1; DROP TABLE x".to_string());
        let err = SqliteBackend::from_settings(&settings).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_is_insert() {
        assert!(is_insert("  insert into t values (1)"));
        assert!(!is_insert("SELECT 1"));
        assert!(!is_insert("ins"));
    }
}
