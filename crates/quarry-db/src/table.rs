//! Table wrappers.
//!
//! A [`Table`] pairs a compiled [`TableSchema`] with an executor and renders
//! the common statements through the query builder. Criteria are ordered
//! `(column, value)` pairs using the column names declared in the schema;
//! aliased columns are translated to their database names.

use std::sync::Arc;

use quarry_core::logging::query_span;
use quarry_core::{QuarryError, QuarryResult};
use tracing::Instrument;

use crate::builder::{BuilderArg, QueryBuilder, Statement};
use crate::executor::{DbExecutor, ExecResult};
use crate::record::Record;
use crate::row::Row;
use crate::schema::{Catalog, TableSchema};
use crate::value::Value;

/// Ordered `(column, value)` criteria. A [`Value::List`] matches any of its
/// items and [`Value::Null`] matches `NULL`.
pub type Criteria = [(String, Value)];

/// A table bound to an executor.
#[derive(Clone)]
pub struct Table {
    schema: Arc<TableSchema>,
    db: Arc<dyn DbExecutor>,
    catalog: Arc<Catalog>,
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.schema.name())
            .field("dialect", &self.db.dialect())
            .finish_non_exhaustive()
    }
}

impl Table {
    /// Binds table `name` from `catalog` to `db`.
    pub fn new(name: &str, db: Arc<dyn DbExecutor>, catalog: Arc<Catalog>) -> QuarryResult<Self> {
        let schema = Arc::new(catalog.table(name)?.clone());
        Ok(Self {
            schema,
            db,
            catalog,
        })
    }

    /// The table name.
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// The compiled schema.
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// The catalog this table belongs to.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The executor.
    pub fn db(&self) -> &dyn DbExecutor {
        self.db.as_ref()
    }

    fn builder(&self) -> QueryBuilder {
        QueryBuilder::new(self.db.dialect())
    }

    /// Translates schema column names to qualified database columns.
    fn columns(&self, pairs: &Criteria, qualify: bool) -> QuarryResult<Vec<(String, Value)>> {
        let no_columns = self.schema.columns().is_empty();
        pairs
            .iter()
            .map(|(name, value)| {
                let column = match self.schema.column(name) {
                    Some(spec) if spec.is_virtual() => {
                        return Err(QuarryError::ComponentError {
                            method: "where".to_string(),
                            message: format!(
                                "Virtual column \"{name}\" cannot be used as a criterion for the \"{}\" table",
                                self.name()
                            ),
                        })
                    }
                    Some(spec) => spec.column.clone(),
                    None if no_columns => name.clone(),
                    None => {
                        return Err(QuarryError::UnknownColumn {
                            table: self.name().to_string(),
                            column: name.clone(),
                        })
                    }
                };
                let column = if qualify {
                    format!("{}.{column}", self.name())
                } else {
                    column
                };
                Ok((column, value.clone()))
            })
            .collect()
    }

    /// Renders the `SELECT` used by the fetch methods.
    pub fn select_statement(
        &self,
        criteria: &Criteria,
        columns: Option<&str>,
        order: Option<&str>,
    ) -> QuarryResult<Statement> {
        let dialect = self.db.dialect();
        let mut query = self.builder();
        for item in self.schema.select_list(columns, dialect)? {
            query.select(BuilderArg::raw(item))?;
        }
        query.from(self.name())?;
        if !criteria.is_empty() {
            query.where_(self.columns(criteria, true)?)?;
        }
        if let Some(order) = order {
            query.order(order)?;
        }
        Ok(query.build())
    }

    /// Fetches exactly one record.
    pub async fn fetch_one(&self, criteria: &Criteria, columns: Option<&str>) -> QuarryResult<Record> {
        let mut rows = self.fetch_rows(criteria, columns, None).await?;
        if rows.len() == 1 {
            Ok(self.record(rows.remove(0)))
        } else {
            Err(QuarryError::expected_one(rows.len(), self.name()))
        }
    }

    /// Fetches zero or one record.
    pub async fn fetch_any(
        &self,
        criteria: &Criteria,
        columns: Option<&str>,
    ) -> QuarryResult<Option<Record>> {
        let mut rows = self.fetch_rows(criteria, columns, None).await?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(Some(self.record(rows.remove(0)))),
            n => Err(QuarryError::UnexpectedRowCount {
                expected: "Zero or one row".to_string(),
                found: n,
                context: self.name().to_string(),
            }),
        }
    }

    /// Fetches all matching records.
    pub async fn fetch_all(
        &self,
        criteria: &Criteria,
        columns: Option<&str>,
        order: Option<&str>,
    ) -> QuarryResult<Vec<Record>> {
        let rows = self.fetch_rows(criteria, columns, order).await?;
        Ok(rows.into_iter().map(|row| self.record(row)).collect())
    }

    async fn fetch_rows(
        &self,
        criteria: &Criteria,
        columns: Option<&str>,
        order: Option<&str>,
    ) -> QuarryResult<Vec<Row>> {
        let statement = self.select_statement(criteria, columns, order)?;
        self.db
            .fetch(&statement, Vec::new())
            .instrument(query_span("select", self.name()))
            .await
    }

    /// Inserts one row. Read-only columns are rejected and required columns
    /// must be present.
    pub async fn insert(&self, values: &Criteria) -> QuarryResult<ExecResult> {
        self.schema.check_insert(values)?;
        let pairs = self.columns(values, false)?;
        let (columns, values): (Vec<Value>, Vec<Value>) = pairs
            .into_iter()
            .map(|(column, value)| (Value::String(column), value))
            .unzip();
        let mut query = self.builder();
        query
            .insert(self.name())?
            .columns(BuilderArg::Array(columns))?
            .values(BuilderArg::Array(values))?;
        self.db.run(&query.build(), Vec::new()).await
    }

    /// Updates matching rows. Read-only columns are rejected.
    pub async fn update(&self, set: &Criteria, criteria: &Criteria) -> QuarryResult<ExecResult> {
        if set.is_empty() {
            return Err(QuarryError::ComponentError {
                method: "update".to_string(),
                message: format!("No columns to update in the \"{}\" table", self.name()),
            });
        }
        self.schema.check_update(set)?;
        let mut query = self.builder();
        query
            .update(self.name())?
            .set(BuilderArg::Object(self.columns(set, false)?))?;
        if !criteria.is_empty() {
            query.where_(self.columns(criteria, false)?)?;
        }
        self.db.run(&query.build(), Vec::new()).await
    }

    /// Deletes matching rows.
    pub async fn delete(&self, criteria: &Criteria) -> QuarryResult<ExecResult> {
        let mut query = self.builder();
        query.delete(self.name())?;
        if !criteria.is_empty() {
            query.where_(self.columns(criteria, false)?)?;
        }
        self.db.run(&query.build(), Vec::new()).await
    }

    /// Wraps a row of this table in a [`Record`].
    pub fn record(&self, row: Row) -> Record {
        Record::new(self.clone(), row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::schema::SchemaConfig;
    use std::sync::Mutex;

    struct Recorder {
        rows: Vec<Row>,
        seen: Mutex<Vec<(String, Vec<Value>)>>,
    }

    #[async_trait::async_trait]
    impl DbExecutor for Recorder {
        fn dialect(&self) -> Dialect {
            Dialect::PostgreSQL
        }

        async fn execute(&self, sql: &str, params: &[Value]) -> QuarryResult<ExecResult> {
            self.seen.lock().unwrap().push((sql.to_string(), params.to_vec()));
            Ok(ExecResult {
                changes: 1,
                id: None,
            })
        }

        async fn query(&self, sql: &str, params: &[Value]) -> QuarryResult<Vec<Row>> {
            self.seen.lock().unwrap().push((sql.to_string(), params.to_vec()));
            Ok(self.rows.clone())
        }
    }

    fn users_table(rows: Vec<Row>) -> (Table, Arc<Recorder>) {
        let catalog = SchemaConfig::from_json_str(
            r#"{"tables": {"users": {
                "columns": "id:readonly login:username:required email",
                "column_sets": {"brief": "id login"}
            }}}"#,
        )
        .unwrap()
        .compile()
        .unwrap();
        let db = Arc::new(Recorder {
            rows,
            seen: Mutex::new(Vec::new()),
        });
        let table = Table::new("users", db.clone(), Arc::new(catalog)).unwrap();
        (table, db)
    }

    fn last(db: &Recorder) -> (String, Vec<Value>) {
        db.seen.lock().unwrap().last().cloned().unwrap()
    }

    fn criteria(pairs: &[(&str, Value)]) -> Vec<(String, Value)> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn test_fetch_all_renders_select() {
        let (table, db) = users_table(vec![]);
        table
            .fetch_all(&criteria(&[("login", Value::from("ada"))]), Some("@brief"), Some("email"))
            .await
            .unwrap();
        assert_eq!(
            last(&db),
            (
                "SELECT \"users\".\"id\", \"users\".\"username\" AS \"login\" FROM \"users\" WHERE \"users\".\"username\" = $1 ORDER BY \"email\"".to_string(),
                vec![Value::from("ada")]
            )
        );
    }

    #[tokio::test]
    async fn test_fetch_one_counts() {
        let (table, _) = users_table(vec![]);
        let err = table.fetch_one(&[], None).await.unwrap_err();
        assert!(err.to_string().starts_with("One row expected, 0 returned"));

        let row = Row::from_pairs([("id", Value::Int(1))]);
        let (table, _) = users_table(vec![row.clone()]);
        assert_eq!(table.fetch_one(&[], None).await.unwrap().row(), &row);
        assert!(table.fetch_any(&[], None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_insert_maps_aliases() {
        let (table, db) = users_table(vec![]);
        table
            .insert(&criteria(&[("login", Value::from("ada")), ("email", Value::from("a@b"))]))
            .await
            .unwrap();
        assert_eq!(
            last(&db),
            (
                "INSERT INTO \"users\" (\"username\", \"email\") VALUES ($1, $2)".to_string(),
                vec![Value::from("ada"), Value::from("a@b")]
            )
        );
    }

    #[tokio::test]
    async fn test_insert_validates() {
        let (table, db) = users_table(vec![]);
        assert!(table.insert(&criteria(&[("email", Value::from("x"))])).await.is_err());
        assert!(table
            .insert(&criteria(&[("id", Value::Int(1)), ("login", Value::from("x"))]))
            .await
            .is_err());
        assert!(db.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (table, db) = users_table(vec![]);
        table
            .update(
                &criteria(&[("email", Value::from("new@b"))]),
                &criteria(&[("id", Value::Int(3))]),
            )
            .await
            .unwrap();
        assert_eq!(
            last(&db),
            (
                "UPDATE \"users\" SET \"email\" = $1 WHERE \"id\" = $2".to_string(),
                vec![Value::from("new@b"), Value::Int(3)]
            )
        );
        assert!(table.update(&[], &[]).await.is_err());

        table.delete(&criteria(&[("id", Value::Int(3))])).await.unwrap();
        assert_eq!(last(&db).0, "DELETE FROM \"users\" WHERE \"id\" = $1");
    }

    #[tokio::test]
    async fn test_unknown_criteria_column() {
        let (table, _) = users_table(vec![]);
        let err = table.delete(&criteria(&[("ghost", Value::Null)])).await.unwrap_err();
        assert!(matches!(err, QuarryError::UnknownColumn { .. }));
    }
}
