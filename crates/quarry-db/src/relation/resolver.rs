//! Relation resolution.
//!
//! [`resolve_relation`] computes the correlated predicate for a source row;
//! [`load_relation`] runs the query it implies and shapes the result by the
//! relation's kind. Nothing here caches: every call issues a fresh query.

use std::collections::BTreeMap;

use quarry_core::{QuarryError, QuarryResult};

use super::spec::{RelationKind, RelationSpec};
use crate::builder::{split_tokens, BuilderArg, QueryBuilder, Statement};
use crate::executor::DbExecutor;
use crate::row::Row;
use crate::schema::{Catalog, TableSchema};
use crate::value::Value;

/// An entry of a `map` relation: the whole row, or the selected field.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEntry {
    Row(Row),
    Value(Value),
}

/// The loaded value of a relation.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationValue {
    One(Row),
    Any(Option<Row>),
    Many(Vec<Row>),
    Map(BTreeMap<String, MapEntry>),
}

impl RelationValue {
    /// Returns the row of a `one` relation, or the row of a non-empty `any`
    /// relation.
    pub const fn as_row(&self) -> Option<&Row> {
        match self {
            Self::One(row) | Self::Any(Some(row)) => Some(row),
            _ => None,
        }
    }

    /// Returns the rows of a `many` relation.
    pub fn as_rows(&self) -> Option<&[Row]> {
        match self {
            Self::Many(rows) => Some(rows),
            _ => None,
        }
    }

    /// Returns the entries of a `map` relation.
    pub const fn as_map(&self) -> Option<&BTreeMap<String, MapEntry>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }
}

/// What a custom loader receives.
#[derive(Clone, Copy)]
pub struct RelationContext<'a> {
    pub db: &'a dyn DbExecutor,
    pub catalog: &'a Catalog,
    pub row: &'a Row,
    pub spec: &'a RelationSpec,
}

/// A custom relation loader. Replaces predicate computation and querying
/// entirely.
///
/// # Examples
///
/// ```
/// use quarry_core::QuarryResult;
/// use quarry_db::relation::{RelationContext, RelationLoader, RelationValue};
///
/// struct NoFriends;
///
/// #[async_trait::async_trait]
/// impl RelationLoader for NoFriends {
///     async fn load(&self, _ctx: RelationContext<'_>) -> QuarryResult<RelationValue> {
///         Ok(RelationValue::Many(Vec::new()))
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait RelationLoader: Send + Sync {
    /// Loads the relation for `ctx.row`.
    async fn load(&self, ctx: RelationContext<'_>) -> QuarryResult<RelationValue>;
}

/// Computes the correlated predicate: `to = row[from]` followed by the
/// relation's static criteria. Static criteria never replace the
/// correlated key.
///
/// ```
/// use quarry_db::relation::{relation_config, resolve_relation, RelationConfig};
/// use quarry_db::row::Row;
/// use quarry_db::value::Value;
///
/// let spec = relation_config("users", "orders", &RelationConfig::descriptor("id => orders.user_id"))
///     .unwrap();
/// let row = Row::from_pairs([("id", Value::Int(7))]);
/// assert_eq!(
///     resolve_relation(&row, &spec).unwrap(),
///     vec![("user_id".to_string(), Value::Int(7))]
/// );
/// ```
pub fn resolve_relation(row: &Row, spec: &RelationSpec) -> QuarryResult<Vec<(String, Value)>> {
    let key = row
        .get_value(&spec.from)
        .ok_or_else(|| QuarryError::UndefinedKey {
            relation: spec.name.clone(),
            column: spec.from.clone(),
        })?;
    let mut predicate = vec![(spec.to.clone(), key.clone())];
    predicate.extend(
        spec.where_
            .iter()
            .filter(|(column, _)| *column != spec.to)
            .cloned(),
    );
    Ok(predicate)
}

/// Builds the query a relation issues for `predicate`.
///
/// Columns come from the remote table's default set when the catalog knows
/// the table, `*` otherwise. A known table also maps predicate and order
/// columns to their qualified database columns. Only `many` relations are
/// ordered.
pub fn relation_query(
    catalog: &Catalog,
    spec: &RelationSpec,
    predicate: Vec<(String, Value)>,
    dialect: crate::dialect::Dialect,
) -> QuarryResult<Statement> {
    let remote = catalog.get(&spec.table);
    let mut query = QueryBuilder::new(dialect);
    match remote {
        Some(schema) => {
            for column in schema.select_list(None, dialect)? {
                query.select(BuilderArg::raw(column))?;
            }
        }
        None => {
            query.select("*")?;
        }
    }
    query.from(spec.table.as_str())?;
    let predicate = match remote {
        Some(schema) => predicate
            .into_iter()
            .map(|(name, value)| (remote_column(schema, &name), value))
            .collect(),
        None => predicate,
    };
    query.where_(predicate)?;
    if spec.kind == RelationKind::Many {
        if let Some(order) = &spec.order {
            match remote {
                Some(schema) => {
                    let tokens: Vec<String> = split_tokens(order)
                        .iter()
                        .map(|token| remote_column(schema, token))
                        .collect();
                    query.order(tokens.join(" "))?;
                }
                None => {
                    query.order(order)?;
                }
            }
        }
    }
    Ok(query.build())
}

/// `table.column` for a real column of `schema`; anything else as written.
fn remote_column(schema: &TableSchema, name: &str) -> String {
    match schema.column(name) {
        Some(column) if !column.is_virtual() => column.qualified(),
        _ => name.to_string(),
    }
}

/// Loads relation `spec` for `row`.
pub async fn load_relation(
    db: &dyn DbExecutor,
    catalog: &Catalog,
    row: &Row,
    spec: &RelationSpec,
) -> QuarryResult<RelationValue> {
    if let Some(loader) = &spec.load {
        tracing::debug!(relation = %spec.name, "quarry.load_relation.custom");
        return loader
            .load(RelationContext {
                db,
                catalog,
                row,
                spec,
            })
            .await;
    }

    let predicate = resolve_relation(row, spec)?;
    if predicate[0].1.is_null() {
        return match spec.kind {
            RelationKind::One => Err(QuarryError::expected_one(0, &spec.name)),
            RelationKind::Any => Ok(RelationValue::Any(None)),
            RelationKind::Many => Ok(RelationValue::Many(Vec::new())),
            RelationKind::Map => Ok(RelationValue::Map(BTreeMap::new())),
        };
    }

    let statement = relation_query(catalog, spec, predicate, db.dialect())?;
    tracing::debug!(relation = %spec.name, kind = %spec.kind, sql = %statement.sql(), "quarry.load_relation");
    let mut rows = db.fetch(&statement, Vec::new()).await?;

    match spec.kind {
        RelationKind::One => {
            if rows.len() == 1 {
                Ok(RelationValue::One(rows.remove(0)))
            } else {
                Err(QuarryError::expected_one(rows.len(), &spec.name))
            }
        }
        RelationKind::Any => match rows.len() {
            0 => Ok(RelationValue::Any(None)),
            1 => Ok(RelationValue::Any(Some(rows.remove(0)))),
            n => Err(QuarryError::UnexpectedRowCount {
                expected: "Zero or one row".to_string(),
                found: n,
                context: spec.name.clone(),
            }),
        },
        RelationKind::Many => Ok(RelationValue::Many(rows)),
        RelationKind::Map => {
            let key = spec
                .key
                .clone()
                .or_else(|| catalog.get(&spec.table).map(|t| t.identity().to_string()))
                .unwrap_or_else(|| "id".to_string());
            reduce_map(rows, &key, spec.value.as_deref(), &spec.name).map(RelationValue::Map)
        }
    }
}

/// Folds rows into a map keyed by `key`. Later rows overwrite earlier rows
/// with the same key.
pub fn reduce_map(
    rows: Vec<Row>,
    key: &str,
    value: Option<&str>,
    relation: &str,
) -> QuarryResult<BTreeMap<String, MapEntry>> {
    let undefined = |column: &str| QuarryError::UndefinedKey {
        relation: relation.to_string(),
        column: column.to_string(),
    };
    let mut map = BTreeMap::new();
    for row in rows {
        let k = row.get_value(key).ok_or_else(|| undefined(key))?.to_string();
        let entry = match value {
            Some(field) => MapEntry::Value(row.get_value(field).ok_or_else(|| undefined(field))?.clone()),
            None => MapEntry::Row(row),
        };
        map.insert(k, entry);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::executor::ExecResult;
    use crate::relation::{relation_config, RelationConfig};
    use quarry_core::ErrorKind;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Returns canned rows and records every query.
    struct Recorder {
        rows: Vec<Row>,
        seen: Mutex<Vec<(String, Vec<Value>)>>,
    }

    impl Recorder {
        fn new(rows: Vec<Row>) -> Self {
            Self {
                rows,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn queries(&self) -> Vec<(String, Vec<Value>)> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl DbExecutor for Recorder {
        fn dialect(&self) -> Dialect {
            Dialect::SQLite
        }

        async fn execute(&self, _sql: &str, _params: &[Value]) -> QuarryResult<ExecResult> {
            Ok(ExecResult::default())
        }

        async fn query(&self, sql: &str, params: &[Value]) -> QuarryResult<Vec<Row>> {
            self.seen.lock().unwrap().push((sql.to_string(), params.to_vec()));
            Ok(self.rows.clone())
        }
    }

    fn spec(json: serde_json::Value) -> RelationSpec {
        relation_config("users", "rel", &RelationConfig::from_json(json).unwrap()).unwrap()
    }

    fn user(id: i64) -> Row {
        Row::from_pairs([("id", Value::Int(id))])
    }

    fn pair(id: i64, name: &str) -> Row {
        Row::from_pairs([("id", Value::Int(id)), ("name", Value::from(name))])
    }

    #[test]
    fn test_predicate_keeps_correlated_key() {
        let spec = spec(json!({"relation": "id => orders.user_id", "where": {"user_id": 5, "status": "open"}}));
        let predicate = resolve_relation(&user(1), &spec).unwrap();
        assert_eq!(
            predicate,
            vec![
                ("user_id".to_string(), Value::Int(1)),
                ("status".to_string(), Value::from("open")),
            ]
        );
    }

    #[test]
    fn test_predicate_undefined_key() {
        let spec = spec(json!("account_id -> accounts.id"));
        let err = resolve_relation(&user(1), &spec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataShape);
        assert!(err.to_string().contains("account_id"));
    }

    #[tokio::test]
    async fn test_many_orders_and_binds() {
        let db = Recorder::new(vec![pair(2, "b"), pair(3, "c")]);
        let spec = spec(json!({"relation": "id => orders.user_id", "order": "placed DESC"}));
        let value = load_relation(&db, &Catalog::default(), &user(1), &spec).await.unwrap();
        assert_eq!(value.as_rows().unwrap().len(), 2);
        assert_eq!(
            db.queries(),
            vec![(
                "SELECT * FROM \"orders\" WHERE \"user_id\" = ? ORDER BY \"placed\" DESC".to_string(),
                vec![Value::Int(1)]
            )]
        );
    }

    #[tokio::test]
    async fn test_order_ignored_for_one() {
        let db = Recorder::new(vec![pair(1, "a")]);
        let spec = spec(json!({"relation": "id -> profiles.user_id", "order": "id"}));
        let value = load_relation(&db, &Catalog::default(), &user(1), &spec).await.unwrap();
        assert_eq!(value.as_row(), Some(&pair(1, "a")));
        assert!(!db.queries()[0].0.contains("ORDER BY"));
    }

    #[tokio::test]
    async fn test_one_requires_exactly_one() {
        let db = Recorder::new(vec![pair(1, "a"), pair(2, "b")]);
        let spec = spec(json!("id -> profiles.user_id"));
        let err = load_relation(&db, &Catalog::default(), &user(1), &spec).await.unwrap_err();
        assert!(matches!(err, QuarryError::UnexpectedRowCount { found: 2, .. }));
        assert!(err.to_string().contains("users.rel"));

        let db = Recorder::new(vec![]);
        assert!(load_relation(&db, &Catalog::default(), &user(1), &spec).await.is_err());
    }

    #[tokio::test]
    async fn test_any_tolerates_zero() {
        let db = Recorder::new(vec![]);
        let spec = spec(json!("id ~> profiles.user_id"));
        let value = load_relation(&db, &Catalog::default(), &user(1), &spec).await.unwrap();
        assert_eq!(value, RelationValue::Any(None));
    }

    #[tokio::test]
    async fn test_map_last_write_wins() {
        let db = Recorder::new(vec![pair(1, "x"), pair(1, "y")]);
        let spec = spec(json!({"relation": "id #> tags.user_id", "key": "id"}));
        let value = load_relation(&db, &Catalog::default(), &user(1), &spec).await.unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["1"], MapEntry::Row(pair(1, "y")));
    }

    #[tokio::test]
    async fn test_map_value_field() {
        let db = Recorder::new(vec![pair(1, "x"), pair(2, "y")]);
        let spec = spec(json!({"relation": "id #> tags.user_id", "value": "name"}));
        let value = load_relation(&db, &Catalog::default(), &user(1), &spec).await.unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map["2"], MapEntry::Value(Value::from("y")));
        assert!(!db.queries()[0].0.contains("ORDER BY"));
    }

    #[tokio::test]
    async fn test_null_key_short_circuits() {
        let db = Recorder::new(vec![pair(1, "x")]);
        let row = Row::from_pairs([("id", Value::Null)]);
        for (descriptor, expected) in [
            ("id ~> p.user_id", RelationValue::Any(None)),
            ("id => p.user_id", RelationValue::Many(Vec::new())),
            ("id #> p.user_id", RelationValue::Map(BTreeMap::new())),
        ] {
            let value = load_relation(&db, &Catalog::default(), &row, &spec(json!(descriptor)))
                .await
                .unwrap();
            assert_eq!(value, expected);
        }
        let err = load_relation(&db, &Catalog::default(), &row, &spec(json!("id -> p.user_id")))
            .await
            .unwrap_err();
        assert!(matches!(err, QuarryError::UnexpectedRowCount { found: 0, .. }));
        assert!(db.queries().is_empty());
    }

    fn renamed_orders() -> Catalog {
        crate::schema::SchemaConfig::from_json_str(
            r#"{"tables": {
                "users": {"columns": "id"},
                "orders": {
                    "columns": "id owner:user_id total:amount",
                    "virtual_columns": {"doubled": "amount * 2"}
                }
            }}"#,
        )
        .unwrap()
        .compile()
        .unwrap()
    }

    #[test]
    fn test_query_uses_remote_column_names() {
        let catalog = renamed_orders();
        let spec = spec(json!({
            "relation": "id => orders.owner",
            "where": {"total": 5},
            "order": "total DESC, doubled"
        }));
        let predicate = resolve_relation(&user(1), &spec).unwrap();
        let statement = relation_query(&catalog, &spec, predicate, Dialect::PostgreSQL).unwrap();
        assert_eq!(
            statement.sql(),
            "SELECT \"orders\".\"id\", \"orders\".\"user_id\" AS \"owner\", \"orders\".\"amount\" AS \"total\" \
             FROM \"orders\" \
             WHERE \"orders\".\"user_id\" = $1 AND \"orders\".\"amount\" = $2 \
             ORDER BY \"orders\".\"amount\" DESC, \"doubled\""
        );
        assert_eq!(statement.bind(vec![]).unwrap(), vec![Value::Int(1), Value::Int(5)]);
    }

    struct Fixed;

    #[async_trait::async_trait]
    impl RelationLoader for Fixed {
        async fn load(&self, ctx: RelationContext<'_>) -> QuarryResult<RelationValue> {
            let id = ctx.row.get::<i64>("id")?;
            Ok(RelationValue::Many(vec![user(id * 10)]))
        }
    }

    #[tokio::test]
    async fn test_custom_loader_bypasses_query() {
        let db = Recorder::new(vec![]);
        let config = RelationConfig::default().with_loader(Arc::new(Fixed));
        let spec = relation_config("users", "friends", &config).unwrap();
        assert_eq!(spec.kind, RelationKind::Many);
        let value = load_relation(&db, &Catalog::default(), &user(4), &spec).await.unwrap();
        assert_eq!(value, RelationValue::Many(vec![user(40)]));
        assert!(db.queries().is_empty());
    }
}
