//! Integration tests for table wrappers and column sets on SQLite.

use std::sync::Arc;

use quarry_core::{ErrorKind, QuarryError};
use quarry_db::{DbExecutor, QueryBuilder, SchemaConfig, Table, Value};
use quarry_test::{assert_num_queries, TestDatabase};

const PEOPLE: &str = r#"
[tables.people]
columns = "id:readonly given:forename:required family:surname:required email"

[tables.people.virtual_columns]
full_name = "forename || ' ' || surname"

[tables.people.column_sets]
brief = "id given family"
display = "@brief full_name"
contact = { include = "email", exclude = "family" }
"#;

fn pairs(items: &[(&str, Value)]) -> Vec<(String, Value)> {
    items.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
}

async fn people() -> (TestDatabase, Table) {
    let catalog = SchemaConfig::from_toml_str(PEOPLE).unwrap().compile().unwrap();
    let db = TestDatabase::new();
    db.setup_catalog(&catalog).await.unwrap();
    let table = Table::new("people", Arc::new(db.clone()), Arc::new(catalog)).unwrap();
    for (given, family, email) in [
        ("Ada", "Lovelace", "ada@example.com"),
        ("Grace", "Hopper", "grace@example.com"),
        ("Alan", "Turing", "alan@example.com"),
    ] {
        table
            .insert(&pairs(&[
                ("given", Value::from(given)),
                ("family", Value::from(family)),
                ("email", Value::from(email)),
            ]))
            .await
            .unwrap();
    }
    (db, table)
}

#[tokio::test]
async fn test_insert_reports_identity() {
    let (_, table) = people().await;
    let result = table
        .insert(&pairs(&[("given", Value::from("Edsger")), ("family", Value::from("Dijkstra"))]))
        .await
        .unwrap();
    assert_eq!(result.changes, 1);
    assert_eq!(result.id, Some(Value::Int(4)));
}

#[tokio::test]
async fn test_fetch_with_aliases_and_sets() {
    let (_, table) = people().await;
    let ada = table
        .fetch_one(&pairs(&[("family", Value::from("Lovelace"))]), Some("@display"))
        .await
        .unwrap();
    assert_eq!(ada.row().columns(), ["id", "given", "family", "full_name"]);
    assert_eq!(ada.get_as::<String>("full_name").unwrap(), "Ada Lovelace");
    assert!(ada.get("email").is_none());

    let contact = table
        .fetch_one(&pairs(&[("id", Value::Int(2))]), Some("@contact"))
        .await
        .unwrap();
    assert_eq!(contact.row().columns(), ["id", "given", "email"]);
}

#[tokio::test]
async fn test_fetch_all_order_and_in_list() {
    let (_, table) = people().await;
    let rows = table
        .fetch_all(
            &pairs(&[("id", Value::List(vec![Value::Int(1), Value::Int(3)]))]),
            Some("given"),
            Some("surname DESC"),
        )
        .await
        .unwrap();
    let names: Vec<String> = rows.iter().map(|r| r.get_as("given").unwrap()).collect();
    assert_eq!(names, ["Alan", "Ada"]);

    let none = table
        .fetch_all(&pairs(&[("id", Value::List(Vec::new()))]), None, None)
        .await
        .unwrap();
    assert!(none.is_empty());
    let sql = table
        .select_statement(&pairs(&[("id", Value::List(Vec::new()))]), Some("id"), None)
        .unwrap();
    assert!(sql.sql().ends_with("WHERE 1 = 0"));

    assert!(table.fetch_any(&pairs(&[("id", Value::Int(99))]), None).await.unwrap().is_none());
    let err = table.fetch_any(&[], None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataShape);
}

#[tokio::test]
async fn test_update_and_delete() {
    let (db, table) = people().await;
    let result = assert_num_queries(&db, 1, || async {
        table
            .update(
                &pairs(&[("email", Value::from("countess@example.com"))]),
                &pairs(&[("given", Value::from("Ada"))]),
            )
            .await
            .unwrap()
    })
    .await;
    assert_eq!(result.changes, 1);
    let ada = table.fetch_one(&pairs(&[("id", Value::Int(1))]), Some("email")).await.unwrap();
    assert_eq!(ada.get("email"), Some(&Value::from("countess@example.com")));

    let result = table.delete(&pairs(&[("id", Value::Int(2))])).await.unwrap();
    assert_eq!(result.changes, 1);
    assert_eq!(table.fetch_all(&[], None, None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_write_validation_runs_before_sql() {
    let (db, table) = people().await;
    db.reset_query_count();

    let err = table.insert(&pairs(&[("given", Value::from("Solo"))])).await.unwrap_err();
    assert!(err.to_string().contains("family"));

    let err = table
        .update(&pairs(&[("id", Value::Int(7))]), &pairs(&[("id", Value::Int(1))]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("id"));

    let err = table.update(&pairs(&[("full_name", Value::from("x"))]), &[]).await.unwrap_err();
    assert!(matches!(err, QuarryError::ComponentError { .. }));

    let err = table.delete(&pairs(&[("ghost", Value::Null)])).await.unwrap_err();
    assert!(matches!(err, QuarryError::UnknownColumn { .. }));

    assert_eq!(db.query_count(), 0);
}

#[tokio::test]
async fn test_unknown_column_set() {
    let (_, table) = people().await;
    let err = table.fetch_all(&[], Some("@nope"), None).await.unwrap_err();
    assert!(matches!(err, QuarryError::UnknownColumnSet { .. }));
}

#[tokio::test]
async fn test_builder_statement_runs_on_sqlite() {
    let (db, _) = people().await;
    let mut query = QueryBuilder::new(db.dialect());
    query
        .select("forename")
        .unwrap()
        .from("people")
        .unwrap()
        .where_(vec![("surname".to_string(), Value::from("Hopper"))])
        .unwrap();
    let rows = db.fetch(&query.build(), Vec::new()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get::<String>("forename").unwrap(), "Grace");
}
