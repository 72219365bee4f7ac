//! Records.
//!
//! A [`Record`] is a row fetched through a [`Table`]. Fields are read with
//! [`get`](Record::get); relations are loaded on first access through
//! [`relation`](Record::relation) and cached on the record.

use std::collections::HashMap;

use tokio::sync::Mutex;

use quarry_core::{QuarryError, QuarryResult};

use crate::relation::{load_relation, RelationValue};
use crate::row::{FromValue, Row};
use crate::table::Table;
use crate::value::Value;

/// A row of a table with lazily loaded relations.
#[derive(Debug)]
pub struct Record {
    table: Table,
    row: Row,
    relations: Mutex<HashMap<String, RelationValue>>,
}

impl Record {
    /// Wraps `row`, fetched from `table`.
    pub fn new(table: Table, row: Row) -> Self {
        Self {
            table,
            row,
            relations: Mutex::new(HashMap::new()),
        }
    }

    /// The table the record belongs to.
    pub const fn table(&self) -> &Table {
        &self.table
    }

    /// The underlying row.
    pub const fn row(&self) -> &Row {
        &self.row
    }

    /// Unwraps the underlying row.
    pub fn into_row(self) -> Row {
        self.row
    }

    /// Returns a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.row.get_value(field)
    }

    /// Returns a field converted to `T`.
    pub fn get_as<T: FromValue>(&self, field: &str) -> QuarryResult<T> {
        let value = self.get(field).ok_or_else(|| QuarryError::UnknownColumn {
            table: self.table.name().to_string(),
            column: field.to_string(),
        })?;
        T::from_value(value)
    }

    /// Returns relation `name`, loading it on first access.
    pub async fn relation(&self, name: &str) -> QuarryResult<RelationValue> {
        let mut cache = self.relations.lock().await;
        if let Some(value) = cache.get(name) {
            return Ok(value.clone());
        }
        let value = self.load(name).await?;
        cache.insert(name.to_string(), value.clone());
        Ok(value)
    }

    /// Loads relation `name` again, replacing any cached value.
    pub async fn reload_relation(&self, name: &str) -> QuarryResult<RelationValue> {
        let mut cache = self.relations.lock().await;
        let value = self.load(name).await?;
        cache.insert(name.to_string(), value.clone());
        Ok(value)
    }

    /// Returns `true` if relation `name` has been loaded.
    pub async fn is_loaded(&self, name: &str) -> bool {
        self.relations.lock().await.contains_key(name)
    }

    async fn load(&self, name: &str) -> QuarryResult<RelationValue> {
        let spec = self.table.schema().relation(name)?;
        load_relation(self.table.db(), self.table.catalog(), &self.row, spec).await
    }
}
