//! Table schemas.
//!
//! A [`SchemaConfig`] is deserialised from JSON or TOML and compiled once
//! into a [`Catalog`] of [`TableSchema`]s. Compilation validates every
//! column, column set and relation, so configuration errors surface at setup.
//!
//! ```
//! use quarry_db::schema::SchemaConfig;
//!
//! let catalog = SchemaConfig::from_toml_str(r#"
//!     [tables.users]
//!     columns = "id:readonly name:required email"
//!     virtual_columns = { shout = "UPPER(name)" }
//!     column_sets = { brief = "id name" }
//!     relations = { orders = "id => orders.user_id" }
//!
//!     [tables.orders]
//!     columns = "id user_id total"
//! "#).unwrap().compile().unwrap();
//!
//! let users = catalog.table("users").unwrap();
//! assert_eq!(users.identity(), "id");
//! assert_eq!(users.resolve_column_set(Some("@brief shout")).unwrap().len(), 3);
//! assert_eq!(users.relation("orders").unwrap().name, "users.orders");
//! ```

pub mod column_set;
pub mod columns;

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use quarry_core::utils::is_identifier;
use quarry_core::{QuarryError, QuarryResult};

use crate::dialect::Dialect;
use crate::relation::{relation_config, RelationConfig, RelationSpec};
use crate::value::Value;
pub use column_set::{ColumnSetConfig, ColumnSetDelta, ColumnSets, NameList};
pub use columns::{parse_column_token, parse_columns, ColumnSpec, ColumnsConfig};

/// The configuration of one table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableConfig {
    /// The identity column. Defaults to `id`.
    pub id: Option<String>,
    pub columns: ColumnsConfig,
    #[serde(alias = "virtualColumns")]
    pub virtual_columns: BTreeMap<String, String>,
    #[serde(alias = "columnSets")]
    pub column_sets: BTreeMap<String, ColumnSetConfig>,
    pub relations: BTreeMap<String, RelationConfig>,
}

/// The configuration of a whole schema.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaConfig {
    #[serde(default)]
    pub tables: BTreeMap<String, TableConfig>,
}

impl SchemaConfig {
    /// Parses a schema from JSON.
    pub fn from_json_str(json: &str) -> QuarryResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            QuarryError::ConfigurationError(format!("Failed to parse JSON schema: {e}"))
        })
    }

    /// Parses a schema from TOML.
    pub fn from_toml_str(toml_str: &str) -> QuarryResult<Self> {
        toml::from_str(toml_str).map_err(|e| {
            QuarryError::ConfigurationError(format!("Failed to parse TOML schema: {e}"))
        })
    }

    /// Reads a schema file, choosing the format by extension (`.json`,
    /// anything else is read as TOML).
    pub fn from_file(path: impl AsRef<Path>) -> QuarryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    /// Compiles every table.
    pub fn compile(&self) -> QuarryResult<Catalog> {
        let mut catalog = Catalog::new();
        for (name, config) in &self.tables {
            catalog.insert(TableSchema::compile(name, config)?);
        }
        tracing::debug!(tables = catalog.len(), "quarry.schema_compiled");
        Ok(catalog)
    }
}

/// The compiled, immutable schema of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    name: String,
    identity: String,
    columns: Vec<ColumnSpec>,
    column_sets: ColumnSets,
    relations: BTreeMap<String, RelationSpec>,
}

impl TableSchema {
    /// Validates and compiles a table configuration.
    pub fn compile(name: &str, config: &TableConfig) -> QuarryResult<Self> {
        if !is_identifier(name) {
            return Err(QuarryError::ConfigurationError(format!(
                "Invalid table name \"{name}\""
            )));
        }
        let invalid = |message: String| QuarryError::InvalidColumnSpec {
            table: name.to_string(),
            message,
        };

        let mut columns = parse_columns(name, &config.columns)?;
        let virtual_columns = columns::parse_virtual_columns(name, &config.virtual_columns)?;
        for v in &virtual_columns {
            if columns.iter().any(|c| c.name == v.name) {
                return Err(invalid(format!(
                    "Virtual column \"{}\" shadows a real column",
                    v.name
                )));
            }
        }
        columns.extend(virtual_columns);

        let identity = config.id.clone().unwrap_or_else(|| "id".to_string());
        let has_real = columns.iter().any(|c| !c.is_virtual());
        if has_real && !columns.iter().any(|c| !c.is_virtual() && c.name == identity) {
            return Err(invalid(format!(
                "Identity column \"{identity}\" is not declared"
            )));
        }

        let column_sets = ColumnSets::compile(name, &columns, &config.column_sets)?;
        let relations = config
            .relations
            .iter()
            .map(|(relation, cfg)| Ok((relation.clone(), relation_config(name, relation, cfg)?)))
            .collect::<QuarryResult<BTreeMap<_, _>>>()?;

        Ok(Self {
            name: name.to_string(),
            identity,
            columns,
            column_sets,
            relations,
        })
    }

    /// The table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The identity column.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// All columns, real ones first, then virtual ones.
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Looks up a real or virtual column.
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The compiled column sets.
    pub const fn column_sets(&self) -> &ColumnSets {
        &self.column_sets
    }

    /// Resolves a column-set token string to column specs. `None` yields
    /// the default set.
    pub fn resolve_column_set(&self, token: Option<&str>) -> QuarryResult<Vec<&ColumnSpec>> {
        self.column_sets
            .resolve(token)?
            .iter()
            .map(|name| {
                self.column(name).ok_or_else(|| QuarryError::UnknownColumn {
                    table: self.name.clone(),
                    column: name.clone(),
                })
            })
            .collect()
    }

    /// Resolves a column-set token string to rendered select items. A table
    /// without declared columns selects `table.*`.
    pub fn select_list(&self, token: Option<&str>, dialect: Dialect) -> QuarryResult<Vec<String>> {
        let specs = self.resolve_column_set(token)?;
        if specs.is_empty() && token.map_or(true, |t| t.trim().is_empty()) {
            return Ok(vec![format!("{}.*", dialect.quote_ident(&self.name))]);
        }
        Ok(specs.iter().map(|c| c.select_sql(dialect)).collect())
    }

    /// Looks up a relation.
    pub fn relation(&self, name: &str) -> QuarryResult<&RelationSpec> {
        self.relations
            .get(name)
            .ok_or_else(|| QuarryError::UnknownRelation {
                table: self.name.clone(),
                relation: name.to_string(),
            })
    }

    /// All relations, by name.
    pub const fn relations(&self) -> &BTreeMap<String, RelationSpec> {
        &self.relations
    }

    /// Checks values for an insert: every column must be known and
    /// writable, and every required column must be present.
    pub fn check_insert(&self, values: &[(String, Value)]) -> QuarryResult<()> {
        self.check_writable("insert", values)?;
        if let Some(missing) = self
            .columns
            .iter()
            .find(|c| c.required && !values.iter().any(|(name, _)| *name == c.name))
        {
            return Err(QuarryError::ComponentError {
                method: "insert".to_string(),
                message: format!(
                    "Missing required column \"{}\" for insert into the \"{}\" table",
                    missing.name, self.name
                ),
            });
        }
        Ok(())
    }

    /// Checks values for an update: every column must be known and writable.
    pub fn check_update(&self, values: &[(String, Value)]) -> QuarryResult<()> {
        self.check_writable("update", values)
    }

    fn check_writable(&self, method: &str, values: &[(String, Value)]) -> QuarryResult<()> {
        for (name, _) in values {
            let column = self.column(name).ok_or_else(|| QuarryError::UnknownColumn {
                table: self.name.clone(),
                column: name.clone(),
            })?;
            if column.readonly {
                return Err(QuarryError::ComponentError {
                    method: method.to_string(),
                    message: format!(
                        "Cannot {method} read-only column \"{name}\" in the \"{}\" table",
                        self.name
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Compiled table schemas by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    tables: BTreeMap<String, TableSchema>,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a schema, replacing any schema of the same name.
    pub fn insert(&mut self, schema: TableSchema) {
        self.tables.insert(schema.name.clone(), schema);
    }

    /// Looks up a table schema.
    pub fn get(&self, table: &str) -> Option<&TableSchema> {
        self.tables.get(table)
    }

    /// Looks up a table schema, failing for unknown tables.
    pub fn table(&self, table: &str) -> QuarryResult<&TableSchema> {
        self.get(table)
            .ok_or_else(|| QuarryError::ConfigurationError(format!("Unknown table \"{table}\"")))
    }

    /// The table names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// The number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns `true` if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
