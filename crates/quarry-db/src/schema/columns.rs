//! Column specifications.
//!
//! Columns are declared either as a compact string of whitespace separated
//! `name(:flag)*` tokens or as a list whose items are compact tokens or
//! detailed objects.
//!
//! | flag | meaning |
//! |---|---|
//! | `readonly` | rejected by inserts and updates |
//! | `required` | must be supplied on insert |
//! | `key=value` | opaque tag |
//! | any other identifier | the underlying database column the name maps to |
//!
//! ```
//! use quarry_db::schema::columns::parse_column_token;
//!
//! let spec = parse_column_token("users", "user_id:readonly:id").unwrap();
//! assert_eq!(spec.name, "user_id");
//! assert_eq!(spec.column, "id");
//! assert!(spec.readonly);
//! ```

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use quarry_core::utils::is_identifier;
use quarry_core::{QuarryError, QuarryResult};

use crate::dialect::Dialect;

/// Metadata for one real or virtual column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// The name the column is known by in rows and column sets.
    pub name: String,
    /// The underlying database column. Equal to `name` unless aliased.
    pub column: String,
    /// The owning table.
    pub table: String,
    /// Rejected by inserts and updates.
    pub readonly: bool,
    /// Must be supplied on insert.
    pub required: bool,
    /// Unrecognised `key=value` flags.
    pub tags: BTreeMap<String, String>,
    /// Raw SQL expression for virtual columns.
    pub expression: Option<String>,
}

impl ColumnSpec {
    /// Creates a plain column.
    pub fn new(table: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            column: name.clone(),
            name,
            table: table.into(),
            readonly: false,
            required: false,
            tags: BTreeMap::new(),
            expression: None,
        }
    }

    /// Creates a virtual column backed by an SQL expression. Virtual columns
    /// are always read-only.
    pub fn virtual_column(
        table: impl Into<String>,
        name: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            readonly: true,
            expression: Some(expression.into()),
            ..Self::new(table, name)
        }
    }

    /// Returns `true` for virtual columns.
    pub const fn is_virtual(&self) -> bool {
        self.expression.is_some()
    }

    /// Returns `table.column`.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.table, self.column)
    }

    /// Renders the column for a select list.
    ///
    /// ```
    /// use quarry_db::dialect::Dialect;
    /// use quarry_db::schema::columns::ColumnSpec;
    ///
    /// let d = Dialect::SQLite;
    /// assert_eq!(ColumnSpec::new("users", "email").select_sql(d), "\"users\".\"email\"");
    /// assert_eq!(
    ///     ColumnSpec::virtual_column("users", "n", "COUNT(*)").select_sql(d),
    ///     "COUNT(*) AS \"n\""
    /// );
    /// ```
    pub fn select_sql(&self, dialect: Dialect) -> String {
        if let Some(expression) = &self.expression {
            return format!("{expression} AS {}", dialect.quote_ident(&self.name));
        }
        let qualified = format!(
            "{}.{}",
            dialect.quote_ident(&self.table),
            dialect.quote_ident(&self.column)
        );
        if self.column == self.name {
            qualified
        } else {
            format!("{qualified} AS {}", dialect.quote_ident(&self.name))
        }
    }
}

/// Column declarations as they appear in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnsConfig {
    /// `"id name:required email"`
    Compact(String),
    /// A list of compact tokens or detailed entries.
    List(Vec<ColumnEntry>),
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

/// One entry of a column list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnEntry {
    /// A single compact token, e.g. `"email:required"`.
    Compact(String),
    /// An explicit column description.
    Detail(ColumnDetail),
}

/// An explicit column description.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnDetail {
    pub name: String,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Parses a table's column declarations, rejecting duplicate names.
pub fn parse_columns(table: &str, config: &ColumnsConfig) -> QuarryResult<Vec<ColumnSpec>> {
    let specs = match config {
        ColumnsConfig::Compact(s) => s
            .split_whitespace()
            .map(|token| parse_column_token(table, token))
            .collect::<QuarryResult<Vec<_>>>()?,
        ColumnsConfig::List(entries) => entries
            .iter()
            .map(|entry| match entry {
                ColumnEntry::Compact(token) => parse_column_token(table, token.trim()),
                ColumnEntry::Detail(detail) => from_detail(table, detail),
            })
            .collect::<QuarryResult<Vec<_>>>()?,
    };

    let mut seen = HashSet::new();
    for spec in &specs {
        if !seen.insert(spec.name.as_str()) {
            return Err(QuarryError::InvalidColumnSpec {
                table: table.to_string(),
                message: format!("Duplicate column \"{}\"", spec.name),
            });
        }
    }
    Ok(specs)
}

/// Parses a single `name(:flag)*` token.
pub fn parse_column_token(table: &str, token: &str) -> QuarryResult<ColumnSpec> {
    let invalid = |message: String| QuarryError::InvalidColumnSpec {
        table: table.to_string(),
        message,
    };
    let mut parts = token.split(':');
    let name = parts.next().unwrap_or_default();
    if !is_identifier(name) {
        return Err(invalid(format!("Invalid column name in \"{token}\"")));
    }

    let mut spec = ColumnSpec::new(table, name);
    let mut alias: Option<&str> = None;
    for flag in parts {
        match flag {
            "" => return Err(invalid(format!("Empty flag in column \"{token}\""))),
            "readonly" => spec.readonly = true,
            "required" => spec.required = true,
            _ => {
                if let Some((key, value)) = flag.split_once('=') {
                    spec.tags.insert(key.to_string(), value.to_string());
                } else if is_identifier(flag) {
                    if let Some(previous) = alias {
                        return Err(invalid(format!(
                            "Column \"{name}\" maps to both \"{previous}\" and \"{flag}\""
                        )));
                    }
                    alias = Some(flag);
                } else {
                    spec.tags.insert(flag.to_string(), String::new());
                }
            }
        }
    }
    if let Some(column) = alias {
        spec.column = column.to_string();
    }
    Ok(spec)
}

fn from_detail(table: &str, detail: &ColumnDetail) -> QuarryResult<ColumnSpec> {
    if !is_identifier(&detail.name) {
        return Err(QuarryError::InvalidColumnSpec {
            table: table.to_string(),
            message: format!("Invalid column name \"{}\"", detail.name),
        });
    }
    let mut spec = ColumnSpec::new(table, detail.name.as_str());
    if let Some(column) = &detail.column {
        spec.column.clone_from(column);
    }
    spec.readonly = detail.readonly;
    spec.required = detail.required;
    spec.tags.clone_from(&detail.tags);
    Ok(spec)
}

/// Builds virtual column specs from `name -> expression` pairs.
pub fn parse_virtual_columns<'a, I>(table: &str, pairs: I) -> QuarryResult<Vec<ColumnSpec>>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    pairs
        .into_iter()
        .map(|(name, expression)| {
            if !is_identifier(name) || expression.trim().is_empty() {
                return Err(QuarryError::InvalidColumnSpec {
                    table: table.to_string(),
                    message: format!("Invalid virtual column \"{name}\""),
                });
            }
            Ok(ColumnSpec::virtual_column(table, name.as_str(), expression.as_str()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::ErrorKind;

    #[test]
    fn test_compact_string() {
        let specs = parse_columns(
            "users",
            &ColumnsConfig::Compact("id:readonly name:required\n  email".into()),
        )
        .unwrap();
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["id", "name", "email"]);
        assert!(specs[0].readonly && !specs[0].required);
        assert!(specs[1].required);
        assert_eq!(specs[2].qualified(), "users.email");
    }

    #[test]
    fn test_alias_and_boolean_flags_in_any_order() {
        let a = parse_column_token("t", "user_id:readonly:id").unwrap();
        let b = parse_column_token("t", "user_id:id:readonly").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.select_sql(Dialect::SQLite), "\"t\".\"id\" AS \"user_id\"");
    }

    #[test]
    fn test_opaque_tags() {
        let spec = parse_column_token("t", "price:format=money:~x").unwrap();
        assert_eq!(spec.tags.get("format").map(String::as_str), Some("money"));
        assert!(spec.tags.contains_key("~x"));
        assert_eq!(spec.column, "price");
    }

    #[test]
    fn test_rejects_bad_tokens() {
        assert!(parse_column_token("t", "a:b:c").is_err());
        assert!(parse_column_token("t", "a::readonly").is_err());
        let err = parse_column_token("t", "1abc").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_duplicate_names() {
        let err = parse_columns("t", &ColumnsConfig::Compact("a b a".into())).unwrap_err();
        assert!(err.to_string().contains("Duplicate column \"a\""));
    }

    #[test]
    fn test_list_config_from_json() {
        let config: ColumnsConfig = serde_json::from_str(
            r#"["id:readonly", {"name": "login", "column": "username", "required": true}]"#,
        )
        .unwrap();
        let specs = parse_columns("users", &config).unwrap();
        assert_eq!(specs[1].column, "username");
        assert!(specs[1].required);
        assert_eq!(
            specs[1].select_sql(Dialect::MySQL),
            "`users`.`username` AS `login`"
        );
    }

    #[test]
    fn test_virtual_columns() {
        let pairs = BTreeMap::from([("full_name".to_string(), "forename || ' ' || surname".to_string())]);
        let specs = parse_virtual_columns("users", &pairs).unwrap();
        assert!(specs[0].is_virtual());
        assert!(specs[0].readonly);
        assert_eq!(
            specs[0].select_sql(Dialect::SQLite),
            "forename || ' ' || surname AS \"full_name\""
        );
    }
}
