//! Relation descriptors.
//!
//! A relation is configured as a compact string such as
//! `"id => orders.user_id"`, as an object (optionally embedding such a
//! string under `relation`), or as an object with a custom loader. All three
//! forms normalise to a [`RelationSpec`].
//!
//! | arrow | kind |
//! |---|---|
//! | `~>` | [`RelationKind::Any`] |
//! | `->` | [`RelationKind::One`] |
//! | `=>` | [`RelationKind::Many`] |
//! | `#>` | [`RelationKind::Map`] |

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};

use quarry_core::{QuarryError, QuarryResult};

use super::resolver::RelationLoader;
use crate::value::Value;

static RELATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)\s*([-~=#]>)\s*(\w+)\.(\w+)$").unwrap());

/// Alternative field names and the canonical field each folds into.
const ALIASES: &[(&str, &str)] = &[
    ("localKey", "from"),
    ("local_key", "from"),
    ("remoteKey", "to"),
    ("remote_key", "to"),
    ("orderBy", "order"),
    ("order_by", "order"),
    ("kind", "type"),
];

const FIELDS: &[&str] = &[
    "relation", "type", "from", "to", "table", "order", "where", "key", "value",
];

/// The multiplicity of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// Zero or one related row.
    Any,
    /// Exactly one related row.
    One,
    /// An ordered sequence of related rows.
    Many,
    /// Related rows keyed by a column.
    Map,
}

impl RelationKind {
    /// Maps a relation arrow to its kind.
    pub fn from_arrow(arrow: &str) -> Option<Self> {
        match arrow {
            "~>" => Some(Self::Any),
            "->" => Some(Self::One),
            "=>" => Some(Self::Many),
            "#>" => Some(Self::Map),
            _ => None,
        }
    }

    /// The configuration name of the kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::One => "one",
            Self::Many => "many",
            Self::Map => "map",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationKind {
    type Err = QuarryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any" => Ok(Self::Any),
            "one" => Ok(Self::One),
            "many" => Ok(Self::Many),
            "map" => Ok(Self::Map),
            _ => Self::from_arrow(s).ok_or_else(|| QuarryError::InvalidRelation {
                relation: s.to_string(),
                message: format!("Invalid relation type \"{s}\""),
            }),
        }
    }
}

/// The fields of a parsed relation string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRelation {
    pub kind: RelationKind,
    pub from: String,
    pub table: String,
    pub to: String,
}

/// Parses `<from> <arrow> <table>.<to>`.
///
/// ```
/// use quarry_db::relation::{parse_relation_string, RelationKind};
///
/// let parsed = parse_relation_string("gee => aitch.eye").unwrap();
/// assert_eq!(parsed.kind, RelationKind::Many);
/// assert_eq!((parsed.from.as_str(), parsed.table.as_str(), parsed.to.as_str()), ("gee", "aitch", "eye"));
/// ```
pub fn parse_relation_string(s: &str) -> QuarryResult<ParsedRelation> {
    let invalid = || QuarryError::InvalidRelationString(s.to_string());
    let caps = RELATION.captures(s.trim()).ok_or_else(invalid)?;
    Ok(ParsedRelation {
        kind: RelationKind::from_arrow(&caps[2]).ok_or_else(invalid)?,
        from: caps[1].to_string(),
        table: caps[3].to_string(),
        to: caps[4].to_string(),
    })
}

/// A relation as it appears in configuration.
///
/// Deserialises from a descriptor string or an object; a custom loader can
/// only be attached in code.
#[derive(Clone, Default)]
pub struct RelationConfig {
    fields: serde_json::Map<String, serde_json::Value>,
    load: Option<Arc<dyn RelationLoader>>,
}

impl fmt::Debug for RelationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationConfig")
            .field("fields", &self.fields)
            .field("load", &self.load.is_some())
            .finish()
    }
}

impl RelationConfig {
    /// A relation given only by its descriptor string.
    pub fn descriptor(relation: impl Into<String>) -> Self {
        Self::default().with("relation", relation.into())
    }

    /// Builds a relation from a JSON string or object.
    pub fn from_json(json: serde_json::Value) -> QuarryResult<Self> {
        match json {
            serde_json::Value::String(s) => Ok(Self::descriptor(s)),
            serde_json::Value::Object(fields) => Ok(Self { fields, load: None }),
            other => Err(QuarryError::InvalidRelation {
                relation: other.to_string(),
                message: "Relation must be a string or an object".to_string(),
            }),
        }
    }

    /// Sets a field.
    #[must_use]
    pub fn with(mut self, field: &str, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    /// Attaches a custom loader. A relation with a loader needs no other
    /// fields.
    #[must_use]
    pub fn with_loader(mut self, loader: Arc<dyn RelationLoader>) -> Self {
        self.load = Some(loader);
        self
    }
}

impl<'de> Deserialize<'de> for RelationConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Self::from_json(json).map_err(serde::de::Error::custom)
    }
}

/// A normalised relation.
#[derive(Clone)]
pub struct RelationSpec {
    /// `<table>.<relation>`, used in diagnostics.
    pub name: String,
    pub kind: RelationKind,
    /// The local key column.
    pub from: String,
    /// The remote key column.
    pub to: String,
    /// The remote table.
    pub table: String,
    /// Ordering applied to `many` relations.
    pub order: Option<String>,
    /// Static criteria added to the correlated predicate.
    pub where_: Vec<(String, Value)>,
    /// Map key column. Defaults to the remote table's identity.
    pub key: Option<String>,
    /// Map value column. Defaults to the whole row.
    pub value: Option<String>,
    pub load: Option<Arc<dyn RelationLoader>>,
}

impl fmt::Debug for RelationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("table", &self.table)
            .field("order", &self.order)
            .field("where_", &self.where_)
            .field("key", &self.key)
            .field("value", &self.value)
            .field("load", &self.load.is_some())
            .finish()
    }
}

impl PartialEq for RelationSpec {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.kind == other.kind
            && self.from == other.from
            && self.to == other.to
            && self.table == other.table
            && self.order == other.order
            && self.where_ == other.where_
            && self.key == other.key
            && self.value == other.value
            && match (&self.load, &other.load) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
    }
}

/// Normalises the configuration of relation `name` on `table`.
///
/// Explicit fields override those parsed from an embedded `relation`
/// string, and alias fields (`localKey`, `remote_key`, `orderBy`, ...) fold
/// into their canonical names without overwriting them.
///
/// ```
/// use quarry_db::relation::{relation_config, RelationConfig, RelationKind};
///
/// let spec = relation_config("users", "orders", &RelationConfig::descriptor("id => orders.user_id"))
///     .unwrap();
/// assert_eq!(spec.name, "users.orders");
/// assert_eq!(spec.kind, RelationKind::Many);
/// ```
pub fn relation_config(table: &str, name: &str, config: &RelationConfig) -> QuarryResult<RelationSpec> {
    let full_name = format!("{table}.{name}");
    let invalid = |message: String| QuarryError::InvalidRelation {
        relation: full_name.clone(),
        message,
    };

    let mut fields = config.fields.clone();
    for (alias, canonical) in ALIASES {
        if let Some(value) = fields.remove(*alias) {
            fields.entry(*canonical).or_insert(value);
        }
    }
    if let Some(unknown) = fields.keys().find(|k| !FIELDS.contains(&k.as_str())) {
        return Err(invalid(format!("Unknown relation field \"{unknown}\"")));
    }

    if let Some(relation) = fields.remove("relation") {
        let relation = relation
            .as_str()
            .ok_or_else(|| invalid("\"relation\" must be a string".to_string()))?;
        let parsed = parse_relation_string(relation)?;
        for (field, value) in [
            ("type", parsed.kind.as_str().to_string()),
            ("from", parsed.from),
            ("table", parsed.table),
            ("to", parsed.to),
        ] {
            fields.entry(field).or_insert(value.into());
        }
    }

    let text = |field: &str| -> QuarryResult<Option<String>> {
        match fields.get(field) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(serde_json::Value::String(s)) => Ok(Some(s.trim().to_string())),
            Some(other) => Err(invalid(format!("\"{field}\" must be a string, got {other}"))),
        }
    };

    let has_loader = config.load.is_some();
    let required = |field: &str| -> QuarryResult<String> {
        match text(field)? {
            Some(value) => Ok(value),
            None if has_loader => Ok(String::new()),
            None => Err(QuarryError::MissingRelationField {
                field: field.to_string(),
                relation: name.to_string(),
                table: table.to_string(),
            }),
        }
    };

    let kind = match text("type")? {
        Some(kind) => kind.parse().map_err(|_| invalid(format!("Invalid relation type \"{kind}\"")))?,
        None if has_loader => RelationKind::Many,
        None => {
            return Err(QuarryError::MissingRelationField {
                field: "type".to_string(),
                relation: name.to_string(),
                table: table.to_string(),
            })
        }
    };
    let remote_table = required("table")?;
    let to = required("to")?;
    let from = required("from")?;

    let where_ = match fields.get("where") {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::Object(criteria)) => criteria
            .iter()
            .map(|(column, value)| (column.clone(), Value::from_json(value)))
            .collect(),
        Some(other) => return Err(invalid(format!("\"where\" must be an object, got {other}"))),
    };

    Ok(RelationSpec {
        kind,
        from,
        to,
        table: remote_table,
        order: text("order")?,
        where_,
        key: text("key")?,
        value: text("value")?,
        load: config.load.clone(),
        name: full_name.clone(),
    })
}
