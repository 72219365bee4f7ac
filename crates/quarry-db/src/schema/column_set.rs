//! Named column sets.
//!
//! A column set is defined either as a list of tokens (column names,
//! virtual column names and `@set` references) or as an include/exclude
//! delta against the table's default set. Sets are expanded when the table
//! schema is compiled, so a bad reference fails at setup time.
//!
//! The default set is the set named `default` when one is defined, and all
//! real columns in declared order otherwise. `@all` refers to all real
//! columns unless a set of that name is defined.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use quarry_core::{QuarryError, QuarryResult};

use super::columns::ColumnSpec;
use crate::builder::split_tokens;

/// Names given either as a whitespace separated string or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NameList {
    String(String),
    List(Vec<String>),
}

impl NameList {
    /// Returns the individual tokens.
    pub fn tokens(&self) -> Vec<String> {
        match self {
            Self::String(s) => split_tokens(s),
            Self::List(items) => items.iter().flat_map(|s| split_tokens(s)).collect(),
        }
    }
}

/// A column set as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnSetConfig {
    /// An explicit token list.
    Names(NameList),
    /// A delta against the default set.
    Delta(ColumnSetDelta),
}

/// Exclusions are applied to the default set first, then inclusions are
/// appended.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnSetDelta {
    #[serde(default)]
    pub include: Option<NameList>,
    #[serde(default)]
    pub exclude: Option<NameList>,
}

/// The expanded column sets of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSets {
    table: String,
    all: Vec<String>,
    default: Vec<String>,
    known: HashSet<String>,
    sets: HashMap<String, Vec<String>>,
}

impl ColumnSets {
    /// Expands every configured set for `table`.
    ///
    /// `columns` holds the real columns followed by the virtual columns.
    pub fn compile(
        table: &str,
        columns: &[ColumnSpec],
        configs: &BTreeMap<String, ColumnSetConfig>,
    ) -> QuarryResult<Self> {
        let all: Vec<String> = columns
            .iter()
            .filter(|c| !c.is_virtual())
            .map(|c| c.name.clone())
            .collect();
        let mut compiler = Compiler {
            table,
            all: &all,
            known: columns.iter().map(|c| c.name.clone()).collect(),
            configs,
            done: HashMap::new(),
            stack: Vec::new(),
        };
        let default = compiler.default_set()?;
        for name in configs.keys() {
            compiler.expand(name)?;
        }
        Ok(Self {
            table: table.to_string(),
            default,
            known: compiler.known,
            sets: compiler.done,
            all,
        })
    }

    /// The default column set.
    pub fn default_set(&self) -> &[String] {
        &self.default
    }

    /// Returns the expansion of a named set.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        match name {
            _ if self.sets.contains_key(name) => self.sets.get(name).map(Vec::as_slice),
            "default" => Some(&self.default),
            "all" => Some(&self.all),
            _ => None,
        }
    }

    /// The configured set names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolves a token string such as `"@basic email full_name"` into an
    /// ordered, duplicate-free list of column names. `None` or a blank
    /// string yields the default set.
    pub fn resolve(&self, token: Option<&str>) -> QuarryResult<Vec<String>> {
        let tokens = token.map(split_tokens).unwrap_or_default();
        if tokens.is_empty() {
            return Ok(self.default.clone());
        }
        let mut out = Vec::new();
        for token in tokens {
            if let Some(set) = token.strip_prefix('@') {
                let names = self.get(set).ok_or_else(|| QuarryError::UnknownColumnSet {
                    table: self.table.clone(),
                    set: set.to_string(),
                })?;
                push_unique(&mut out, names.iter().cloned());
            } else if self.known.contains(&token) {
                push_unique(&mut out, [token]);
            } else {
                return Err(QuarryError::UnknownColumn {
                    table: self.table.clone(),
                    column: token,
                });
            }
        }
        Ok(out)
    }
}

fn push_unique(out: &mut Vec<String>, names: impl IntoIterator<Item = String>) {
    for name in names {
        if !out.contains(&name) {
            out.push(name);
        }
    }
}

struct Compiler<'a> {
    table: &'a str,
    all: &'a [String],
    known: HashSet<String>,
    configs: &'a BTreeMap<String, ColumnSetConfig>,
    done: HashMap<String, Vec<String>>,
    stack: Vec<String>,
}

impl Compiler<'_> {
    fn default_set(&mut self) -> QuarryResult<Vec<String>> {
        if self.configs.contains_key("default") {
            self.expand("default")
        } else {
            Ok(self.all.to_vec())
        }
    }

    fn expand(&mut self, name: &str) -> QuarryResult<Vec<String>> {
        if let Some(done) = self.done.get(name) {
            return Ok(done.clone());
        }
        if self.stack.iter().any(|s| s == name) {
            return Err(QuarryError::ColumnSetCycle {
                table: self.table.to_string(),
                set: name.to_string(),
            });
        }
        let configs = self.configs;
        let Some(config) = configs.get(name) else {
            return match name {
                "default" => self.default_set(),
                "all" => Ok(self.all.to_vec()),
                _ => Err(QuarryError::UnknownColumnSet {
                    table: self.table.to_string(),
                    set: name.to_string(),
                }),
            };
        };

        self.stack.push(name.to_string());
        let expanded = match config {
            ColumnSetConfig::Names(names) => self.tokens(&names.tokens()),
            ColumnSetConfig::Delta(ColumnSetDelta { include, exclude }) => {
                // A delta-style default can only be relative to all columns.
                let mut base = if name == "default" {
                    self.all.to_vec()
                } else {
                    self.default_set()?
                };
                if let Some(exclude) = exclude {
                    let excluded = self.tokens(&exclude.tokens())?;
                    base.retain(|c| !excluded.contains(c));
                }
                if let Some(include) = include {
                    let included = self.tokens(&include.tokens())?;
                    push_unique(&mut base, included);
                }
                Ok(base)
            }
        };
        self.stack.pop();

        let expanded = expanded?;
        self.done.insert(name.to_string(), expanded.clone());
        Ok(expanded)
    }

    fn tokens(&mut self, tokens: &[String]) -> QuarryResult<Vec<String>> {
        let mut out = Vec::new();
        for token in tokens {
            if let Some(set) = token.strip_prefix('@') {
                let names = self.expand(set)?;
                push_unique(&mut out, names);
            } else if self.known.contains(token) {
                push_unique(&mut out, [token.clone()]);
            } else {
                return Err(QuarryError::UnknownColumn {
                    table: self.table.to_string(),
                    column: token.clone(),
                });
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::ErrorKind;

    fn users() -> Vec<ColumnSpec> {
        let mut columns: Vec<ColumnSpec> = [
            "id", "forename", "surname", "password", "email", "registered", "last_login",
            "is_admin",
        ]
        .into_iter()
        .map(|name| ColumnSpec::new("users", name))
        .collect();
        columns.push(ColumnSpec::virtual_column(
            "users",
            "name",
            "forename || ' ' || surname",
        ));
        columns
    }

    fn sets(json: &str) -> QuarryResult<ColumnSets> {
        let configs: BTreeMap<String, ColumnSetConfig> = serde_json::from_str(json).unwrap();
        ColumnSets::compile("users", &users(), &configs)
    }

    #[test]
    fn test_exclude_from_defaults() {
        let sets = sets(r#"{"public": {"exclude": "password is_admin"}}"#).unwrap();
        assert_eq!(
            sets.get("public").unwrap(),
            ["id", "forename", "surname", "email", "registered", "last_login"]
        );
    }

    #[test]
    fn test_exclude_then_include() {
        let sets =
            sets(r#"{"public": {"include": "name", "exclude": "password is_admin"}}"#).unwrap();
        assert_eq!(
            sets.get("public").unwrap(),
            ["id", "forename", "surname", "email", "registered", "last_login", "name"]
        );
    }

    #[test]
    fn test_include_wins_on_conflict() {
        let sets = sets(r#"{"x": {"include": "password", "exclude": "password"}}"#).unwrap();
        assert!(sets.get("x").unwrap().contains(&"password".to_string()));
    }

    #[test]
    fn test_references_and_dedup() {
        let sets = sets(
            r#"{
                "basic": "id forename surname",
                "contact": ["@basic", "email id"]
            }"#,
        )
        .unwrap();
        assert_eq!(
            sets.get("contact").unwrap(),
            ["id", "forename", "surname", "email"]
        );
        assert_eq!(
            sets.resolve(Some("email @basic name")).unwrap(),
            ["email", "id", "forename", "surname", "name"]
        );
    }

    #[test]
    fn test_defined_default_is_used_by_deltas() {
        let sets = sets(
            r#"{
                "default": {"exclude": "password"},
                "lean": {"exclude": "is_admin"}
            }"#,
        )
        .unwrap();
        assert!(!sets.default_set().contains(&"password".to_string()));
        let lean = sets.get("lean").unwrap();
        assert!(!lean.contains(&"password".to_string()));
        assert!(!lean.contains(&"is_admin".to_string()));
        assert_eq!(sets.resolve(None).unwrap(), sets.default_set());
        assert_eq!(sets.get("all").unwrap().len(), 8);
    }

    #[test]
    fn test_unknown_references() {
        let err = sets(r#"{"x": "id nope"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("nope"));

        let err = sets(r#"{"x": "@missing"}"#).unwrap_err();
        assert!(matches!(err, QuarryError::UnknownColumnSet { .. }));

        let sets = sets("{}").unwrap();
        assert!(sets.resolve(Some("@nothing")).is_err());
        assert!(sets.resolve(Some("ghost")).is_err());
    }

    #[test]
    fn test_cycles_detected() {
        let err = sets(r#"{"a": "@b", "b": "id @a"}"#).unwrap_err();
        assert!(matches!(err, QuarryError::ColumnSetCycle { .. }));
    }

    #[test]
    fn test_unknown_delta_field_rejected() {
        let parsed: Result<ColumnSetConfig, _> = serde_json::from_str(r#"{"includes": "a"}"#);
        assert!(parsed.is_err());
    }
}
