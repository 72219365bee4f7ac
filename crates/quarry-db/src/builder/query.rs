//! The per-query builder.
//!
//! A [`QueryBuilder`] accumulates resolved tokens per method in call order
//! and renders them sorted by each component's `order`, so methods can be
//! called in any sequence.
//!
//! # Examples
//!
//! ```
//! use quarry_db::builder::QueryBuilder;
//! use quarry_db::dialect::Dialect;
//! use quarry_db::value::Value;
//!
//! let mut query = QueryBuilder::new(Dialect::PostgreSQL);
//! query
//!     .where_(vec![Value::from("id"), Value::Int(42)])
//!     .unwrap()
//!     .from("users")
//!     .unwrap()
//!     .select("id name")
//!     .unwrap()
//!     .where_("email")
//!     .unwrap();
//!
//! let statement = query.build();
//! assert_eq!(
//!     statement.sql(),
//!     "SELECT \"id\", \"name\" FROM \"users\" WHERE \"id\" = $1 AND \"email\" = $2"
//! );
//! assert_eq!(
//!     statement.bind(vec![Value::from("bob@example.com")]).unwrap(),
//!     vec![Value::Int(42), Value::from("bob@example.com")]
//! );
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use quarry_core::{QuarryError, QuarryResult};

use super::args::BuilderArg;
use super::component::{Slot, BIND_MARKER};
use super::registry::{self, ComponentRegistry, DispatchTable};
use crate::dialect::Dialect;
use crate::value::Value;

/// A rendered statement: SQL plus its placeholder slots in emission order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    sql: String,
    slots: Vec<Slot>,
}

impl Statement {
    /// Creates a statement from SQL and its slots.
    pub fn new(sql: impl Into<String>, slots: Vec<Slot>) -> Self {
        Self {
            sql: sql.into(),
            slots,
        }
    }

    /// The rendered SQL.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// All placeholder slots, in emission order.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// The number of slots that must be filled at execution time.
    pub fn open_slots(&self) -> usize {
        self.slots.iter().filter(|s| **s == Slot::Open).count()
    }

    /// Returns the full positional binding list, filling open slots from
    /// `values` in order.
    ///
    /// Fails with [`QuarryError::UnboundPlaceholders`] unless exactly
    /// [`open_slots`](Self::open_slots) values are supplied.
    pub fn bind(&self, values: Vec<Value>) -> QuarryResult<Vec<Value>> {
        let expected = self.open_slots();
        if values.len() != expected {
            return Err(QuarryError::UnboundPlaceholders {
                expected,
                found: values.len(),
            });
        }
        let mut supplied = values.into_iter();
        Ok(self
            .slots
            .iter()
            .map(|slot| match slot {
                Slot::Bound(value) => value.clone(),
                Slot::Open => supplied.next().unwrap_or(Value::Null),
            })
            .collect())
    }

    /// Splits the statement into its SQL and slots.
    pub fn into_parts(self) -> (String, Vec<Slot>) {
        (self.sql, self.slots)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

#[derive(Debug, Clone, Default)]
struct Fragment {
    tokens: Vec<String>,
    slots: Vec<Slot>,
}

/// Accumulates builder calls for a single query.
#[derive(Clone)]
pub struct QueryBuilder {
    table: Arc<DispatchTable>,
    dialect: Dialect,
    invocations: Vec<(String, BuilderArg)>,
    fragments: HashMap<String, Fragment>,
}

impl fmt::Debug for QueryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("dialect", &self.dialect)
            .field("invocations", &self.invocations)
            .finish_non_exhaustive()
    }
}

macro_rules! builder_methods {
    ($($(#[$doc:meta])* $fn_name:ident => $method:literal;)*) => {
        $(
            $(#[$doc])*
            pub fn $fn_name(&mut self, arg: impl Into<BuilderArg>) -> QuarryResult<&mut Self> {
                self.call($method, arg)
            }
        )*
    };
}

impl QueryBuilder {
    /// Creates a builder over a snapshot of the process-wide registry.
    pub fn new(dialect: Dialect) -> Self {
        Self::with_table(registry::snapshot(), dialect)
    }

    /// Creates a builder over a snapshot of `registry`.
    pub fn with_registry(registry: &ComponentRegistry, dialect: Dialect) -> Self {
        Self::with_table(registry.snapshot(), dialect)
    }

    fn with_table(table: Arc<DispatchTable>, dialect: Dialect) -> Self {
        Self {
            table,
            dialect,
            invocations: Vec::new(),
            fragments: HashMap::new(),
        }
    }

    /// The dialect this builder renders for.
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Invokes the component registered as `method` with `arg`.
    ///
    /// The argument is resolved immediately; resolution errors are returned
    /// and leave the builder unchanged.
    pub fn call(&mut self, method: &str, arg: impl Into<BuilderArg>) -> QuarryResult<&mut Self> {
        let arg = arg.into();
        let entry = self
            .table
            .get(method)
            .ok_or_else(|| QuarryError::UnknownMethod(method.to_string()))?;
        let resolved = entry.def.resolve(&arg, self.dialect)?;
        let fragment = self.fragments.entry(method.to_string()).or_default();
        if entry.def.replaces_previous() {
            fragment.tokens.clear();
            fragment.slots.clear();
        }
        fragment.tokens.extend(resolved.tokens);
        fragment.slots.extend(resolved.slots);
        self.invocations.push((method.to_string(), arg));
        Ok(self)
    }

    builder_methods! {
        /// Verbatim text placed before everything else.
        before => "before";
        /// Adds selected columns.
        select => "select";
        /// Sets the table for an `INSERT`.
        insert => "insert";
        /// Adds columns to an insert column list.
        columns => "columns";
        /// Adds insert values.
        values => "values";
        /// Sets the table for an `UPDATE`.
        update => "update";
        /// Adds `SET` assignments.
        set => "set";
        /// Sets the table for a `DELETE`.
        delete => "delete";
        /// Adds source tables.
        from => "from";
        /// Adds a join.
        join => "join";
        /// Adds `WHERE` criteria, combined with `AND`.
        where_ => "where";
        /// Adds grouping columns.
        group => "group";
        /// Adds `HAVING` criteria.
        having => "having";
        /// Adds ordering columns.
        order => "order";
        /// Sets the row limit.
        limit => "limit";
        /// Sets the row offset.
        offset => "offset";
        /// Adds `RETURNING` columns.
        returning => "returning";
        /// Verbatim text placed after everything else.
        after => "after";
    }

    /// The invocations made so far, in call order.
    pub fn invocations(&self) -> &[(String, BuilderArg)] {
        &self.invocations
    }

    /// The tokens accumulated for `method`, in call order.
    pub fn fragments(&self, method: &str) -> &[String] {
        self.fragments
            .get(method)
            .map_or(&[], |f| f.tokens.as_slice())
    }

    /// Renders the statement.
    ///
    /// Only accumulated tokens are rendered, so calling this repeatedly
    /// returns the same statement.
    pub fn build(&self) -> Statement {
        let mut parts: Vec<(u8, usize, String, &[Slot])> = self
            .fragments
            .iter()
            .filter(|(_, f)| !f.tokens.is_empty())
            .filter_map(|(method, f)| {
                let entry = self.table.get(method)?;
                Some((
                    entry.def.order(),
                    entry.seq,
                    entry.def.render(&f.tokens),
                    f.slots.as_slice(),
                ))
            })
            .collect();
        parts.sort_by_key(|(order, seq, _, _)| (*order, *seq));

        let mut slots = Vec::new();
        let mut segments = Vec::with_capacity(parts.len());
        for (_, _, segment, fragment_slots) in parts {
            segments.push(segment);
            slots.extend_from_slice(fragment_slots);
        }
        let sql = number_placeholders(&segments.join(" "), self.dialect);
        tracing::debug!(sql = %sql, bindings = slots.len(), "quarry.build");
        Statement { sql, slots }
    }

    /// Renders the SQL text.
    pub fn sql(&self) -> String {
        self.build().sql
    }
}

/// Replaces bind markers with the dialect's placeholders, numbered from 1.
fn number_placeholders(sql: &str, dialect: Dialect) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut index = 0;
    for c in sql.chars() {
        if c == BIND_MARKER {
            index += 1;
            out.push_str(&dialect.placeholder(index));
        } else {
            out.push(c);
        }
    }
    out
}
