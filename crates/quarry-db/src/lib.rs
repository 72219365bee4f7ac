//! # quarry-db
//!
//! Declarative SQL composition for quarry. Provides an extensible
//! [`QueryBuilder`](builder::QueryBuilder) driven by a registry of
//! components, a schema layer that expands compact column declarations and
//! named column sets, and a relation resolver that loads related rows with
//! one/any/many/map semantics.
//!
//! ## Architecture
//!
//! Everything up to the rendered [`Statement`](builder::Statement) is
//! synchronous and pure. Builder calls resolve their argument immediately
//! and accumulate tokens per method; rendering sorts methods by each
//! component's `order`, so call order never matters. Only the
//! [`DbExecutor`](executor::DbExecutor) boundary is async.
//!
//! ## Module Overview
//!
//! - [`builder`] - Argument shapes, components, the registry, and the query builder
//! - [`dialect`] - Identifier quoting and placeholder syntax
//! - [`schema`] - Column specs, column sets, table schemas, and the catalog
//! - [`relation`] - Relation descriptors and relation loading
//! - [`table`] / [`record`] - Table and record wrappers
//! - [`executor`] - The async driver boundary
//! - [`value`] / [`row`] - Bound values and result rows

// These clippy lints are intentionally allowed for the quarry-db crate:
// - result_large_err: QuarryError is the crate-wide error type and is used consistently
// - format_push_string: format! with push_str is clearer than write! for SQL generation
// - doc_markdown: backtick requirements for documentation items are too strict
// - missing_fields_in_debug: Debug impls skip resolver closures and loaders
#![allow(clippy::result_large_err)]
#![allow(clippy::format_push_string)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_fields_in_debug)]

pub mod builder;
pub mod dialect;
pub mod executor;
pub mod record;
pub mod relation;
pub mod row;
pub mod schema;
pub mod table;
pub mod value;

pub use builder::{BuilderArg, ComponentDef, ComponentRegistry, QueryBuilder, Statement};
pub use dialect::Dialect;
pub use executor::{DbExecutor, ExecResult};
pub use record::Record;
pub use relation::{RelationConfig, RelationKind, RelationSpec, RelationValue};
pub use row::Row;
pub use schema::{Catalog, SchemaConfig, TableConfig, TableSchema};
pub use table::Table;
pub use value::Value;
