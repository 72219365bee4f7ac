//! # quarry
//!
//! Declarative SQL composition for Rust.
//!
//! This is the facade crate that re-exports the member crates. Depend on
//! `quarry` for everything, or on the individual crates for finer-grained
//! control.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use quarry::prelude::*;
//!
//! # async fn example() -> QuarryResult<()> {
//! let settings = quarry::core::settings_loader::from_env();
//! quarry::core::logging::setup_logging(&settings);
//!
//! let catalog = Arc::new(SchemaConfig::from_file("schema.toml")?.compile()?);
//! let db = quarry::connect(&settings)?;
//! let users = Table::new("users", db, catalog)?;
//! for user in users.fetch_all(&[], Some("@brief"), Some("name")).await? {
//!     let orders = user.relation("orders").await?;
//!     println!("{:?} has {} orders", user.get("name"), orders.as_rows().map_or(0, <[_]>::len));
//! }
//! # Ok(())
//! # }
//! ```

use std::str::FromStr;
use std::sync::Arc;

/// Error taxonomy, settings, logging, and text helpers.
pub use quarry_core as core;

/// Query builder, schema catalog, relations, tables, and records.
pub use quarry_db as db;

/// Database backends.
pub use quarry_db_backends as db_backends;

/// In-memory test database and query count assertions.
#[cfg(feature = "testing")]
pub use quarry_test as test;

// Re-export commonly used third-party crates.
pub use async_trait;
pub use serde_json;
pub use tokio;
pub use tracing;

use quarry_core::settings::Settings;
use quarry_core::{QuarryError, QuarryResult};
use quarry_db::{DbExecutor, Dialect};

/// Opens the database described by `settings`.
///
/// The configured `dialect` must match the dialect of the selected engine,
/// since statements are rendered for the backend they run on.
pub fn connect(settings: &Settings) -> QuarryResult<Arc<dyn DbExecutor>> {
    let dialect = Dialect::from_str(&settings.dialect)?;
    match settings.database.engine.to_ascii_lowercase().as_str() {
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            if dialect != Dialect::SQLite {
                return Err(QuarryError::ConfigurationError(format!(
                    "Dialect \"{}\" does not match the sqlite engine",
                    settings.dialect
                )));
            }
            let backend = quarry_db_backends::SqliteBackend::from_settings(&settings.database)?;
            Ok(Arc::new(backend))
        }
        engine => Err(QuarryError::ConfigurationError(format!(
            "No backend is enabled for database engine \"{engine}\""
        ))),
    }
}

/// The names most programs need.
pub mod prelude {
    pub use quarry_core::{QuarryError, QuarryResult};
    pub use quarry_db::{
        BuilderArg, Catalog, DbExecutor, Dialect, QueryBuilder, Record, RelationValue, Row,
        SchemaConfig, Table, Value,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::ErrorKind;

    #[tokio::test]
    async fn test_connect_default_settings() {
        let db = connect(&Settings::default()).unwrap();
        assert_eq!(db.dialect(), Dialect::SQLite);
        let rows = db.query("SELECT 1 AS one", &[]).await.unwrap();
        assert_eq!(rows[0].get::<i64>("one").unwrap(), 1);
    }

    #[test]
    fn test_connect_rejects_mismatched_dialect() {
        let settings = Settings {
            dialect: "postgres".to_string(),
            ..Settings::default()
        };
        let err = connect(&settings).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_connect_rejects_unknown_engine() {
        let mut settings = Settings::default();
        settings.database.engine = "oracle".to_string();
        assert!(connect(&settings).is_err());
    }
}
