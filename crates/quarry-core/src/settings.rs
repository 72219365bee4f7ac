//! Settings for quarry.
//!
//! [`Settings`] holds the runtime configuration. It is loaded by
//! [`settings_loader`](crate::settings_loader) and passed explicitly to
//! logging setup and to the backends.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Database connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// The database engine (e.g. `sqlite`).
    pub engine: String,
    /// The database name (or file path for `SQLite`).
    pub name: String,
    /// Engine-specific options. The SQLite backend applies each entry as a
    /// `PRAGMA`.
    pub options: HashMap<String, String>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            engine: "sqlite".to_string(),
            name: ":memory:".to_string(),
            options: HashMap::new(),
        }
    }
}

/// The complete set of runtime settings.
///
/// # Examples
///
/// ```
/// use quarry_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert_eq!(settings.dialect, "sqlite");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Whether debug mode is enabled. Debug mode selects human-readable logs.
    pub debug: bool,

    /// The log level filter (e.g. "info", "debug", "quarry_db=trace").
    pub log_level: String,

    /// The SQL dialect used when rendering statements
    /// (`sqlite`, `postgres` or `mysql`).
    pub dialect: String,

    /// The database connection.
    pub database: DatabaseSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            log_level: "info".to_string(),
            dialect: "sqlite".to_string(),
            database: DatabaseSettings::default(),
        }
    }
}
