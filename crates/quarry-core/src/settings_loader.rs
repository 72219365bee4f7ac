//! Loading [`Settings`] from configuration files and the environment.
//!
//! A document only overrides the keys it mentions; everything else keeps
//! its default. `QUARRY_*` environment variables are applied last.
//!
//! | Env Var | Setting |
//! |---|---|
//! | `QUARRY_DEBUG` | `debug` |
//! | `QUARRY_LOG_LEVEL` | `log_level` |
//! | `QUARRY_DIALECT` | `dialect` |
//! | `QUARRY_DATABASE_ENGINE` | `database.engine` |
//! | `QUARRY_DATABASE_NAME` | `database.name` |
//!
//! ```rust,no_run
//! use quarry_core::settings_loader;
//!
//! let settings = settings_loader::from_file_with_env("config/quarry.toml").unwrap();
//! ```

use std::path::Path;

use crate::error::QuarryError;
use crate::settings::Settings;

/// The syntax of a settings document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Picks the format from a file extension; anything but `.json` is TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        }
    }

    fn parse(self, text: &str) -> Result<serde_json::Value, QuarryError> {
        let parsed = match self {
            Self::Toml => toml::from_str::<serde_json::Value>(text).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_str::<serde_json::Value>(text).map_err(|e| e.to_string()),
        };
        parsed.map_err(|e| {
            QuarryError::ConfigurationError(format!("Failed to parse {}: {e}", self.name()))
        })
    }
}

/// Loads settings from a document in `format`.
pub fn from_str(text: &str, format: ConfigFormat) -> Result<Settings, QuarryError> {
    let mut merged = serde_json::to_value(Settings::default()).map_err(|e| {
        QuarryError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;
    overlay(&mut merged, format.parse(text)?);
    serde_json::from_value(merged).map_err(|e| {
        QuarryError::ConfigurationError(format!(
            "Failed to deserialize settings from {}: {e}",
            format.name()
        ))
    })
}

/// Loads settings from a TOML string.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, QuarryError> {
    from_str(toml_str, ConfigFormat::Toml)
}

/// Loads settings from a JSON string.
pub fn from_json_str(json_str: &str) -> Result<Settings, QuarryError> {
    from_str(json_str, ConfigFormat::Json)
}

/// Loads settings from a file, choosing the format by extension.
pub fn from_file(path: impl AsRef<Path>) -> Result<Settings, QuarryError> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path);
    let text = std::fs::read_to_string(path).map_err(|e| {
        QuarryError::ConfigurationError(format!(
            "Failed to read {} file '{}': {e}",
            format.name(),
            path.display()
        ))
    })?;
    from_str(&text, format)
}

/// Loads settings from a file, then applies environment overrides.
pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Settings, QuarryError> {
    let mut settings = from_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults plus environment overrides.
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `QUARRY_*` environment variable overrides.
pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides(settings, |key| std::env::var(key).ok());
}

fn apply_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("QUARRY_DEBUG") {
        settings.debug = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
    }
    let targets: [(&str, &mut String); 4] = [
        ("QUARRY_LOG_LEVEL", &mut settings.log_level),
        ("QUARRY_DIALECT", &mut settings.dialect),
        ("QUARRY_DATABASE_ENGINE", &mut settings.database.engine),
        ("QUARRY_DATABASE_NAME", &mut settings.database.name),
    ];
    for (key, target) in targets {
        if let Some(val) = lookup(key) {
            *target = val;
        }
    }
}

/// Writes `layer` over `base`, recursing into objects present in both.
fn overlay(base: &mut serde_json::Value, layer: serde_json::Value) {
    match (base, layer) {
        (serde_json::Value::Object(base), serde_json::Value::Object(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(existing) => overlay(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, layer) => *base = layer,
    }
}
