//! # quarry-core
//!
//! Foundation types shared by every quarry crate. This crate knows nothing
//! about SQL; it provides the error taxonomy, the settings system, logging
//! setup, and a couple of text helpers used when building diagnostics.
//!
//! ## Modules
//!
//! - [`error`] - Error types, error kinds, and result aliases
//! - [`settings`] - Runtime settings
//! - [`settings_loader`] - Loading settings from TOML, JSON, and the environment
//! - [`logging`] - Tracing-based logging integration
//! - [`utils`] - Text helpers (message templates, identifier checks)

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;
pub mod utils;

// Re-export the most commonly used types at the crate root.
pub use error::{ErrorKind, QuarryError, QuarryResult};
pub use settings::Settings;
