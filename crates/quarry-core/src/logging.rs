//! Logging integration for quarry.
//!
//! Provides helpers for configuring [`tracing`]-based logging from
//! [`Settings`](crate::settings::Settings) and for creating per-operation spans.

use crate::settings::Settings;

/// Sets up the global tracing subscriber based on the given settings.
///
/// The log level is read from `settings.log_level` (e.g. "debug", "info",
/// "quarry_db=trace"). In debug mode a pretty, human-readable format is used;
/// otherwise a structured JSON format is used. Installing a subscriber twice
/// is a no-op.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
            .ok();
    }
}

/// Creates a tracing span for a database operation against a table.
///
/// # Examples
///
/// ```
/// use quarry_core::logging::query_span;
///
/// let span = query_span("fetch_all", "users");
/// let _guard = span.enter();
/// tracing::debug!("loading users");
/// ```
pub fn query_span(operation: &str, table: &str) -> tracing::Span {
    tracing::info_span!("query", operation = operation, table = table)
}
