//! Core error types for quarry.
//!
//! Every failure in the query builder, the schema resolvers, and the relation
//! machinery is reported through [`QuarryError`]. Variants fall into four
//! broad categories, exposed through [`QuarryError::kind`]:
//!
//! - **Configuration** errors are raised while schema configuration is being
//!   compiled: malformed relation strings, missing relation fields, unknown
//!   column or column-set references, rejected component registrations.
//! - **Invocation** errors are raised when a builder method is called with an
//!   argument it cannot handle.
//! - **Data-shape** errors are raised when a query returns a different number
//!   of rows than the caller demanded.
//! - **Database** errors come from the driver layer.
//!
//! Nothing here is retried. Errors surface at the point of detection.

use thiserror::Error;

/// The broad category an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration, detected at setup or parse time.
    Configuration,
    /// An unsupported argument passed to a builder method.
    Invocation,
    /// A query produced an unexpected number of rows.
    DataShape,
    /// A failure reported by the database driver.
    Database,
}

/// The primary error type for quarry.
#[derive(Error, Debug)]
pub enum QuarryError {
    // ── Configuration ────────────────────────────────────────────────

    /// A relation descriptor string did not match the relation grammar.
    #[error("Invalid relation string specified: {0}")]
    InvalidRelationString(String),

    /// A relation definition is missing one of its mandatory fields.
    #[error("Missing \"{field}\" for relation \"{relation}\" in the \"{table}\" table")]
    MissingRelationField {
        /// The missing field (`type`, `table`, `from` or `to`).
        field: String,
        /// The relation name.
        relation: String,
        /// The table that owns the relation.
        table: String,
    },

    /// A relation definition is structurally invalid (bad kind, bad field type).
    #[error("Invalid relation \"{relation}\": {message}")]
    InvalidRelation {
        /// The fully qualified relation name (`table.relation`).
        relation: String,
        /// What is wrong with it.
        message: String,
    },

    /// A relation name was requested that the table does not define.
    #[error("Invalid relation \"{relation}\" requested for the \"{table}\" table")]
    UnknownRelation {
        /// The table that was asked.
        table: String,
        /// The relation name.
        relation: String,
    },

    /// A name could not be resolved as a column or virtual column.
    #[error("Invalid column specified for the \"{table}\" table: {column}")]
    UnknownColumn {
        /// The table that was searched.
        table: String,
        /// The unresolved name.
        column: String,
    },

    /// An `@name` reference did not name a defined column set.
    #[error("Invalid column set specified for the \"{table}\" table: @{set}")]
    UnknownColumnSet {
        /// The table that was searched.
        table: String,
        /// The unresolved set name (without the `@`).
        set: String,
    },

    /// Column sets reference each other in a loop.
    #[error("Column set \"@{set}\" in the \"{table}\" table refers to itself")]
    ColumnSetCycle {
        /// The table owning the sets.
        table: String,
        /// The set at which the cycle was detected.
        set: String,
    },

    /// A column specification could not be parsed.
    #[error("Invalid column specification for the \"{table}\" table: {message}")]
    InvalidColumnSpec {
        /// The table owning the column.
        table: String,
        /// What is wrong with it.
        message: String,
    },

    /// A builder component definition was rejected by the registry.
    #[error("Invalid query builder component \"{method}\": {message}")]
    InvalidComponent {
        /// The method name the component tried to claim.
        method: String,
        /// Why it was rejected.
        message: String,
    },

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ── Invocation ───────────────────────────────────────────────────

    /// A builder method was called with an argument shape it does not accept.
    #[error("{message}")]
    InvalidArgument {
        /// The builder method.
        method: String,
        /// The argument shape tag (`string`, `array`, `object`, ...).
        shape: String,
        /// The rendered message template.
        message: String,
    },

    /// A builder component rejected an argument for a semantic reason.
    #[error("{message}")]
    ComponentError {
        /// The builder method.
        method: String,
        /// The rendered message template.
        message: String,
    },

    /// A builder method was invoked that no component is registered for.
    #[error("Invalid query builder method: {0}")]
    UnknownMethod(String),

    /// Open placeholders in a statement did not match the supplied values.
    #[error("Statement expects {expected} placeholder value(s) but {found} were supplied")]
    UnboundPlaceholders {
        /// Number of open placeholders in the statement.
        expected: usize,
        /// Number of values supplied.
        found: usize,
    },

    // ── Data shape ───────────────────────────────────────────────────

    /// A query returned a different number of rows than required.
    #[error("{expected} expected, {found} returned: {context}")]
    UnexpectedRowCount {
        /// Human description of what was expected (e.g. "One row").
        expected: String,
        /// Number of rows actually returned.
        found: usize,
        /// What was being fetched.
        context: String,
    },

    /// The source row of a relation has no value for the local key.
    #[error("No \"{column}\" value in the source row for relation \"{relation}\"")]
    UndefinedKey {
        /// The fully qualified relation name.
        relation: String,
        /// The local key column.
        column: String,
    },

    // ── Database ─────────────────────────────────────────────────────

    /// A generic database error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// An operational database error (connection failure, etc.).
    #[error("Operational error: {0}")]
    OperationalError(String),

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl QuarryError {
    /// Returns the category this error belongs to.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRelationString(_)
            | Self::MissingRelationField { .. }
            | Self::InvalidRelation { .. }
            | Self::UnknownRelation { .. }
            | Self::UnknownColumn { .. }
            | Self::UnknownColumnSet { .. }
            | Self::ColumnSetCycle { .. }
            | Self::InvalidColumnSpec { .. }
            | Self::InvalidComponent { .. }
            | Self::ConfigurationError(_) => ErrorKind::Configuration,
            Self::InvalidArgument { .. }
            | Self::ComponentError { .. }
            | Self::UnknownMethod(_)
            | Self::UnboundPlaceholders { .. } => ErrorKind::Invocation,
            Self::UnexpectedRowCount { .. } | Self::UndefinedKey { .. } => ErrorKind::DataShape,
            Self::DatabaseError(_)
            | Self::OperationalError(_)
            | Self::SerializationError(_)
            | Self::IoError(_) => ErrorKind::Database,
        }
    }

    /// Shorthand for a [`QuarryError::UnexpectedRowCount`] where exactly one
    /// row was required.
    pub fn expected_one(found: usize, context: impl Into<String>) -> Self {
        Self::UnexpectedRowCount {
            expected: "One row".to_string(),
            found,
            context: context.into(),
        }
    }
}

impl From<serde_json::Error> for QuarryError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// A convenience type alias for `Result<T, QuarryError>`.
pub type QuarryResult<T> = Result<T, QuarryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_relation_field_message() {
        let err = QuarryError::MissingRelationField {
            field: "from".into(),
            relation: "orders".into(),
            table: "users".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("\"from\""));
        assert!(msg.contains("orders"));
        assert!(msg.contains("users"));
    }

    #[test]
    fn test_invalid_relation_string_keeps_input() {
        let err = QuarryError::InvalidRelationString("x ==> y.z".into());
        assert_eq!(err.to_string(), "Invalid relation string specified: x ==> y.z");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            QuarryError::InvalidRelationString("x".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            QuarryError::UnknownMethod("frobnicate".into()).kind(),
            ErrorKind::Invocation
        );
        assert_eq!(
            QuarryError::expected_one(2, "users").kind(),
            ErrorKind::DataShape
        );
        assert_eq!(
            QuarryError::DatabaseError("x".into()).kind(),
            ErrorKind::Database
        );
    }

    #[test]
    fn test_expected_one_display() {
        let err = QuarryError::expected_one(0, "users.id = 7");
        assert_eq!(err.to_string(), "One row expected, 0 returned: users.id = 7");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: QuarryError = io_err.into();
        assert_eq!(err.kind(), ErrorKind::Database);
        assert!(err.to_string().contains("file missing"));
    }
}
