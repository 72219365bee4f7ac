//! SQL dialects.
//!
//! The builder itself is dialect-neutral; the [`Dialect`] decides how
//! identifiers are quoted and how positional placeholders are spelled when a
//! statement is rendered.

use std::fmt;
use std::str::FromStr;

use quarry_core::QuarryError;

/// The SQL dialect a statement is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// PostgreSQL (uses `$1, $2, ...` placeholders).
    PostgreSQL,
    /// SQLite (uses `?` placeholders).
    #[default]
    SQLite,
    /// MySQL (uses `?` placeholders and backtick quoting).
    MySQL,
}

impl Dialect {
    /// Returns the identifier quote character.
    pub const fn quote_char(self) -> char {
        match self {
            Self::MySQL => '`',
            Self::PostgreSQL | Self::SQLite => '"',
        }
    }

    /// Quotes a single identifier, doubling any embedded quote characters.
    ///
    /// ```
    /// use quarry_db::dialect::Dialect;
    ///
    /// assert_eq!(Dialect::SQLite.quote_ident("users"), "\"users\"");
    /// assert_eq!(Dialect::MySQL.quote_ident("users"), "`users`");
    /// ```
    pub fn quote_ident(self, name: &str) -> String {
        let q = self.quote_char();
        let escaped = name.replace(q, &format!("{q}{q}"));
        format!("{q}{escaped}{q}")
    }

    /// Quotes a dotted identifier path such as `users.id` or `users.*`.
    ///
    /// Anything that is not a plain identifier path (an expression, a
    /// function call, an already-quoted name) is returned verbatim.
    ///
    /// ```
    /// use quarry_db::dialect::Dialect;
    ///
    /// let d = Dialect::SQLite;
    /// assert_eq!(d.quote_path("users.id"), "\"users\".\"id\"");
    /// assert_eq!(d.quote_path("users.*"), "\"users\".*");
    /// assert_eq!(d.quote_path("*"), "*");
    /// assert_eq!(d.quote_path("COUNT(*)"), "COUNT(*)");
    /// ```
    pub fn quote_path(self, path: &str) -> String {
        let parts: Vec<&str> = path.split('.').collect();
        let plain = parts
            .iter()
            .enumerate()
            .all(|(i, p)| quarry_core::utils::is_identifier(p) || (*p == "*" && i == parts.len() - 1));
        if !plain {
            return path.to_string();
        }
        parts
            .iter()
            .map(|p| if *p == "*" { "*".to_string() } else { self.quote_ident(p) })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Returns the positional placeholder for the given 1-based index.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Self::PostgreSQL => format!("${index}"),
            Self::SQLite | Self::MySQL => "?".to_string(),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PostgreSQL => write!(f, "postgres"),
            Self::SQLite => write!(f, "sqlite"),
            Self::MySQL => write!(f, "mysql"),
        }
    }
}

impl FromStr for Dialect {
    type Err = QuarryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::PostgreSQL),
            "sqlite" | "sqlite3" => Ok(Self::SQLite),
            "mysql" | "mariadb" => Ok(Self::MySQL),
            _ => Err(QuarryError::ConfigurationError(format!(
                "Unknown SQL dialect: {s}"
            ))),
        }
    }
}
