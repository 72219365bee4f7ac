//! Builder method arguments.
//!
//! Every builder method takes a single [`BuilderArg`]. The argument's
//! [`ArgShape`] selects which resolver of the component handles it, so a
//! component can treat `"a b c"`, `["a", 10]` and `{a: 10}` differently.

use std::fmt;

use crate::value::Value;

/// The shape tag of a builder argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgShape {
    /// The method was called with no argument.
    None,
    /// A string, usually a whitespace or comma separated list of names.
    String,
    /// A positional list of values.
    Array,
    /// Ordered `key: value` pairs.
    Object,
    /// A verbatim SQL fragment.
    Raw,
}

impl ArgShape {
    /// Returns the tag used in message templates (`string`, `array`, ...).
    pub const fn tag(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
            Self::Raw => "raw",
        }
    }
}

impl fmt::Display for ArgShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A single argument passed to a builder method.
///
/// # Examples
///
/// ```
/// use quarry_db::builder::{ArgShape, BuilderArg};
/// use quarry_db::value::Value;
///
/// assert_eq!(BuilderArg::from("id name").shape(), ArgShape::String);
/// assert_eq!(BuilderArg::array(["id", ">"]).shape(), ArgShape::Array);
/// assert_eq!(BuilderArg::object([("id", 10)]).shape(), ArgShape::Object);
/// assert_eq!(BuilderArg::raw("COUNT(*) AS n").shape(), ArgShape::Raw);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BuilderArg {
    /// No argument.
    #[default]
    None,
    /// A string argument.
    String(String),
    /// An array argument.
    Array(Vec<Value>),
    /// An object argument, as ordered pairs.
    Object(Vec<(String, Value)>),
    /// Verbatim SQL.
    Raw(String),
}

impl BuilderArg {
    /// Creates a verbatim SQL argument.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(sql.into())
    }

    /// Creates an array argument from anything convertible to values.
    pub fn array<V, I>(items: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self::Array(items.into_iter().map(Into::into).collect())
    }

    /// Creates an object argument from `(key, value)` pairs.
    pub fn object<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Object(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Returns the shape tag of this argument.
    pub const fn shape(&self) -> ArgShape {
        match self {
            Self::None => ArgShape::None,
            Self::String(_) => ArgShape::String,
            Self::Array(_) => ArgShape::Array,
            Self::Object(_) => ArgShape::Object,
            Self::Raw(_) => ArgShape::Raw,
        }
    }

    /// Returns a short human-readable summary of the argument, used in
    /// error messages.
    ///
    /// ```
    /// use quarry_db::builder::BuilderArg;
    ///
    /// assert_eq!(BuilderArg::array(["a", "b", "c"]).describe(), "[a, b, c]");
    /// assert_eq!(BuilderArg::object([("x", 1)]).describe(), "{ x: 1 }");
    /// ```
    pub fn describe(&self) -> String {
        match self {
            Self::None => "no argument".to_string(),
            Self::String(s) => format!("\"{s}\""),
            Self::Array(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                format!("[{}]", parts.join(", "))
            }
            Self::Object(pairs) => {
                let parts: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                format!("{{ {} }}", parts.join(", "))
            }
            Self::Raw(sql) => format!("SQL <{sql}>"),
        }
    }
}

impl From<&str> for BuilderArg {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for BuilderArg {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&String> for BuilderArg {
    fn from(s: &String) -> Self {
        Self::String(s.clone())
    }
}

impl From<i64> for BuilderArg {
    fn from(n: i64) -> Self {
        Self::String(n.to_string())
    }
}

impl From<usize> for BuilderArg {
    fn from(n: usize) -> Self {
        Self::String(n.to_string())
    }
}

impl From<Vec<Value>> for BuilderArg {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl From<Vec<(String, Value)>> for BuilderArg {
    fn from(pairs: Vec<(String, Value)>) -> Self {
        Self::Object(pairs)
    }
}

impl From<()> for BuilderArg {
    fn from((): ()) -> Self {
        Self::None
    }
}

/// Splits a string argument into tokens on whitespace and commas.
///
/// ```
/// use quarry_db::builder::split_tokens;
///
/// assert_eq!(split_tokens("id, name  email"), ["id", "name", "email"]);
/// assert!(split_tokens(" , ").is_empty());
/// ```
pub fn split_tokens(s: &str) -> Vec<String> {
    s.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes() {
        assert_eq!(BuilderArg::None.shape(), ArgShape::None);
        assert_eq!(BuilderArg::from(()).shape(), ArgShape::None);
        assert_eq!(BuilderArg::from(10_i64), BuilderArg::String("10".into()));
        assert_eq!(BuilderArg::from(vec![Value::Int(1)]).shape(), ArgShape::Array);
    }

    #[test]
    fn test_shape_tags() {
        assert_eq!(ArgShape::String.tag(), "string");
        assert_eq!(ArgShape::Object.to_string(), "object");
    }

    #[test]
    fn test_describe() {
        assert_eq!(BuilderArg::None.describe(), "no argument");
        assert_eq!(BuilderArg::from("a b").describe(), "\"a b\"");
        assert_eq!(BuilderArg::raw("1=1").describe(), "SQL <1=1>");
    }

    #[test]
    fn test_split_tokens_keeps_expressions() {
        assert_eq!(split_tokens("COUNT(*)\tname"), ["COUNT(*)", "name"]);
    }
}
