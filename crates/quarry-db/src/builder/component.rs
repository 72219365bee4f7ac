//! Builder component definitions.
//!
//! A [`ComponentDef`] describes one builder method: where its fragment is
//! rendered ([`order`](ComponentDef::order)), the keyword that introduces
//! it, the joiner placed between the tokens of repeated calls, and one
//! resolver per argument shape. Resolvers turn an argument into tokens and
//! may bind values through the [`Resolution`] they are handed.
//!
//! # Examples
//!
//! ```
//! use quarry_db::builder::{ComponentDef, ComponentRegistry, QueryBuilder};
//! use quarry_db::dialect::Dialect;
//!
//! let mut registry = ComponentRegistry::with_defaults();
//! registry
//!     .register(
//!         ComponentDef::new("window", 75)
//!             .keyword("WINDOW")
//!             .joiner(", ")
//!             .on_string(|arg, _res| Ok(vec![arg.to_string()]))
//!     )
//!     .unwrap();
//!
//! let mut query = QueryBuilder::with_registry(&registry, Dialect::SQLite);
//! query.call("window", "w AS (PARTITION BY dept)").unwrap();
//! query.from("staff").unwrap();
//! query.select("name").unwrap();
//! assert_eq!(
//!     query.sql(),
//!     "SELECT \"name\" FROM \"staff\" WINDOW w AS (PARTITION BY dept)"
//! );
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use quarry_core::utils::format_template;
use quarry_core::{QuarryError, QuarryResult};

use super::args::{ArgShape, BuilderArg};
use crate::dialect::Dialect;
use crate::value::Value;

/// Marker written into tokens wherever a positional placeholder belongs.
/// Replaced with the dialect's placeholder syntax when the statement is
/// rendered, numbered in final emission order.
pub(crate) const BIND_MARKER: char = '\u{1A}';

/// Default template used when a component has no resolver for a shape.
const INVALID_SHAPE: &str =
    "Invalid {shape} argument specified for query builder \"{method}\" component: {arg}";

/// Template used when argument text contains the bind marker itself.
const RESERVED_MARKER: &str =
    "Argument for query builder \"{method}\" component contains the reserved character U+001A: {arg}";

/// Default template used for semantic failures without a specific message.
const INVALID_ARGUMENT: &str =
    "Invalid argument specified for query builder \"{method}\" component: {arg}";

/// A resolver for strings: receives the string itself.
pub type StringResolver = Arc<dyn Fn(&str, &mut Resolution<'_>) -> QuarryResult<Vec<String>> + Send + Sync>;

/// A resolver for arrays: receives the items.
pub type ArrayResolver =
    Arc<dyn Fn(&[Value], &mut Resolution<'_>) -> QuarryResult<Vec<String>> + Send + Sync>;

/// A resolver for objects: receives the ordered pairs.
pub type ObjectResolver =
    Arc<dyn Fn(&[(String, Value)], &mut Resolution<'_>) -> QuarryResult<Vec<String>> + Send + Sync>;

/// A resolver for calls without an argument.
pub type NoneResolver = Arc<dyn Fn(&mut Resolution<'_>) -> QuarryResult<Vec<String>> + Send + Sync>;

/// The per-shape resolver table of a component.
#[derive(Clone, Default)]
pub struct Resolvers {
    pub(crate) none: Option<NoneResolver>,
    pub(crate) string: Option<StringResolver>,
    pub(crate) array: Option<ArrayResolver>,
    pub(crate) object: Option<ObjectResolver>,
    pub(crate) raw: Option<StringResolver>,
}

impl Resolvers {
    /// Returns `true` if no resolver is present.
    pub const fn is_empty(&self) -> bool {
        self.none.is_none()
            && self.string.is_none()
            && self.array.is_none()
            && self.object.is_none()
            && self.raw.is_none()
    }

    /// Returns the shapes this table can resolve.
    pub fn shapes(&self) -> Vec<ArgShape> {
        let mut shapes = Vec::new();
        if self.none.is_some() {
            shapes.push(ArgShape::None);
        }
        if self.string.is_some() {
            shapes.push(ArgShape::String);
        }
        if self.array.is_some() {
            shapes.push(ArgShape::Array);
        }
        if self.object.is_some() {
            shapes.push(ArgShape::Object);
        }
        if self.raw.is_some() {
            shapes.push(ArgShape::Raw);
        }
        shapes
    }
}

/// The immutable definition of a builder component.
#[derive(Clone)]
pub struct ComponentDef {
    method: String,
    order: u8,
    keyword: String,
    joiner: String,
    closing: String,
    replace: bool,
    resolvers: Resolvers,
    messages: HashMap<String, String>,
}

impl fmt::Debug for ComponentDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDef")
            .field("method", &self.method)
            .field("order", &self.order)
            .field("keyword", &self.keyword)
            .field("joiner", &self.joiner)
            .field("closing", &self.closing)
            .field("replace", &self.replace)
            .field("shapes", &self.resolvers.shapes())
            .finish_non_exhaustive()
    }
}

impl ComponentDef {
    /// Starts a definition for `method`, rendered at position `order`
    /// (0..=100, lower first).
    pub fn new(method: impl Into<String>, order: u8) -> Self {
        Self {
            method: method.into(),
            order,
            keyword: String::new(),
            joiner: " ".to_string(),
            closing: String::new(),
            replace: false,
            resolvers: Resolvers::default(),
            messages: HashMap::new(),
        }
    }

    /// Sets the keyword emitted once before the component's tokens.
    #[must_use]
    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = keyword.into();
        self
    }

    /// Sets the string placed between tokens.
    #[must_use]
    pub fn joiner(mut self, joiner: impl Into<String>) -> Self {
        self.joiner = joiner.into();
        self
    }

    /// Sets text emitted once after the component's tokens (e.g. `)`).
    #[must_use]
    pub fn closing(mut self, closing: impl Into<String>) -> Self {
        self.closing = closing.into();
        self
    }

    /// Makes each call replace the tokens of earlier calls instead of
    /// accumulating after them.
    #[must_use]
    pub const fn replace_previous(mut self) -> Self {
        self.replace = true;
        self
    }

    /// Adds a message template under `tag`. Templates may use `{method}`,
    /// `{shape}`, `{arg}` and any variables the resolver passes.
    #[must_use]
    pub fn message(mut self, tag: impl Into<String>, template: impl Into<String>) -> Self {
        self.messages.insert(tag.into(), template.into());
        self
    }

    /// Sets the resolver for calls without an argument.
    #[must_use]
    pub fn on_none<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Resolution<'_>) -> QuarryResult<Vec<String>> + Send + Sync + 'static,
    {
        self.resolvers.none = Some(Arc::new(f));
        self
    }

    /// Sets the resolver for string arguments.
    #[must_use]
    pub fn on_string<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &mut Resolution<'_>) -> QuarryResult<Vec<String>> + Send + Sync + 'static,
    {
        self.resolvers.string = Some(Arc::new(f));
        self
    }

    /// Sets the resolver for array arguments.
    #[must_use]
    pub fn on_array<F>(mut self, f: F) -> Self
    where
        F: Fn(&[Value], &mut Resolution<'_>) -> QuarryResult<Vec<String>> + Send + Sync + 'static,
    {
        self.resolvers.array = Some(Arc::new(f));
        self
    }

    /// Sets the resolver for object arguments.
    #[must_use]
    pub fn on_object<F>(mut self, f: F) -> Self
    where
        F: Fn(&[(String, Value)], &mut Resolution<'_>) -> QuarryResult<Vec<String>>
            + Send
            + Sync
            + 'static,
    {
        self.resolvers.object = Some(Arc::new(f));
        self
    }

    /// Sets the resolver for raw SQL arguments.
    #[must_use]
    pub fn on_raw<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &mut Resolution<'_>) -> QuarryResult<Vec<String>> + Send + Sync + 'static,
    {
        self.resolvers.raw = Some(Arc::new(f));
        self
    }

    /// Accepts raw SQL arguments verbatim.
    #[must_use]
    pub fn raw_verbatim(self) -> Self {
        self.on_raw(|sql, _| Ok(vec![sql.to_string()]))
    }

    /// The method name this component is bound to.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The render position.
    pub const fn order(&self) -> u8 {
        self.order
    }

    /// The introducing keyword (may be empty).
    pub fn keyword_str(&self) -> &str {
        &self.keyword
    }

    /// The token joiner.
    pub fn joiner_str(&self) -> &str {
        &self.joiner
    }

    /// Whether a call discards the tokens of earlier calls.
    pub const fn replaces_previous(&self) -> bool {
        self.replace
    }

    /// The resolver table.
    pub const fn resolvers(&self) -> &Resolvers {
        &self.resolvers
    }

    /// Returns the message template registered under `tag`.
    pub fn message_template(&self, tag: &str) -> Option<&str> {
        self.messages.get(tag).map(String::as_str)
    }

    /// Resolves one argument into tokens and bound slots.
    pub fn resolve(&self, arg: &BuilderArg, dialect: Dialect) -> QuarryResult<Resolved> {
        let mut res = Resolution {
            def: self,
            dialect,
            arg,
            slots: Vec::new(),
        };
        let tokens = res.dispatch(arg)?;
        let markers: usize = tokens.iter().map(|t| t.matches(BIND_MARKER).count()).sum();
        if markers != res.slots.len() {
            let described = arg.describe();
            return Err(QuarryError::InvalidArgument {
                method: self.method.clone(),
                shape: arg.shape().tag().to_string(),
                message: format_template(
                    RESERVED_MARKER,
                    &[("method", self.method.as_str()), ("arg", described.as_str())],
                ),
            });
        }
        Ok(Resolved {
            tokens,
            slots: res.slots,
        })
    }

    /// Renders the fragment for this component's accumulated tokens.
    pub(crate) fn render(&self, tokens: &[String]) -> String {
        let body = tokens.join(&self.joiner);
        let mut out = String::new();
        if !self.keyword.is_empty() {
            out.push_str(&self.keyword);
            if !self.keyword.ends_with('(') {
                out.push(' ');
            }
        }
        out.push_str(&body);
        out.push_str(&self.closing);
        out
    }
}

/// A placeholder slot in a rendered statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// The value is known.
    Bound(Value),
    /// The value must be supplied when the statement is executed.
    Open,
}

/// The output of resolving a single argument.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Resolved {
    /// Tokens appended to the method's fragment list.
    pub tokens: Vec<String>,
    /// Placeholder slots, in the order their markers appear in `tokens`.
    pub slots: Vec<Slot>,
}

/// The context handed to resolvers while a single argument is resolved.
///
/// Resolvers must request placeholders ([`bind`](Self::bind),
/// [`placeholder`](Self::placeholder)) in the same order the returned
/// markers appear in their tokens.
pub struct Resolution<'a> {
    def: &'a ComponentDef,
    dialect: Dialect,
    arg: &'a BuilderArg,
    slots: Vec<Slot>,
}

impl Resolution<'_> {
    /// The method being resolved.
    pub fn method(&self) -> &str {
        &self.def.method
    }

    /// The dialect the statement will be rendered in.
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Quotes an identifier path for the current dialect.
    pub fn quote(&self, path: &str) -> String {
        self.dialect.quote_path(path)
    }

    /// Binds a value and returns the placeholder marker to embed in a token.
    pub fn bind(&mut self, value: Value) -> String {
        self.slots.push(Slot::Bound(value));
        BIND_MARKER.to_string()
    }

    /// Records an open placeholder, filled at execution time, and returns
    /// its marker.
    pub fn placeholder(&mut self) -> String {
        self.slots.push(Slot::Open);
        BIND_MARKER.to_string()
    }

    /// Resolves a nested argument through this same component, e.g. an
    /// object resolver delegating each pair to the array resolver.
    pub fn resolve_nested(&mut self, arg: &BuilderArg) -> QuarryResult<Vec<String>> {
        self.dispatch(arg)
    }

    /// Builds a [`QuarryError::ComponentError`] from the component's message
    /// template registered under `tag`.
    ///
    /// `{method}` and `{arg}` are always available to the template.
    pub fn fail(&self, tag: &str, vars: &[(&str, &str)]) -> QuarryError {
        let template = self.def.message_template(tag).unwrap_or(INVALID_ARGUMENT);
        let arg = self.arg.describe();
        let mut all = vec![("method", self.def.method.as_str()), ("arg", arg.as_str())];
        all.extend_from_slice(vars);
        QuarryError::ComponentError {
            method: self.def.method.clone(),
            message: format_template(template, &all),
        }
    }

    fn dispatch(&mut self, arg: &BuilderArg) -> QuarryResult<Vec<String>> {
        let def = self.def;
        let resolvers = &def.resolvers;
        let tokens = match arg {
            BuilderArg::None => resolvers.none.as_ref().map(|f| f(self)),
            BuilderArg::String(s) => resolvers.string.as_ref().map(|f| f(s, self)),
            BuilderArg::Array(items) => resolvers.array.as_ref().map(|f| f(items, self)),
            BuilderArg::Object(pairs) => resolvers.object.as_ref().map(|f| f(pairs, self)),
            BuilderArg::Raw(sql) => resolvers.raw.as_ref().map(|f| f(sql, self)),
        };
        tokens.unwrap_or_else(|| Err(invalid_shape(def, arg)))
    }
}

fn invalid_shape(def: &ComponentDef, arg: &BuilderArg) -> QuarryError {
    let shape = arg.shape();
    let template = def.message_template(shape.tag()).unwrap_or(INVALID_SHAPE);
    let described = arg.describe();
    QuarryError::InvalidArgument {
        method: def.method.clone(),
        shape: shape.tag().to_string(),
        message: format_template(
            template,
            &[
                ("method", def.method.as_str()),
                ("shape", shape.tag()),
                ("arg", described.as_str()),
            ],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::ErrorKind;

    fn echo() -> ComponentDef {
        ComponentDef::new("echo", 50)
            .keyword("ECHO")
            .joiner(" + ")
            .on_string(|s, _| Ok(vec![s.to_string()]))
            .on_array(|items, res| {
                if items.len() != 2 {
                    let n = items.len().to_string();
                    return Err(res.fail("length", &[("n", n.as_str())]));
                }
                let marker = res.bind(items[1].clone());
                Ok(vec![format!("{} = {marker}", res.quote(&items[0].to_string()))])
            })
            .on_object(|pairs, res| {
                let mut tokens = Vec::new();
                for (k, v) in pairs {
                    let nested = BuilderArg::Array(vec![Value::from(k.as_str()), v.clone()]);
                    tokens.extend(res.resolve_nested(&nested)?);
                }
                Ok(tokens)
            })
            .message("length", "{method} wants two items, got {n}: {arg}")
    }

    #[test]
    fn test_resolve_string() {
        let out = echo().resolve(&"hi".into(), Dialect::SQLite).unwrap();
        assert_eq!(out.tokens, ["hi"]);
        assert!(out.slots.is_empty());
    }

    #[test]
    fn test_resolve_binds_in_order() {
        let arg = BuilderArg::object([("a", 1), ("b", 2)]);
        let out = echo().resolve(&arg, Dialect::SQLite).unwrap();
        assert_eq!(out.tokens.len(), 2);
        assert_eq!(
            out.slots,
            [Slot::Bound(Value::Int(1)), Slot::Bound(Value::Int(2))]
        );
        assert!(out.tokens[0].starts_with("\"a\" = "));
    }

    #[test]
    fn test_missing_shape_uses_default_template() {
        let err = echo().resolve(&BuilderArg::raw("x"), Dialect::SQLite).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invocation);
        assert_eq!(
            err.to_string(),
            "Invalid raw argument specified for query builder \"echo\" component: SQL <x>"
        );
    }

    #[test]
    fn test_semantic_failure_uses_component_template() {
        let err = echo()
            .resolve(&BuilderArg::array(["a", "b", "c"]), Dialect::SQLite)
            .unwrap_err();
        assert_eq!(err.to_string(), "echo wants two items, got 3: [a, b, c]");
    }

    #[test]
    fn test_marker_in_argument_text_rejected() {
        let err = echo()
            .resolve(&"'a\u{1A}b'".into(), Dialect::PostgreSQL)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invocation);
        assert!(err.to_string().contains("U+001A"));
    }

    #[test]
    fn test_render() {
        let def = echo();
        assert_eq!(def.render(&["a".into(), "b".into()]), "ECHO a + b");
        let paren = ComponentDef::new("cols", 1).keyword("(").joiner(", ").closing(")");
        assert_eq!(paren.render(&["a".into(), "b".into()]), "(a, b)");
        let bare = ComponentDef::new("bare", 1);
        assert_eq!(bare.render(&["x".into()]), "x");
    }

    #[test]
    fn test_debug_lists_shapes() {
        let dbg = format!("{:?}", echo());
        assert!(dbg.contains("\"echo\""));
        assert!(dbg.contains("String"));
    }
}
