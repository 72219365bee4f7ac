//! The component registry.
//!
//! A [`ComponentRegistry`] maps method names to [`ComponentDef`]s. One
//! process-wide registry is pre-populated with the built-in components and
//! can be extended with [`register`]; builders created with
//! [`QueryBuilder::new`](super::QueryBuilder::new) take a [`snapshot`] of it.
//!
//! Registration is meant to happen during setup. A builder keeps the
//! snapshot it was created with, so registering later never affects a
//! builder that is already accumulating fragments.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use quarry_core::utils::is_identifier;
use quarry_core::{QuarryError, QuarryResult};

use super::component::ComponentDef;
use super::components::{builtin_components, BUILTIN_METHODS};

/// Method names reserved by the builder itself.
pub const RESERVED_METHODS: &[&str] = &["sql", "build", "call", "bind", "render", "dialect"];

/// Highest accepted render position.
pub const MAX_ORDER: u8 = 100;

/// A registered component together with its registration sequence number,
/// used to break ties between equal `order`s.
#[derive(Debug, Clone)]
pub struct Registered {
    pub(crate) def: Arc<ComponentDef>,
    pub(crate) seq: usize,
}

impl Registered {
    /// The component definition.
    pub fn def(&self) -> &ComponentDef {
        &self.def
    }

    /// The registration sequence number.
    pub const fn seq(&self) -> usize {
        self.seq
    }
}

/// An immutable method-to-component table.
#[derive(Debug, Clone, Default)]
pub struct DispatchTable {
    entries: HashMap<String, Registered>,
}

impl DispatchTable {
    /// Looks up the component bound to `method`.
    pub fn get(&self, method: &str) -> Option<&Registered> {
        self.entries.get(method)
    }

    /// Returns the number of registered components.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A registry of builder components.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    table: Arc<DispatchTable>,
    next_seq: usize,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in components.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for def in builtin_components() {
            registry.insert(def);
        }
        registry
    }

    /// Registers a component.
    ///
    /// The method must be an identifier that is neither reserved nor a
    /// built-in, `order` must be at most 100 and at least one resolver
    /// must be present. Registering an existing custom method replaces it.
    pub fn register(&mut self, def: ComponentDef) -> QuarryResult<()> {
        validate(&def)?;
        tracing::debug!(
            method = def.method(),
            order = def.order(),
            replaced = self.contains(def.method()),
            "quarry.register_component"
        );
        self.insert(def);
        Ok(())
    }

    /// Looks up a component by method name.
    pub fn lookup(&self, method: &str) -> QuarryResult<Arc<ComponentDef>> {
        self.table
            .get(method)
            .map(|r| Arc::clone(&r.def))
            .ok_or_else(|| QuarryError::UnknownMethod(method.to_string()))
    }

    /// Returns `true` if `method` is registered.
    pub fn contains(&self, method: &str) -> bool {
        self.table.get(method).is_some()
    }

    /// Returns the registered method names, in render order.
    pub fn methods(&self) -> Vec<String> {
        let mut entries: Vec<&Registered> = self.table.entries.values().collect();
        entries.sort_by_key(|r| (r.def.order(), r.seq));
        entries.iter().map(|r| r.def.method().to_string()).collect()
    }

    /// Returns the current dispatch table. Later registrations do not
    /// affect a snapshot already taken.
    pub fn snapshot(&self) -> Arc<DispatchTable> {
        Arc::clone(&self.table)
    }

    fn insert(&mut self, def: ComponentDef) {
        let seq = self.next_seq;
        self.next_seq += 1;
        Arc::make_mut(&mut self.table).entries.insert(
            def.method().to_string(),
            Registered {
                def: Arc::new(def),
                seq,
            },
        );
    }
}

fn validate(def: &ComponentDef) -> QuarryResult<()> {
    let invalid = |message: String| QuarryError::InvalidComponent {
        method: def.method().to_string(),
        message,
    };
    let method = def.method();
    if !is_identifier(method) {
        return Err(invalid(format!(
            "Invalid method name \"{method}\" for query builder component"
        )));
    }
    if RESERVED_METHODS.contains(&method) {
        return Err(invalid(format!(
            "Cannot register query builder component \"{method}\": the name is reserved"
        )));
    }
    if BUILTIN_METHODS.contains(&method) {
        return Err(invalid(format!(
            "Cannot redefine built-in query builder component \"{method}\""
        )));
    }
    if def.order() > MAX_ORDER {
        return Err(invalid(format!(
            "Invalid order {} for query builder component \"{method}\": must be between 0 and {MAX_ORDER}",
            def.order()
        )));
    }
    if def.resolvers().is_empty() {
        return Err(invalid(format!(
            "Query builder component \"{method}\" does not define any argument resolvers"
        )));
    }
    Ok(())
}

// ── Process-wide registry ──────────────────────────────────────────────

fn global_registry() -> &'static RwLock<ComponentRegistry> {
    static REGISTRY: OnceLock<RwLock<ComponentRegistry>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(ComponentRegistry::with_defaults()))
}

/// Registers a component in the process-wide registry.
///
/// # Examples
///
/// ```
/// use quarry_db::builder::{self, ComponentDef, QueryBuilder};
/// use quarry_db::dialect::Dialect;
///
/// builder::register(
///     ComponentDef::new("lock", 95).on_none(|_| Ok(vec!["FOR UPDATE".to_string()])),
/// )
/// .unwrap();
///
/// let mut query = QueryBuilder::new(Dialect::PostgreSQL);
/// query.call("lock", ()).unwrap();
/// query.select("*").unwrap().from("jobs").unwrap();
/// assert_eq!(query.sql(), "SELECT * FROM \"jobs\" FOR UPDATE");
/// ```
pub fn register(def: ComponentDef) -> QuarryResult<()> {
    global_registry()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register(def)
}

/// Looks up a component in the process-wide registry.
pub fn lookup(method: &str) -> QuarryResult<Arc<ComponentDef>> {
    global_registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .lookup(method)
}

/// Returns a snapshot of the process-wide registry.
pub fn snapshot() -> Arc<DispatchTable> {
    global_registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .snapshot()
}
