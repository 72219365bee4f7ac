//! The extensible query builder.
//!
//! - [`args`] - builder arguments and their shapes
//! - [`component`] - component definitions and the resolution context
//! - [`components`] - the built-in components
//! - [`registry`] - the component registry
//! - [`query`] - the per-query builder and rendered statements

pub mod args;
pub mod component;
pub mod components;
pub mod query;
pub mod registry;

pub use args::{split_tokens, ArgShape, BuilderArg};
pub use component::{ComponentDef, Resolution, Resolved, Slot};
pub use components::BUILTIN_METHODS;
pub use query::{QueryBuilder, Statement};
pub use registry::{lookup, register, snapshot, ComponentRegistry, DispatchTable};
