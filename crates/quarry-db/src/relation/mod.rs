//! Relations between tables.
//!
//! - [`spec`] - descriptor parsing and normalisation into [`RelationSpec`]
//! - [`resolver`] - correlated predicates and relation loading

pub mod resolver;
pub mod spec;

pub use resolver::{
    load_relation, reduce_map, relation_query, resolve_relation, MapEntry, RelationContext,
    RelationLoader, RelationValue,
};
pub use spec::{
    parse_relation_string, relation_config, ParsedRelation, RelationConfig, RelationKind,
    RelationSpec,
};
