//! datacore - schema-driven field derivation and dependency resolution
//!
//! Entity types and their fields are described declaratively in JSON
//! schema files. Fields either store a value written by the host or carry
//! a data core: a strategy that derives the value from a literal, a
//! singleton registry, a chain of hops across related instances, a
//! host-supplied computation, or the instance table itself (list fields).
//!
//! The engine validates the whole configuration once at startup (type and
//! field invariants, chain binding, dependency cycles) and then serves
//! reads demand-driven: per-(instance, field) memoization, one in-flight
//! computation per entry under concurrency, and write-through invalidation
//! along the dependency graph.

pub mod chain;
pub mod error;
pub mod graph;
pub mod models;
pub mod parser;
pub mod registry;
pub mod runtime;

// Re-exports for convenience
pub use chain::{ChainOutcome, SourceChain};
pub use error::{ResolveError, ResolveResult, SchemaError, SchemaResult};
pub use graph::{DependencyGraph, NodeId};
pub use parser::{load_registry, parse_directory, parse_file};
pub use registry::{
    DataCore, EntityType, Fallback, FieldDef, FieldType, PrimitiveKind, TypeRegistry,
};
pub use runtime::defaults::DefaultRegistry;
pub use runtime::instance::InstanceId;
pub use runtime::resolver::ResolveCtx;
pub use runtime::value::Value;
pub use runtime::{Database, DatabaseBuilder, HostFn};
