//! Error types for datacore
//!
//! Two classes, mirroring the two phases of the engine's life:
//!
//! - [`SchemaError`] — configuration errors, detected while building the
//!   registry or validating the dependency graph. Fatal: a database is never
//!   constructed from a schema that produced one.
//! - [`ResolveError`] — runtime errors surfaced to the caller of a field
//!   resolution. These are `Clone` so a cached failure can be re-raised to
//!   every waiter without re-running the computation.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for registry/graph construction
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type alias for runtime field resolution
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Configuration errors: raised once, at startup, never at evaluation time
#[derive(Error, Debug)]
pub enum SchemaError {
    /// A type name was registered twice
    #[error("duplicate type '{name}'")]
    DuplicateType { name: String },

    /// A referenced type is not in the registry
    #[error("unknown type '{name}' referenced by {referenced_by}")]
    UnknownType {
        name: String,
        referenced_by: String,
    },

    /// A subtype redeclared a field already present on an ancestor
    #[error("field '{field}' on '{type_name}' collides with '{ancestor}'")]
    FieldNameCollision {
        type_name: String,
        field: String,
        ancestor: String,
    },

    /// A source chain failed registration-time checking
    #[error("invalid source chain on {type_name}.{field}: {message}")]
    InvalidChain {
        type_name: String,
        field: String,
        message: String,
    },

    /// The dependency graph contains a cycle; `path` names every hop
    #[error("cyclic field dependency: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    /// A type extends itself through its ancestor chain
    #[error("inheritance cycle: {}", path.join(" -> "))]
    InheritanceCycle { path: Vec<String> },

    /// A direct-derived fallback named both a literal and a getter, or neither
    #[error("ambiguous default on {type_name}.{field}: exactly one of 'default' or 'defaultGetter' must be configured")]
    AmbiguousDefault { type_name: String, field: String },

    /// An abstract type was asked to produce an instance
    #[error("cannot instantiate abstract type '{name}'")]
    AbstractInstantiation { name: String },

    /// A field's data core configuration violates a structural invariant
    #[error("invalid data core on {type_name}.{field}: {message}")]
    InvalidDataCore {
        type_name: String,
        field: String,
        message: String,
    },

    /// A field definition violates a structural invariant
    #[error("invalid field {type_name}.{field}: {message}")]
    InvalidField {
        type_name: String,
        field: String,
        message: String,
    },

    /// A derived field or getter fallback has no registered host function
    #[error("no {kind} registered for {type_name}.{field}")]
    MissingComputation {
        type_name: String,
        field: String,
        /// "computation" or "default getter"
        kind: &'static str,
    },

    /// Seeding a new instance with initial values failed
    #[error("seeding {type_name}.{field} failed: {source}")]
    InvalidSeed {
        type_name: String,
        field: String,
        source: ResolveError,
    },

    /// A schema file could not be decoded
    #[error("invalid schema in {file}: {message}")]
    InvalidSchema { file: PathBuf, message: String },

    /// Schema directory not found
    #[error("directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// IO error while loading schema files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runtime resolution errors: surfaced per field access, never swallowed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// A non-nullable mid-chain hop produced null
    #[error("broken chain at {type_name}.{field}: null in non-nullable hop")]
    BrokenChain { type_name: String, field: String },

    /// Instance-static lookup found no default instance for the type
    #[error("no default instance configured for type '{type_name}'")]
    NoDefaultConfigured { type_name: String },

    /// Instance-static lookup found no special instance for the key
    #[error("no special instance '{key}' configured for type '{type_name}'")]
    NoSpecialInstance { type_name: String, key: String },

    /// A required stored field was read before any write
    #[error("required field {type_name}.{field} was never set")]
    UnsetRequiredField { type_name: String, field: String },

    /// Defensive runtime backstop; startup validation should make this unreachable
    #[error("cyclic resolution: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    /// A second instance claimed the type's default slot
    #[error("default instance for '{type_name}' already claimed")]
    DuplicateDefault { type_name: String },

    /// A second instance claimed a special key
    #[error("special instance '{key}' for '{type_name}' already claimed")]
    DuplicateSpecial { type_name: String, key: String },

    /// The instance id does not exist in this database
    #[error("unknown instance {0}")]
    UnknownInstance(u64),

    /// The field is not declared on the instance's type or its ancestors
    #[error("unknown field '{field}' on type '{type_name}'")]
    UnknownField { type_name: String, field: String },

    /// A write targeted a derived field
    #[error("{type_name}.{field} is derived and cannot be written")]
    NotStoredField { type_name: String, field: String },

    /// Null written to, or produced for, a non-nullable field
    #[error("null is not allowed for {type_name}.{field}")]
    NullNotAllowed { type_name: String, field: String },

    /// A host-supplied computation reported a failure
    #[error("computation for {type_name}.{field} failed: {message}")]
    ComputationFailed {
        type_name: String,
        field: String,
        message: String,
    },

    /// A value does not fit the field it was written to or produced for
    #[error("value mismatch on {type_name}.{field}: {message}")]
    ValueMismatch {
        type_name: String,
        field: String,
        message: String,
    },
}
