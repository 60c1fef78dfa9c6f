//! Runtime engine
//!
//! A [`Database`] is the host surface over a validated schema: it owns the
//! instance table, the value cache, the default/special singleton registry
//! and the host-registered computation hooks. Construction runs every
//! startup check (registry invariants, dependency cycles, computation
//! completeness); after [`DatabaseBuilder::build`] returns, the schema side
//! of the engine is immutable and reads need no further validation.
//!
//! ## Flow
//!
//! 1. Register entity types into a [`TypeRegistry`]
//! 2. `Database::builder(registry)` + register computations and getters
//! 3. `build()` — fatal configuration errors end here
//! 4. Create instances, write stored fields, read any field on demand

pub mod cache;
pub mod defaults;
pub mod instance;
pub mod lists;
pub mod resolver;
pub mod value;

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};

use crate::error::{ResolveError, ResolveResult, SchemaError, SchemaResult};
use crate::graph::{DependencyGraph, NodeId};
use crate::registry::{DataCore, Fallback, TypeRegistry};

use self::cache::ValueCache;
use self::defaults::DefaultRegistry;
use self::instance::{InstanceId, InstanceStore};
use self::resolver::ResolveCtx;
use self::value::Value;

/// A host-supplied hook: a derived computation or a default getter.
///
/// Hooks must read other fields through the supplied context, never through
/// a fresh [`Database::get`] call, so re-entrant reads surface as cycle
/// errors instead of blocking on their own cache entry. The declared
/// sources of a derived field are its invalidation contract: a hook may
/// read a subset of them, but reading a field outside them risks stale
/// caches after writes to it.
pub type HostFn =
    Arc<dyn for<'a, 'b> Fn(&'a mut ResolveCtx<'b>, InstanceId) -> ResolveResult<Value> + Send + Sync>;

type HookKey = (String, String);

/// Builder: registry plus host hooks, validated into a [`Database`]
pub struct DatabaseBuilder {
    registry: TypeRegistry,
    computations: HashMap<HookKey, HostFn>,
    default_getters: HashMap<HookKey, HostFn>,
}

impl DatabaseBuilder {
    /// Register the computation backing a derived field
    pub fn computation<F>(mut self, type_name: &str, field: &str, f: F) -> Self
    where
        F: for<'a, 'b> Fn(&'a mut ResolveCtx<'b>, InstanceId) -> ResolveResult<Value>
            + Send
            + Sync
            + 'static,
    {
        self.computations
            .insert((type_name.to_string(), field.to_string()), Arc::new(f));
        self
    }

    /// Register the fallback getter for a direct-derived field
    pub fn default_getter<F>(mut self, type_name: &str, field: &str, f: F) -> Self
    where
        F: for<'a, 'b> Fn(&'a mut ResolveCtx<'b>, InstanceId) -> ResolveResult<Value>
            + Send
            + Sync
            + 'static,
    {
        self.default_getters
            .insert((type_name.to_string(), field.to_string()), Arc::new(f));
        self
    }

    /// Run every startup check and produce the database. All configuration
    /// errors are fatal here; none is deferred to evaluation time.
    pub fn build(self) -> SchemaResult<Database> {
        self.registry.validate()?;

        let graph = DependencyGraph::build(&self.registry)?;
        graph.validate()?;

        for ty in self.registry.types() {
            for field in &ty.fields {
                let key = (ty.name.clone(), field.name.clone());
                match &field.data_core {
                    Some(DataCore::Derived { .. }) if !self.computations.contains_key(&key) => {
                        return Err(SchemaError::MissingComputation {
                            type_name: ty.name.clone(),
                            field: field.name.clone(),
                            kind: "computation",
                        });
                    }
                    Some(DataCore::DirectDerived {
                        fallback: Fallback::Getter,
                        ..
                    }) if !self.default_getters.contains_key(&key) => {
                        return Err(SchemaError::MissingComputation {
                            type_name: ty.name.clone(),
                            field: field.name.clone(),
                            kind: "default getter",
                        });
                    }
                    _ => {}
                }
            }
        }

        debug!(
            "database built: {} types, {} dependency nodes",
            self.registry.len(),
            graph.node_count()
        );

        Ok(Database {
            registry: self.registry,
            graph,
            store: InstanceStore::new(),
            cache: ValueCache::new(),
            defaults: DefaultRegistry::new(),
            computations: self.computations,
            default_getters: self.default_getters,
        })
    }
}

/// The runtime engine over a validated schema
pub struct Database {
    registry: TypeRegistry,
    graph: DependencyGraph,
    store: InstanceStore,
    cache: ValueCache,
    defaults: DefaultRegistry,
    computations: HashMap<HookKey, HostFn>,
    default_getters: HashMap<HookKey, HostFn>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("computations", &self.computations.len())
            .field("default_getters", &self.default_getters.len())
            .finish_non_exhaustive()
    }
}

impl Database {
    pub fn builder(registry: TypeRegistry) -> DatabaseBuilder {
        DatabaseBuilder {
            registry,
            computations: HashMap::new(),
            default_getters: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn defaults(&self) -> &DefaultRegistry {
        &self.defaults
    }

    pub(crate) fn store(&self) -> &InstanceStore {
        &self.store
    }

    pub(crate) fn cache(&self) -> &ValueCache {
        &self.cache
    }

    pub(crate) fn computation(&self, type_name: &str, field: &str) -> Option<HostFn> {
        self.computations
            .get(&(type_name.to_string(), field.to_string()))
            .cloned()
    }

    pub(crate) fn default_getter(&self, type_name: &str, field: &str) -> Option<HostFn> {
        self.default_getters
            .get(&(type_name.to_string(), field.to_string()))
            .cloned()
    }

    /// Create an instance of a concrete type
    pub fn create_instance(
        &self,
        type_name: &str,
        parent: Option<InstanceId>,
    ) -> SchemaResult<InstanceId> {
        let ty = self.registry.resolve(type_name, "create_instance")?;
        if ty.is_abstract {
            return Err(SchemaError::AbstractInstantiation {
                name: ty.name.clone(),
            });
        }
        if let Some(parent_id) = parent {
            if !self.store.contains(parent_id) {
                return Err(SchemaError::InvalidSeed {
                    type_name: ty.name.clone(),
                    field: "parent".to_string(),
                    source: ResolveError::UnknownInstance(parent_id.raw()),
                });
            }
        }
        Ok(self.store.create(&ty.name, parent))
    }

    /// Create an instance and seed its stored fields in one step. A failed
    /// seed removes the instance again.
    pub fn create_instance_with<'a>(
        &self,
        type_name: &str,
        parent: Option<InstanceId>,
        values: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> SchemaResult<InstanceId> {
        let id = self.create_instance(type_name, parent)?;
        for (field, value) in values {
            if let Err(source) = self.set(id, field, value) {
                self.store.remove(id);
                return Err(SchemaError::InvalidSeed {
                    type_name: type_name.to_string(),
                    field: field.to_string(),
                    source,
                });
            }
        }
        Ok(id)
    }

    /// Write a stored field. Serialized per instance; every dependent
    /// cached value is invalidated before the write becomes visible, so a
    /// reader ordered after this call never sees a stale derived value.
    /// Writing `true` into an `isDefault` marker claims the type's default
    /// singleton slot.
    pub fn set(&self, id: InstanceId, field_name: &str, value: Value) -> ResolveResult<()> {
        let instance = self
            .store
            .get(id)
            .ok_or(ResolveError::UnknownInstance(id.raw()))?;
        let (declaring, field) = self
            .registry
            .field(&instance.type_name, field_name)
            .ok_or_else(|| ResolveError::UnknownField {
                type_name: instance.type_name.clone(),
                field: field_name.to_string(),
            })?;

        if !field.is_stored() {
            return Err(ResolveError::NotStoredField {
                type_name: declaring.name.clone(),
                field: field.name.clone(),
            });
        }
        if value.is_null() && !field.can_be_null {
            return Err(ResolveError::NullNotAllowed {
                type_name: declaring.name.clone(),
                field: field.name.clone(),
            });
        }
        self.check_write(declaring.name.as_str(), field, &value)?;

        let mut stored = instance.stored.lock();

        // The default slot belongs to the type that declared the marker,
        // so subtypes claim their ancestor's slot
        if field.is_default && value == Value::Bool(true) {
            self.defaults.claim_default(&declaring.name, id)?;
        }

        self.invalidate_dependents(&declaring.name, &field.name);
        stored.insert(field.name.clone(), value);
        Ok(())
    }

    fn check_write(
        &self,
        declaring: &str,
        field: &crate::registry::FieldDef,
        value: &Value,
    ) -> ResolveResult<()> {
        use crate::registry::FieldType;

        let mismatch = |message: String| ResolveError::ValueMismatch {
            type_name: declaring.to_string(),
            field: field.name.clone(),
            message,
        };

        let check_scalar = |value: &Value| -> ResolveResult<()> {
            match (&field.field_type, value) {
                (FieldType::Entity(target), Value::Ref(ref_id)) => {
                    let Some(instance) = self.store.get(*ref_id) else {
                        return Err(ResolveError::UnknownInstance(ref_id.raw()));
                    };
                    if self.registry.is_same_or_subtype(&instance.type_name, target) {
                        Ok(())
                    } else {
                        Err(mismatch(format!(
                            "expected a '{target}' reference, found '{}'",
                            instance.type_name
                        )))
                    }
                }
                (FieldType::Entity(target), other) => Err(mismatch(format!(
                    "expected a '{target}' reference, found {other:?}"
                ))),
                (FieldType::Primitive(kind), other) => {
                    if other.matches_primitive(*kind) {
                        Ok(())
                    } else {
                        Err(mismatch(format!("value {other:?} does not match field type")))
                    }
                }
            }
        };

        match value {
            Value::Null => Ok(()),
            Value::List(items) if field.is_list => {
                items.iter().try_for_each(check_scalar)
            }
            _ if field.is_list => Err(mismatch("expected a list".to_string())),
            Value::List(_) => Err(mismatch("field is not a list".to_string())),
            scalar => check_scalar(scalar),
        }
    }

    /// Claim the type's default singleton by setting its `isDefault` marker
    pub fn register_default(&self, id: InstanceId) -> ResolveResult<()> {
        let marker = self.marker_field(id, |f| f.is_default, "isDefault")?;
        self.set(id, &marker, Value::Bool(true))
    }

    /// Claim a special singleton slot under `key` and mark the instance
    pub fn register_special(&self, id: InstanceId, key: &str) -> ResolveResult<()> {
        let instance = self
            .store
            .get(id)
            .ok_or(ResolveError::UnknownInstance(id.raw()))?;
        let marker = self.marker_field(id, |f| f.is_special, "isSpecial")?;
        let (declaring, _) = self
            .registry
            .field(&instance.type_name, &marker)
            .ok_or_else(|| ResolveError::UnknownField {
                type_name: instance.type_name.clone(),
                field: marker.clone(),
            })?;
        self.defaults.claim_special(&declaring.name, key, id)?;
        self.set(id, &marker, Value::Bool(true))
    }

    fn marker_field(
        &self,
        id: InstanceId,
        select: impl Fn(&crate::registry::FieldDef) -> bool,
        kind: &str,
    ) -> ResolveResult<String> {
        let instance = self
            .store
            .get(id)
            .ok_or(ResolveError::UnknownInstance(id.raw()))?;
        let fields = self
            .registry
            .fields_of(&instance.type_name)
            .map_err(|_| ResolveError::UnknownInstance(id.raw()))?;
        fields
            .iter()
            .find(|(_, f)| select(f))
            .map(|(_, f)| f.name.clone())
            .ok_or_else(|| ResolveError::ValueMismatch {
                type_name: instance.type_name.clone(),
                field: kind.to_string(),
                message: format!("type carries no {kind} marker field"),
            })
    }

    /// Resolve a field on an instance
    pub fn get(&self, id: InstanceId, field: &str) -> ResolveResult<Value> {
        let mut ctx = ResolveCtx::new(self);
        ctx.get(id, field)
    }

    /// The default singleton of a type, if one claimed it
    pub fn default_instance(&self, type_name: &str) -> Option<InstanceId> {
        self.defaults.default_of(type_name)
    }

    /// The special singleton of a type under `key`, if one claimed it
    pub fn special_instance(&self, type_name: &str, key: &str) -> Option<InstanceId> {
        self.defaults.special_of(type_name, key)
    }

    pub fn instance_type(&self, id: InstanceId) -> Option<String> {
        self.store.get(id).map(|inst| inst.type_name.clone())
    }

    pub fn parent_of(&self, id: InstanceId) -> Option<InstanceId> {
        self.store.get(id).and_then(|inst| inst.parent)
    }

    /// Instances of a type (including subtypes), creation order
    pub fn instances_of(&self, type_name: &str) -> Vec<InstanceId> {
        self.store.ids_of_type(&self.registry, type_name)
    }

    /// Eagerly resolve every derived field on every instance, dependencies
    /// first. A hint only: failures stay in the cache as errors and
    /// re-raise on access, and lazy evaluation remains the runtime policy.
    pub fn warm_up(&self) {
        for node in self.graph.topological_order() {
            let derivable = self
                .registry
                .field(&node.type_name, &node.field)
                .is_some_and(|(_, f)| f.data_core.is_some());
            if !derivable {
                continue;
            }
            for id in self.store.ids_of_type(&self.registry, &node.type_name) {
                if let Err(err) = self.get(id, &node.field) {
                    warn!("warm-up of {}.{} on {id} failed: {err}", node.type_name, node.field);
                }
            }
        }
    }

    pub(crate) fn invalidate_dependents(&self, declaring: &str, field: &str) {
        let node = NodeId::new(declaring, field);
        for dependent in self.graph.dependents_of(&node) {
            for id in self.store.ids_of_type(&self.registry, &dependent.type_name) {
                self.cache.invalidate(&(id, dependent.field.clone()));
            }
        }
    }
}
