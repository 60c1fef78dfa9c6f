//! Field resolution
//!
//! Dispatches a field's configured strategy to produce its value. Plain
//! stored fields and `Static` literals bypass the cache; `SelfParent`
//! lists are a live view and are deliberately recomputed per access; the
//! remaining strategies resolve through the value cache so concurrent
//! callers share one computation.
//!
//! Every resolution carries a [`ResolveCtx`], whose stack of in-progress
//! (instance, field) pairs is the defensive runtime cycle backstop: the
//! startup graph validation makes structural cycles impossible, but a
//! host computation that reads its own field would otherwise deadlock on
//! its own cache entry.

use log::debug;

use crate::chain::{self, ChainOutcome};
use crate::error::{ResolveError, ResolveResult};
use crate::registry::{DataCore, EntityType, Fallback, FieldDef, TypeRegistry};
use crate::runtime::cache::Claim;
use crate::runtime::instance::{Instance, InstanceId};
use crate::runtime::lists;
use crate::runtime::value::Value;
use crate::runtime::Database;

/// Context of one resolution call tree
pub struct ResolveCtx<'db> {
    db: &'db Database,
    stack: Vec<(InstanceId, String)>,
}

impl<'db> ResolveCtx<'db> {
    pub(crate) fn new(db: &'db Database) -> Self {
        Self {
            db,
            stack: Vec::new(),
        }
    }

    /// Resolve a field within this call tree. Host computations and
    /// default getters receive the context and must read through it so
    /// re-entrant reads are detected instead of deadlocking.
    pub fn get(&mut self, id: InstanceId, field: &str) -> ResolveResult<Value> {
        let db = self.db;
        db.resolve_field(self, id, field)
    }

    /// The database this resolution runs against
    pub fn db(&self) -> &'db Database {
        self.db
    }

    pub(crate) fn registry(&self) -> &'db TypeRegistry {
        self.db.registry()
    }

    pub(crate) fn instance_type(&self, id: InstanceId) -> Option<String> {
        self.db.instance_type(id)
    }

    fn cycle_error(&self, key: &(InstanceId, String)) -> ResolveError {
        let name = |k: &(InstanceId, String)| {
            let ty = self
                .instance_type(k.0)
                .unwrap_or_else(|| k.0.to_string());
            format!("{}.{}", ty, k.1)
        };
        let mut path: Vec<String> = self.stack.iter().map(&name).collect();
        path.push(name(key));
        ResolveError::CyclicDependency { path }
    }
}

impl Database {
    pub(crate) fn resolve_field(
        &self,
        ctx: &mut ResolveCtx<'_>,
        id: InstanceId,
        field_name: &str,
    ) -> ResolveResult<Value> {
        let instance = self
            .store()
            .get(id)
            .ok_or(ResolveError::UnknownInstance(id.raw()))?;
        let (declaring, field) = self
            .registry()
            .field(&instance.type_name, field_name)
            .ok_or_else(|| ResolveError::UnknownField {
                type_name: instance.type_name.clone(),
                field: field_name.to_string(),
            })?;

        let Some(core) = &field.data_core else {
            return stored_read(&instance, declaring, field);
        };

        match core {
            // Identical for every instance of the type; a clone is cheaper
            // than a cache entry per instance
            DataCore::Static(value) => Ok(value.clone()),
            // Live view over the instance table, never cached
            DataCore::SelfParent { class_type } => lists::self_parent(self, id, class_type),
            _ => {
                let key = (id, field.name.clone());
                if ctx.stack.contains(&key) {
                    return Err(ctx.cycle_error(&key));
                }
                match self.cache().begin(&key) {
                    Claim::Ready(result) => result,
                    Claim::Owner => {
                        ctx.stack.push(key.clone());
                        let result = self.compute(ctx, id, declaring, field, core);
                        ctx.stack.pop();
                        self.cache().complete(&key, &result);
                        if let Err(err) = &result {
                            debug!("resolve {}.{} failed: {err}", declaring.name, field.name);
                        }
                        result
                    }
                }
            }
        }
    }

    fn compute(
        &self,
        ctx: &mut ResolveCtx<'_>,
        id: InstanceId,
        declaring: &EntityType,
        field: &FieldDef,
        core: &DataCore,
    ) -> ResolveResult<Value> {
        match core {
            DataCore::Static(value) => Ok(value.clone()),
            DataCore::SelfParent { class_type } => lists::self_parent(self, id, class_type),

            DataCore::InstanceStatic { special_key } => {
                let target = field.field_type.entity_name().ok_or_else(|| {
                    ResolveError::ValueMismatch {
                        type_name: declaring.name.clone(),
                        field: field.name.clone(),
                        message: "instanceStatic on a non-entity field".to_string(),
                    }
                })?;
                match special_key {
                    None => self
                        .defaults()
                        .default_of(target)
                        .map(Value::Ref)
                        .ok_or_else(|| ResolveError::NoDefaultConfigured {
                            type_name: target.to_string(),
                        }),
                    Some(key) => self
                        .defaults()
                        .special_of(target, key)
                        .map(Value::Ref)
                        .ok_or_else(|| ResolveError::NoSpecialInstance {
                            type_name: target.to_string(),
                            key: key.clone(),
                        }),
                }
            }

            DataCore::DirectDerived { chain, fallback } => {
                match chain::evaluate(ctx, id, chain)? {
                    ChainOutcome::Found(value) if !value.is_null() => Ok(value),
                    // Absent, or a terminal null: a derived field is
                    // non-nullable, so both take the fallback
                    _ => match fallback {
                        Fallback::Literal(value) => Ok(value.clone()),
                        Fallback::Getter => {
                            let getter = self
                                .default_getter(&declaring.name, &field.name)
                                .ok_or_else(|| ResolveError::ComputationFailed {
                                    type_name: declaring.name.clone(),
                                    field: field.name.clone(),
                                    message: "default getter disappeared after build".to_string(),
                                })?;
                            getter(ctx, id)
                        }
                    },
                }
            }

            DataCore::Derived { sources } => {
                // The declared chains are the invalidation contract, not
                // inputs; resolving them here pins their cache entries so
                // upstream writes flow through to this field
                for source in sources {
                    chain::evaluate(ctx, id, source)?;
                }
                let computation = self
                    .computation(&declaring.name, &field.name)
                    .ok_or_else(|| ResolveError::ComputationFailed {
                        type_name: declaring.name.clone(),
                        field: field.name.clone(),
                        message: "computation disappeared after build".to_string(),
                    })?;
                let value = computation(ctx, id)?;
                if value.is_null() && !field.can_be_null {
                    return Err(ResolveError::NullNotAllowed {
                        type_name: declaring.name.clone(),
                        field: field.name.clone(),
                    });
                }
                Ok(value)
            }

            DataCore::MultiParentList { parents } => lists::multi_parent(ctx, id, parents),
        }
    }
}

fn stored_read(
    instance: &Instance,
    declaring: &EntityType,
    field: &FieldDef,
) -> ResolveResult<Value> {
    let stored = instance.stored.lock();
    match stored.get(&field.name) {
        Some(value) => Ok(value.clone()),
        None if field.can_be_null => Ok(Value::Null),
        None => Err(ResolveError::UnsetRequiredField {
            type_name: declaring.name.clone(),
            field: field.name.clone(),
        }),
    }
}
