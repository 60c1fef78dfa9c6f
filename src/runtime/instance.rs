//! Runtime instances
//!
//! An instance is a runtime object of some entity type: an identity, a
//! mutable map of stored field values, and an optional non-owning parent
//! back-reference. The store owns every instance; chain traversal and list
//! population only read neighbours through their ids.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use crate::registry::TypeRegistry;
use crate::runtime::value::Value;

/// Identity of a runtime instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A live instance. Stored values sit behind a mutex so writes serialize
/// per instance; derived values live in the database cache instead.
#[derive(Debug)]
pub(crate) struct Instance {
    pub type_name: String,
    /// Non-owning back-reference; the parent's lifetime covers the child's
    pub parent: Option<InstanceId>,
    pub stored: Mutex<HashMap<String, Value>>,
}

/// Owner of every instance in a database, in creation order
#[derive(Debug, Default)]
pub(crate) struct InstanceStore {
    instances: RwLock<IndexMap<InstanceId, Arc<Instance>>>,
    next_id: AtomicU64,
}

impl InstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, type_name: &str, parent: Option<InstanceId>) -> InstanceId {
        let id = InstanceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let instance = Arc::new(Instance {
            type_name: type_name.to_string(),
            parent,
            stored: Mutex::new(HashMap::new()),
        });
        self.instances.write().insert(id, instance);
        id
    }

    pub fn get(&self, id: InstanceId) -> Option<Arc<Instance>> {
        self.instances.read().get(&id).cloned()
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.instances.read().contains_key(&id)
    }

    pub fn remove(&self, id: InstanceId) -> Option<Arc<Instance>> {
        self.instances.write().shift_remove(&id)
    }

    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    /// Ids of every instance whose type is `type_name` or a subtype of it,
    /// in creation order
    pub fn ids_of_type(&self, registry: &TypeRegistry, type_name: &str) -> Vec<InstanceId> {
        self.instances
            .read()
            .iter()
            .filter(|(_, inst)| registry.is_same_or_subtype(&inst.type_name, type_name))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Ids of every instance of `class_type` (or a subtype) whose parent
    /// back-reference is `parent`, in creation order
    pub fn children_of(
        &self,
        registry: &TypeRegistry,
        parent: InstanceId,
        class_type: &str,
    ) -> Vec<InstanceId> {
        self.instances
            .read()
            .iter()
            .filter(|(_, inst)| {
                inst.parent == Some(parent)
                    && registry.is_same_or_subtype(&inst.type_name, class_type)
            })
            .map(|(id, _)| *id)
            .collect()
    }
}
