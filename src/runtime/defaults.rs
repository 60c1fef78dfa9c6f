//! Default and special instance registry
//!
//! Process-wide singletons per entity type: at most one "default" instance,
//! plus a map from special-key to "special" instance. Slots are claimed
//! once, the first time an instance carrying the marker registers, and are
//! never overwritten; a second claim fails instead of replacing.

use std::collections::HashMap;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::error::{ResolveError, ResolveResult};
use crate::runtime::instance::InstanceId;

#[derive(Debug, Default)]
struct TypeDefaults {
    default: Option<InstanceId>,
    specials: IndexMap<String, InstanceId>,
}

/// Per-type default/special singleton store
#[derive(Debug, Default)]
pub struct DefaultRegistry {
    inner: RwLock<HashMap<String, TypeDefaults>>,
}

impl DefaultRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the type's default slot. Fails if already claimed.
    pub fn claim_default(&self, type_name: &str, id: InstanceId) -> ResolveResult<()> {
        let mut inner = self.inner.write();
        let entry = inner.entry(type_name.to_string()).or_default();
        if entry.default.is_some() {
            return Err(ResolveError::DuplicateDefault {
                type_name: type_name.to_string(),
            });
        }
        entry.default = Some(id);
        Ok(())
    }

    /// Claim a special slot under `key`. Fails if the key is taken.
    pub fn claim_special(&self, type_name: &str, key: &str, id: InstanceId) -> ResolveResult<()> {
        let mut inner = self.inner.write();
        let entry = inner.entry(type_name.to_string()).or_default();
        if entry.specials.contains_key(key) {
            return Err(ResolveError::DuplicateSpecial {
                type_name: type_name.to_string(),
                key: key.to_string(),
            });
        }
        entry.specials.insert(key.to_string(), id);
        Ok(())
    }

    pub fn default_of(&self, type_name: &str) -> Option<InstanceId> {
        self.inner.read().get(type_name).and_then(|e| e.default)
    }

    pub fn special_of(&self, type_name: &str, key: &str) -> Option<InstanceId> {
        self.inner
            .read()
            .get(type_name)
            .and_then(|e| e.specials.get(key).copied())
    }
}
