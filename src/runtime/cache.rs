//! Per-(instance, field) value cache
//!
//! Each entry is a small state machine: absent (Empty), `Computing`,
//! `Computed`, or `Error`. The first caller to claim an absent entry owns
//! the computation; concurrent callers for the same entry block on a
//! condvar and receive the owner's result, or the owner's error re-raised.
//! Different entries never contend beyond the map lock.
//!
//! Invalidation during an in-flight computation marks the entry dirty
//! instead of removing it: the owner's `complete` then discards the result
//! (the owner still returns it to its own caller, which started before the
//! write) and wakes the waiters, who re-claim the entry and recompute
//! against the post-write state. A reader ordered after a write can
//! therefore never observe a pre-write cached value.

use std::collections::HashMap;

use log::trace;
use parking_lot::{Condvar, Mutex};

use crate::error::{ResolveError, ResolveResult};
use crate::runtime::instance::InstanceId;
use crate::runtime::value::Value;

/// Cache key: instance identity plus field name
pub(crate) type FieldKey = (InstanceId, String);

#[derive(Debug)]
enum Entry {
    Computing { dirty: bool },
    Computed(Value),
    Error(ResolveError),
}

/// Result of claiming an entry
pub(crate) enum Claim {
    /// The caller owns the computation and must call `complete`
    Owner,
    /// Another caller finished it; this is the shared outcome
    Ready(ResolveResult<Value>),
}

#[derive(Debug, Default)]
pub(crate) struct ValueCache {
    entries: Mutex<HashMap<FieldKey, Entry>>,
    ready: Condvar,
}

impl ValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the entry, blocking while another caller is computing it
    pub fn begin(&self, key: &FieldKey) -> Claim {
        let mut entries = self.entries.lock();
        loop {
            match entries.get(key) {
                None => {
                    entries.insert(key.clone(), Entry::Computing { dirty: false });
                    trace!("cache miss {}.{}", key.0, key.1);
                    return Claim::Owner;
                }
                Some(Entry::Computed(value)) => return Claim::Ready(Ok(value.clone())),
                Some(Entry::Error(err)) => return Claim::Ready(Err(err.clone())),
                Some(Entry::Computing { .. }) => {
                    self.ready.wait(&mut entries);
                }
            }
        }
    }

    /// Publish the owner's result and wake waiters. A result computed
    /// against state that was invalidated mid-flight is discarded so the
    /// next claimer recomputes.
    pub fn complete(&self, key: &FieldKey, result: &ResolveResult<Value>) {
        let mut entries = self.entries.lock();
        let clean = matches!(entries.get(key), Some(Entry::Computing { dirty: false }));
        if clean {
            let entry = match result {
                Ok(value) => Entry::Computed(value.clone()),
                Err(err) => Entry::Error(err.clone()),
            };
            entries.insert(key.clone(), entry);
        } else {
            entries.remove(key);
        }
        drop(entries);
        self.ready.notify_all();
    }

    /// Reset one entry. In-flight computations are flagged rather than
    /// removed; settled entries vanish so the next read recomputes.
    pub fn invalidate(&self, key: &FieldKey) {
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(Entry::Computing { dirty }) => {
                *dirty = true;
                trace!("cache poison {}.{}", key.0, key.1);
            }
            Some(_) => {
                entries.remove(key);
                trace!("cache drop {}.{}", key.0, key.1);
            }
            None => {}
        }
    }

    #[cfg(test)]
    pub fn settled_len(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|e| !matches!(e, Entry::Computing { .. }))
            .count()
    }
}
