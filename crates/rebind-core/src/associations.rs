//! Auxiliary per-instance storage keyed by object identity.
//!
//! Classes cannot grow fields after the fact, so state attached to arbitrary
//! instances lives in a side-table instead. Each entry holds only a weak
//! reference to its owner: the table never extends an instance's life, and
//! an entry whose owner is gone reads as absent.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::collections::map::HashMap;
use crate::object::{Object, ObjectId, WeakObject};

struct Association<V> {
    owner: WeakObject,
    value: V,
}

impl<V> Association<V> {
    fn belongs_to(&self, object: &Object) -> bool {
        self.owner.refers_to(object) && self.owner.is_alive()
    }
}

// Dead entries are swept once the map reaches this size, after which the
// threshold becomes twice the surviving count.
const MIN_SWEEP_LEN: usize = 64;

struct Entries<V> {
    map: HashMap<ObjectId, Association<V>>,
    sweep_at: usize,
}

impl<V> Entries<V> {
    fn sweep(&mut self) {
        self.map.retain(|_, association| association.owner.is_alive());
        self.sweep_at = (self.map.len() * 2).max(MIN_SWEEP_LEN);
    }
}

pub struct WeakKeyedTable<V> {
    entries: Mutex<Entries<V>>,
}

impl<V> WeakKeyedTable<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Entries {
                map: HashMap::default(),
                sweep_at: MIN_SWEEP_LEN,
            }),
        }
    }

    fn entries(&self) -> MutexGuard<'_, Entries<V>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attaches `value` to `object`, returning the value it replaced.
    ///
    /// A stale entry left at the same identity by a dead owner is
    /// overwritten, never returned.
    pub fn replace(&self, object: &Object, value: V) -> Option<V> {
        let mut entries = self.entries();
        if entries.map.len() >= entries.sweep_at {
            entries.sweep();
        }
        entries
            .map
            .insert(
                object.id(),
                Association {
                    owner: object.downgrade(),
                    value,
                },
            )
            .filter(|previous| previous.belongs_to(object))
            .map(|previous| previous.value)
    }

    pub fn set(&self, object: &Object, value: V) {
        self.replace(object, value);
    }

    pub fn remove(&self, object: &Object) -> Option<V> {
        let mut entries = self.entries();
        let belongs = entries
            .map
            .get(&object.id())
            .is_some_and(|association| association.belongs_to(object));
        if !belongs {
            return None;
        }
        entries
            .map
            .remove(&object.id())
            .map(|association| association.value)
    }

    pub fn contains(&self, object: &Object) -> bool {
        self.entries()
            .map
            .get(&object.id())
            .is_some_and(|association| association.belongs_to(object))
    }

    /// Number of entries whose owner is still alive.
    pub fn len(&self) -> usize {
        self.entries()
            .map
            .values()
            .filter(|association| association.owner.is_alive())
            .count()
    }

    /// Entries held, including ones whose owner died since the last sweep.
    #[cfg(test)]
    pub(crate) fn stored(&self) -> usize {
        self.entries().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> WeakKeyedTable<V> {
    pub fn get(&self, object: &Object) -> Option<V> {
        self.entries()
            .map
            .get(&object.id())
            .filter(|association| association.belongs_to(object))
            .map(|association| association.value.clone())
    }
}

impl<V> Default for WeakKeyedTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for WeakKeyedTable<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakKeyedTable")
            .field("live_entries", &self.len())
            .finish()
    }
}
