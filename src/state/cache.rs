// src/state/cache.rs

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::hash::Hash;

/// Ephemeral values keyed by arbitrary hashable keys.
///
/// Keys of different types never collide: each key type gets its own map.
/// Nothing here is persisted.
#[derive(Default)]
pub(crate) struct Cache {
    by_key_type: HashMap<TypeId, Box<dyn Any + Send>>,
}

type Slot<K> = HashMap<K, Box<dyn Any + Send>>;

impl Cache {
    pub fn insert<K, V>(&mut self, key: K, value: V)
    where
        K: Hash + Eq + Send + 'static,
        V: Send + 'static,
    {
        let slot = self
            .by_key_type
            .entry(TypeId::of::<K>())
            .or_insert_with(|| Box::new(Slot::<K>::new()));
        if let Some(map) = slot.downcast_mut::<Slot<K>>() {
            map.insert(key, Box::new(value));
        }
    }

    pub fn remove<K>(&mut self, key: &K)
    where
        K: Hash + Eq + Send + 'static,
    {
        if let Some(map) = self
            .by_key_type
            .get_mut(&TypeId::of::<K>())
            .and_then(|slot| slot.downcast_mut::<Slot<K>>())
        {
            map.remove(key);
        }
    }

    /// Cached value for `key`, if present and of type `V`.
    pub fn get<K, V>(&self, key: &K) -> Option<V>
    where
        K: Hash + Eq + Send + 'static,
        V: Clone + 'static,
    {
        self.by_key_type
            .get(&TypeId::of::<K>())?
            .downcast_ref::<Slot<K>>()?
            .get(key)?
            .downcast_ref::<V>()
            .cloned()
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("key_types", &self.by_key_type.len())
            .finish()
    }
}
