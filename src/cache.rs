use std::collections::HashMap;

use parking_lot::Mutex;

use crate::domain::DexId;

/// In-process lookaside cache keyed by upstream id. One instance per entity
/// kind, owned by the component that fills it; not shared across processes.
#[derive(Debug, Default)]
pub struct LookupCache<T: Clone> {
    entries: Mutex<HashMap<DexId, T>>,
}

impl<T: Clone> LookupCache<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, id: DexId) -> Option<T> {
        self.entries.lock().get(&id).cloned()
    }

    pub fn set(&self, id: DexId, value: T) {
        self.entries.lock().insert(id, value);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_cached_value() {
        let cache = LookupCache::new();
        let id = DexId::new(5).unwrap();
        assert!(cache.get(id).is_none());
        cache.set(id, "bold".to_string());
        assert_eq!(cache.get(id).as_deref(), Some("bold"));
    }

    #[test]
    fn clear_empties_cache() {
        let cache = LookupCache::new();
        cache.set(DexId::new(1).unwrap(), 10u32);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
