use std::collections::{BTreeSet, HashMap};

use crate::domain::{DexId, Hydration, PokemonRecord};
use crate::error::DexError;
use crate::store::RecordStore;

/// Request-scoped point-lookup batcher: keys accumulate in a pending set,
/// drain into one multi-key fetch, and land in a memo so repeated loads of
/// the same key never touch the backing fetch twice. Construct one per
/// logical request and drop it with the request.
pub struct BatchLoader<'a> {
    batch: Box<dyn FnMut(&[DexId]) -> Result<Vec<PokemonRecord>, DexError> + 'a>,
    memo: HashMap<DexId, PokemonRecord>,
    pending: BTreeSet<DexId>,
}

impl<'a> BatchLoader<'a> {
    pub fn new(
        batch: impl FnMut(&[DexId]) -> Result<Vec<PokemonRecord>, DexError> + 'a,
    ) -> Self {
        Self {
            batch: Box::new(batch),
            memo: HashMap::new(),
            pending: BTreeSet::new(),
        }
    }

    pub fn for_store(store: &'a RecordStore, hydration: Hydration) -> Self {
        Self::new(move |ids| Ok(store.find_many(ids, hydration)))
    }

    /// Loads one record. Absence is an error, never a silent skip.
    pub fn load(&mut self, id: DexId) -> Result<PokemonRecord, DexError> {
        if let Some(record) = self.memo.get(&id) {
            return Ok(record.clone());
        }
        self.pending.insert(id);
        self.drain()?;
        self.memo
            .get(&id)
            .cloned()
            .ok_or_else(|| DexError::PokemonNotFound(id.to_string()))
    }

    /// Loads many records in input order with a single drain for all keys
    /// not already memoized.
    pub fn load_many(&mut self, ids: &[DexId]) -> Result<Vec<PokemonRecord>, DexError> {
        for id in ids {
            if !self.memo.contains_key(id) {
                self.pending.insert(*id);
            }
        }
        self.drain()?;
        ids.iter()
            .map(|id| {
                self.memo
                    .get(id)
                    .cloned()
                    .ok_or_else(|| DexError::PokemonNotFound(id.to_string()))
            })
            .collect()
    }

    fn drain(&mut self) -> Result<(), DexError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let keys: Vec<DexId> = std::mem::take(&mut self.pending).into_iter().collect();
        let records = (self.batch)(&keys)?;
        for record in records {
            self.memo.insert(record.dex_number, record);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.memo.clear();
        self.pending.clear();
    }
}
