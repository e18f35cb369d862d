use serde::Serialize;

use crate::cache::LookupCache;
use crate::completeness;
use crate::domain::{
    DexId, EntityName, Hydration, Item, Nature, NormalizedPokemon, PokemonKey, PokemonRecord,
};
use crate::error::DexError;
use crate::loader::BatchLoader;
use crate::pokeapi::PokeApiClient;
use crate::reconcile::Reconciler;
use crate::store::RecordStore;

/// Read-path composition: serve complete cached records as-is, refresh
/// incomplete or missing ones from upstream, and fall back to stale local
/// data when the refresh fails.
pub struct App<C: PokeApiClient> {
    store: RecordStore,
    client: C,
    natures: LookupCache<Nature>,
    items: LookupCache<Item>,
}

#[derive(Debug, Serialize)]
pub struct ClearResult {
    pub cleared: bool,
}

/// Per-request state: a fresh loader whose memo and pending set die with the
/// request. Never shared across requests.
pub struct RequestContext<'a> {
    pub loader: BatchLoader<'a>,
}

impl<C: PokeApiClient> App<C> {
    pub fn new(store: RecordStore, client: C) -> Self {
        Self {
            store,
            client,
            natures: LookupCache::new(),
            items: LookupCache::new(),
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn request_context(&self) -> RequestContext<'_> {
        RequestContext {
            loader: BatchLoader::for_store(&self.store, Hydration::WithMoves),
        }
    }

    fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(&self.store, &self.client)
    }

    pub fn reconcile(&self, incoming: &NormalizedPokemon) -> Result<PokemonRecord, DexError> {
        self.reconciler().upsert_pokemon(incoming)
    }

    /// Detail read keyed by dex number. Stale data is better than no data:
    /// an upstream failure only surfaces when nothing local exists.
    pub fn get_or_refresh(&self, dex: DexId) -> Result<PokemonRecord, DexError> {
        let cached = self.store.find_pokemon(dex, Hydration::WithMoves);
        self.refresh_if_needed(cached, || self.client.fetch_pokemon(dex), &dex.to_string())
    }

    pub fn get_or_refresh_by_name(&self, name: &EntityName) -> Result<PokemonRecord, DexError> {
        let cached = self.store.find_pokemon_by_name(name, Hydration::WithMoves);
        self.refresh_if_needed(
            cached,
            || self.client.fetch_pokemon_by_name(name),
            name.as_str(),
        )
    }

    pub fn get_or_refresh_key(&self, key: &PokemonKey) -> Result<PokemonRecord, DexError> {
        match key {
            PokemonKey::Dex(dex) => self.get_or_refresh(*dex),
            PokemonKey::Name(name) => self.get_or_refresh_by_name(name),
        }
    }

    fn refresh_if_needed(
        &self,
        cached: Option<PokemonRecord>,
        fetch: impl Fn() -> Result<NormalizedPokemon, DexError>,
        key: &str,
    ) -> Result<PokemonRecord, DexError> {
        match cached {
            Some(record) if completeness::is_complete(&record, true) => Ok(record),
            Some(stale) => match fetch() {
                Ok(incoming) => self.reconciler().upsert_pokemon(&incoming),
                Err(err) => {
                    tracing::warn!(%key, %err, "refresh failed, serving stale record");
                    Ok(stale)
                }
            },
            None => match fetch() {
                Ok(incoming) => self.reconciler().upsert_pokemon(&incoming),
                Err(err) => {
                    tracing::warn!(%key, %err, "fetch failed with no local record");
                    Err(DexError::PokemonNotFound(key.to_string()))
                }
            },
        }
    }

    /// Multi-key read: one store fetch classifies every id, then misses and
    /// incomplete hits are refreshed individually. Ids absent both locally
    /// and upstream are skipped with a warning rather than failing the batch.
    /// Results come back deduplicated in ascending dex order.
    pub fn batch_get(&self, ids: &[DexId]) -> Result<Vec<PokemonRecord>, DexError> {
        let mut unique = ids.to_vec();
        unique.sort();
        unique.dedup();

        let cached = self.store.find_many(&unique, Hydration::WithoutMoves);
        let mut results = Vec::with_capacity(unique.len());
        for dex in unique {
            let hit = cached.iter().find(|r| r.dex_number == dex);
            match hit {
                Some(record) if completeness::is_complete(record, false) => {
                    results.push(record.clone());
                }
                Some(stale) => match self.client.fetch_pokemon(dex) {
                    Ok(incoming) => results.push(self.reconciler().upsert_pokemon(&incoming)?),
                    Err(err) => {
                        tracing::warn!(%dex, %err, "batch refresh failed, serving stale record");
                        results.push(stale.clone());
                    }
                },
                None => match self.client.fetch_pokemon(dex) {
                    Ok(incoming) => results.push(self.reconciler().upsert_pokemon(&incoming)?),
                    Err(err) => {
                        tracing::warn!(%dex, %err, "batch fetch failed, skipping id");
                    }
                },
            }
        }
        Ok(results)
    }

    /// Page view over the contiguous dex-number range. Pages past the end of
    /// the id space are empty, not errors.
    pub fn list(&self, page: u32, limit: u32) -> Result<Vec<PokemonRecord>, DexError> {
        if page == 0 || limit == 0 {
            return Ok(Vec::new());
        }
        let start = match (page - 1).checked_mul(limit).and_then(|v| v.checked_add(1)) {
            Some(start) => start,
            None => return Ok(Vec::new()),
        };
        let end = match start.checked_add(limit) {
            Some(end) => end,
            None => return Ok(Vec::new()),
        };
        let ids = (start..end)
            .map(DexId::new)
            .collect::<Result<Vec<_>, _>>()?;
        self.batch_get(&ids)
    }

    /// Lazy lookaside: cache, then store, then upstream fetch persisted and
    /// cached on the way back. Upstream failures propagate because natures
    /// have no stale fallback shape.
    pub fn nature(&self, dex: DexId) -> Result<Nature, DexError> {
        if let Some(nature) = self.natures.get(dex) {
            return Ok(nature);
        }
        if let Some(nature) = self.store.find_nature(dex) {
            self.natures.set(dex, nature.clone());
            return Ok(nature);
        }
        let nature = self.client.fetch_nature(dex)?;
        self.store.upsert_nature(&nature);
        self.natures.set(dex, nature.clone());
        Ok(nature)
    }

    pub fn item(&self, dex: DexId) -> Result<Item, DexError> {
        if let Some(item) = self.items.get(dex) {
            return Ok(item);
        }
        if let Some(item) = self.store.find_item(dex) {
            self.items.set(dex, item.clone());
            return Ok(item);
        }
        let item = self.client.fetch_item(dex)?;
        self.store.upsert_item(&item);
        self.items.set(dex, item.clone());
        Ok(item)
    }

    pub fn clear(&self) -> ClearResult {
        self.store.clear();
        self.natures.clear();
        self.items.clear();
        ClearResult { cleared: true }
    }
}
