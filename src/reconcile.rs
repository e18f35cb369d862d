use crate::domain::{EntityName, Hydration, NormalizedMove, NormalizedPokemon, PokemonRecord};
use crate::error::DexError;
use crate::pokeapi::PokeApiClient;
use crate::store::{LookupClass, RecordStore, Relation, RelationClass};

/// Idempotent merge of upstream payloads into the store. Safe to run
/// concurrently for the same record: lookup creation races resolve through
/// the conflict fallback, and relation sets are replaced atomically.
pub struct Reconciler<'a> {
    store: &'a RecordStore,
    client: &'a dyn PokeApiClient,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a RecordStore, client: &'a dyn PokeApiClient) -> Self {
        Self { store, client }
    }

    /// Persists the base row, resolves every referenced lookup, then replaces
    /// the relation sets of the classes present on the incoming record in one
    /// atomic store call. Classes absent from the record are left untouched.
    pub fn upsert_pokemon(
        &self,
        incoming: &NormalizedPokemon,
    ) -> Result<PokemonRecord, DexError> {
        let pokemon_id = self.store.upsert_pokemon(incoming)?;

        let mut classes: Vec<RelationClass> = Vec::new();
        let mut relations: Vec<Relation> = Vec::new();

        if let Some(types) = &incoming.types {
            classes.push(RelationClass::Type);
            for entry in types {
                let type_id = self.get_or_create_lookup(LookupClass::Type, &entry.name)?;
                relations.push(Relation::Type {
                    type_id,
                    slot: entry.slot,
                });
            }
        }
        if let Some(abilities) = &incoming.abilities {
            classes.push(RelationClass::Ability);
            for entry in abilities {
                let ability_id = self.get_or_create_lookup(LookupClass::Ability, &entry.name)?;
                relations.push(Relation::Ability {
                    ability_id,
                    slot: entry.slot,
                    hidden: entry.hidden,
                });
            }
        }
        if let Some(stats) = &incoming.stats {
            classes.push(RelationClass::Stat);
            for entry in stats {
                let stat_id = self.get_or_create_lookup(LookupClass::Stat, &entry.name)?;
                relations.push(Relation::Stat {
                    stat_id,
                    base: entry.base,
                    effort: entry.effort,
                });
            }
        }
        if let Some(moves) = &incoming.moves {
            classes.push(RelationClass::Move);
            for entry in moves {
                let move_id = self.resolve_move(entry)?;
                relations.push(Relation::Move {
                    move_id,
                    level_learned: entry.level_learned,
                    learn_method: entry.learn_method.clone(),
                });
            }
        }

        self.store.replace_relations(pokemon_id, &classes, relations);

        self.store
            .find_pokemon(incoming.dex_number, Hydration::WithMoves)
            .ok_or_else(|| {
                DexError::PersistFailed(format!(
                    "record {} missing after reconcile",
                    incoming.dex_number
                ))
            })
    }

    /// Uniqueness-safe get-or-create: find, insert, and on a conflict from a
    /// concurrent writer re-read. A re-read that still misses means the store
    /// violated its own uniqueness contract and is escalated, not retried.
    pub fn get_or_create_lookup(
        &self,
        class: LookupClass,
        name: &EntityName,
    ) -> Result<u32, DexError> {
        if let Some(id) = self.store.find_lookup(class, name) {
            return Ok(id);
        }
        match self.store.insert_lookup(class, name) {
            Ok(id) => Ok(id),
            Err(DexError::LookupConflict(_)) => self
                .store
                .find_lookup(class, name)
                .ok_or_else(|| DexError::LookupInconsistent(format!("{} {}", class.label(), name))),
            Err(err) => Err(err),
        }
    }

    /// Get-or-create for the move table, merging detail fields. When the
    /// cached row still lacks category or pp and the incoming details are
    /// genuine, a best-effort detail fetch fills the gap; its failure is
    /// logged and swallowed. Degraded incoming details are persisted as-is
    /// so the same payload is not fetched twice in one pass.
    fn resolve_move(&self, incoming: &NormalizedMove) -> Result<u32, DexError> {
        let data = incoming.details.data();
        let (move_id, row) = match self.store.find_move(&data.name) {
            Some(row) => {
                if !incoming.details.is_degraded() {
                    self.store.update_move(row.id, data);
                }
                let id = row.id;
                (id, self.store.find_move(&data.name))
            }
            None => match self.store.insert_move(data) {
                Ok(id) => (id, self.store.find_move(&data.name)),
                Err(DexError::LookupConflict(_)) => {
                    let row = self.store.find_move(&data.name).ok_or_else(|| {
                        DexError::LookupInconsistent(format!("move {}", data.name))
                    })?;
                    (row.id, Some(row))
                }
                Err(err) => return Err(err),
            },
        };

        let needs_detail = row
            .as_ref()
            .map(|r| r.category.is_none() || r.pp.is_none())
            .unwrap_or(false);
        if needs_detail && !incoming.details.is_degraded() {
            match self.client.fetch_move(&data.name) {
                Ok(details) => self.store.update_move(move_id, &details),
                Err(err) => {
                    tracing::warn!(move_name = %data.name, %err, "move detail backfill failed");
                }
            }
        }
        Ok(move_id)
    }
}
