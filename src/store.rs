use std::fs;
use std::sync::Arc;

use camino::Utf8Path;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::domain::{
    AbilityLink, DexId, EntityName, Hydration, Item, MoveData, MoveLink, Nature,
    NormalizedPokemon, PokemonRecord, StatLink, TypeLink,
};
use crate::error::DexError;

/// Shared lookup tables deduplicated by name. Moves live in their own table
/// because they carry detail fields beyond the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupClass {
    Type,
    Ability,
    Stat,
}

impl LookupClass {
    pub fn label(self) -> &'static str {
        match self {
            LookupClass::Type => "type",
            LookupClass::Ability => "ability",
            LookupClass::Stat => "stat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationClass {
    Type,
    Ability,
    Stat,
    Move,
}

/// Resolved join row, one variant per relation class. Lookup ids must exist
/// in the store when the relation is committed.
#[derive(Debug, Clone)]
pub enum Relation {
    Type {
        type_id: u32,
        slot: u8,
    },
    Ability {
        ability_id: u32,
        slot: u8,
        hidden: bool,
    },
    Stat {
        stat_id: u32,
        base: u16,
        effort: u16,
    },
    Move {
        move_id: u32,
        level_learned: Option<u16>,
        learn_method: Option<String>,
    },
}

impl Relation {
    pub fn class(&self) -> RelationClass {
        match self {
            Relation::Type { .. } => RelationClass::Type,
            Relation::Ability { .. } => RelationClass::Ability,
            Relation::Stat { .. } => RelationClass::Stat,
            Relation::Move { .. } => RelationClass::Move,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PokemonRow {
    id: u32,
    dex_number: DexId,
    name: EntityName,
    height: Option<u32>,
    weight: Option<u32>,
    sprite_url: Option<String>,
    fetched_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LookupRow {
    id: u32,
    name: EntityName,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRow {
    pub id: u32,
    pub dex_number: Option<DexId>,
    pub name: EntityName,
    pub power: Option<u16>,
    pub pp: Option<u16>,
    pub priority: Option<i16>,
    pub accuracy: Option<u16>,
    pub category: Option<String>,
    pub type_name: Option<EntityName>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PokemonTypeRow {
    pokemon_id: u32,
    type_id: u32,
    slot: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PokemonAbilityRow {
    pokemon_id: u32,
    ability_id: u32,
    slot: u8,
    hidden: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PokemonStatRow {
    pokemon_id: u32,
    stat_id: u32,
    base: u16,
    effort: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PokemonMoveRow {
    pokemon_id: u32,
    move_id: u32,
    level_learned: Option<u16>,
    learn_method: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Tables {
    next_pokemon_id: u32,
    next_lookup_id: u32,
    next_move_id: u32,
    pokemon: Vec<PokemonRow>,
    types: Vec<LookupRow>,
    abilities: Vec<LookupRow>,
    stats: Vec<LookupRow>,
    moves: Vec<MoveRow>,
    pokemon_types: Vec<PokemonTypeRow>,
    pokemon_abilities: Vec<PokemonAbilityRow>,
    pokemon_stats: Vec<PokemonStatRow>,
    pokemon_moves: Vec<PokemonMoveRow>,
    natures: Vec<Nature>,
    items: Vec<Item>,
}

impl Tables {
    fn lookup_table(&self, class: LookupClass) -> &Vec<LookupRow> {
        match class {
            LookupClass::Type => &self.types,
            LookupClass::Ability => &self.abilities,
            LookupClass::Stat => &self.stats,
        }
    }
}

fn next_id(counter: &mut u32) -> u32 {
    *counter += 1;
    *counter
}

/// In-process relational store. Every public operation acquires the table
/// lock exactly once, so multi-row operations (relation-set replacement,
/// hydrated reads, multi-key fetches) are isolated from concurrent access,
/// while sequences of calls deliberately are not.
#[derive(Clone, Default)]
pub struct RecordStore {
    tables: Arc<Mutex<Tables>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a snapshot from disk, or returns an empty store when the file
    /// does not exist yet.
    pub fn load_snapshot(path: &Utf8Path) -> Result<Self, DexError> {
        if !path.as_std_path().exists() {
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| DexError::Snapshot(err.to_string()))?;
        let tables: Tables =
            serde_json::from_str(&content).map_err(|err| DexError::Snapshot(err.to_string()))?;
        Ok(Self {
            tables: Arc::new(Mutex::new(tables)),
        })
    }

    /// Writes the full table set atomically: temp file in the target
    /// directory, then rename over the destination.
    pub fn save_snapshot(&self, path: &Utf8Path) -> Result<(), DexError> {
        let bytes = {
            let tables = self.tables.lock();
            serde_json::to_vec_pretty(&*tables).map_err(|err| DexError::Snapshot(err.to_string()))?
        };
        let parent = path
            .parent()
            .ok_or_else(|| DexError::Snapshot("invalid snapshot path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| DexError::Snapshot(err.to_string()))?;
        let temp = tempfile::Builder::new()
            .prefix("dexsync-store")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| DexError::Snapshot(err.to_string()))?;
        fs::write(temp.path(), &bytes).map_err(|err| DexError::Snapshot(err.to_string()))?;
        if path.as_std_path().exists() {
            fs::remove_file(path.as_std_path())
                .map_err(|err| DexError::Snapshot(err.to_string()))?;
        }
        temp.persist(path.as_std_path())
            .map_err(|err| DexError::Snapshot(err.to_string()))?;
        Ok(())
    }

    pub fn find_pokemon(&self, dex: DexId, hydration: Hydration) -> Option<PokemonRecord> {
        let tables = self.tables.lock();
        tables
            .pokemon
            .iter()
            .find(|row| row.dex_number == dex)
            .map(|row| hydrate(&tables, row, hydration))
    }

    pub fn find_pokemon_by_name(
        &self,
        name: &EntityName,
        hydration: Hydration,
    ) -> Option<PokemonRecord> {
        let tables = self.tables.lock();
        tables
            .pokemon
            .iter()
            .find(|row| row.name == *name)
            .map(|row| hydrate(&tables, row, hydration))
    }

    /// Multi-key fetch: deduplicates the key set and returns present records
    /// in ascending dex order. Absent keys are omitted, not errors.
    pub fn find_many(&self, ids: &[DexId], hydration: Hydration) -> Vec<PokemonRecord> {
        let tables = self.tables.lock();
        let mut unique = ids.to_vec();
        unique.sort();
        unique.dedup();
        unique
            .into_iter()
            .filter_map(|dex| {
                tables
                    .pokemon
                    .iter()
                    .find(|row| row.dex_number == dex)
                    .map(|row| hydrate(&tables, row, hydration))
            })
            .collect()
    }

    /// Upserts the base row keyed by dex number. Scalar fields present on the
    /// incoming record overwrite stored values; the name uniqueness invariant
    /// is enforced here.
    pub fn upsert_pokemon(&self, record: &NormalizedPokemon) -> Result<u32, DexError> {
        let mut tables = self.tables.lock();
        let name_taken = tables
            .pokemon
            .iter()
            .any(|row| row.name == record.name && row.dex_number != record.dex_number);
        if name_taken {
            return Err(DexError::PersistFailed(format!(
                "name {} already belongs to another dex number",
                record.name
            )));
        }
        let fetched_at = chrono::Utc::now().to_rfc3339();
        if let Some(row) = tables
            .pokemon
            .iter_mut()
            .find(|row| row.dex_number == record.dex_number)
        {
            row.name = record.name.clone();
            row.height = record.height;
            row.weight = record.weight;
            row.sprite_url = record.sprite_url.clone();
            row.fetched_at = fetched_at;
            return Ok(row.id);
        }
        let id = next_id(&mut tables.next_pokemon_id);
        tables.pokemon.push(PokemonRow {
            id,
            dex_number: record.dex_number,
            name: record.name.clone(),
            height: record.height,
            weight: record.weight,
            sprite_url: record.sprite_url.clone(),
            fetched_at,
        });
        Ok(id)
    }

    pub fn find_lookup(&self, class: LookupClass, name: &EntityName) -> Option<u32> {
        let tables = self.tables.lock();
        tables
            .lookup_table(class)
            .iter()
            .find(|row| row.name == *name)
            .map(|row| row.id)
    }

    /// Inserts a lookup row, failing with `LookupConflict` when the name
    /// already exists. Callers own the conflict-fallback re-read.
    pub fn insert_lookup(&self, class: LookupClass, name: &EntityName) -> Result<u32, DexError> {
        let mut tables = self.tables.lock();
        if tables
            .lookup_table(class)
            .iter()
            .any(|row| row.name == *name)
        {
            return Err(DexError::LookupConflict(format!(
                "{} {}",
                class.label(),
                name
            )));
        }
        let id = next_id(&mut tables.next_lookup_id);
        let row = LookupRow {
            id,
            name: name.clone(),
        };
        match class {
            LookupClass::Type => tables.types.push(row),
            LookupClass::Ability => tables.abilities.push(row),
            LookupClass::Stat => tables.stats.push(row),
        }
        Ok(id)
    }

    pub fn lookup_count(&self, class: LookupClass) -> usize {
        self.tables.lock().lookup_table(class).len()
    }

    pub fn find_move(&self, name: &EntityName) -> Option<MoveRow> {
        let tables = self.tables.lock();
        tables.moves.iter().find(|row| row.name == *name).cloned()
    }

    pub fn insert_move(&self, data: &MoveData) -> Result<u32, DexError> {
        let mut tables = self.tables.lock();
        if tables.moves.iter().any(|row| row.name == data.name) {
            return Err(DexError::LookupConflict(format!("move {}", data.name)));
        }
        let id = next_id(&mut tables.next_move_id);
        tables.moves.push(MoveRow {
            id,
            dex_number: data.dex_number,
            name: data.name.clone(),
            power: data.power,
            pp: data.pp,
            priority: data.priority,
            accuracy: data.accuracy,
            category: data.category.clone(),
            type_name: data.type_name.clone(),
        });
        Ok(id)
    }

    /// Merges detail fields into an existing move row. Fields absent from the
    /// incoming data keep their stored values; lookups are never deleted.
    pub fn update_move(&self, id: u32, data: &MoveData) {
        let mut tables = self.tables.lock();
        if let Some(row) = tables.moves.iter_mut().find(|row| row.id == id) {
            if data.dex_number.is_some() {
                row.dex_number = data.dex_number;
            }
            if data.power.is_some() {
                row.power = data.power;
            }
            if data.pp.is_some() {
                row.pp = data.pp;
            }
            if data.priority.is_some() {
                row.priority = data.priority;
            }
            if data.accuracy.is_some() {
                row.accuracy = data.accuracy;
            }
            if data.category.is_some() {
                row.category = data.category.clone();
            }
            if data.type_name.is_some() {
                row.type_name = data.type_name.clone();
            }
        }
    }

    /// Replaces the relation sets of the listed classes for one Pokémon in a
    /// single lock acquisition: readers never observe a partially-deleted,
    /// partially-inserted set. Classes not listed are left untouched.
    pub fn replace_relations(
        &self,
        pokemon_id: u32,
        classes: &[RelationClass],
        relations: Vec<Relation>,
    ) {
        let mut tables = self.tables.lock();
        for class in classes {
            match class {
                RelationClass::Type => tables.pokemon_types.retain(|r| r.pokemon_id != pokemon_id),
                RelationClass::Ability => tables
                    .pokemon_abilities
                    .retain(|r| r.pokemon_id != pokemon_id),
                RelationClass::Stat => tables.pokemon_stats.retain(|r| r.pokemon_id != pokemon_id),
                RelationClass::Move => tables.pokemon_moves.retain(|r| r.pokemon_id != pokemon_id),
            }
        }
        for relation in relations {
            match relation {
                Relation::Type { type_id, slot } => tables.pokemon_types.push(PokemonTypeRow {
                    pokemon_id,
                    type_id,
                    slot,
                }),
                Relation::Ability {
                    ability_id,
                    slot,
                    hidden,
                } => tables.pokemon_abilities.push(PokemonAbilityRow {
                    pokemon_id,
                    ability_id,
                    slot,
                    hidden,
                }),
                Relation::Stat {
                    stat_id,
                    base,
                    effort,
                } => tables.pokemon_stats.push(PokemonStatRow {
                    pokemon_id,
                    stat_id,
                    base,
                    effort,
                }),
                Relation::Move {
                    move_id,
                    level_learned,
                    learn_method,
                } => tables.pokemon_moves.push(PokemonMoveRow {
                    pokemon_id,
                    move_id,
                    level_learned,
                    learn_method,
                }),
            }
        }
    }

    pub fn find_nature(&self, dex: DexId) -> Option<Nature> {
        let tables = self.tables.lock();
        tables
            .natures
            .iter()
            .find(|n| n.dex_number == dex)
            .cloned()
    }

    pub fn upsert_nature(&self, nature: &Nature) {
        let mut tables = self.tables.lock();
        if let Some(row) = tables
            .natures
            .iter_mut()
            .find(|n| n.dex_number == nature.dex_number)
        {
            *row = nature.clone();
        } else {
            tables.natures.push(nature.clone());
        }
    }

    pub fn find_item(&self, dex: DexId) -> Option<Item> {
        let tables = self.tables.lock();
        tables.items.iter().find(|i| i.dex_number == dex).cloned()
    }

    pub fn upsert_item(&self, item: &Item) {
        let mut tables = self.tables.lock();
        if let Some(row) = tables
            .items
            .iter_mut()
            .find(|i| i.dex_number == item.dex_number)
        {
            *row = item.clone();
        } else {
            tables.items.push(item.clone());
        }
    }

    pub fn pokemon_count(&self) -> usize {
        self.tables.lock().pokemon.len()
    }

    pub fn clear(&self) {
        let mut tables = self.tables.lock();
        *tables = Tables::default();
    }
}

fn hydrate(tables: &Tables, row: &PokemonRow, hydration: Hydration) -> PokemonRecord {
    let mut types: Vec<TypeLink> = tables
        .pokemon_types
        .iter()
        .filter(|r| r.pokemon_id == row.id)
        .filter_map(|r| {
            tables
                .types
                .iter()
                .find(|t| t.id == r.type_id)
                .map(|t| TypeLink {
                    name: t.name.clone(),
                    slot: r.slot,
                })
        })
        .collect();
    types.sort_by_key(|t| t.slot);

    let mut abilities: Vec<AbilityLink> = tables
        .pokemon_abilities
        .iter()
        .filter(|r| r.pokemon_id == row.id)
        .filter_map(|r| {
            tables
                .abilities
                .iter()
                .find(|a| a.id == r.ability_id)
                .map(|a| AbilityLink {
                    name: a.name.clone(),
                    slot: r.slot,
                    hidden: r.hidden,
                })
        })
        .collect();
    abilities.sort_by_key(|a| a.slot);

    let stats: Vec<StatLink> = tables
        .pokemon_stats
        .iter()
        .filter(|r| r.pokemon_id == row.id)
        .filter_map(|r| {
            tables
                .stats
                .iter()
                .find(|s| s.id == r.stat_id)
                .map(|s| StatLink {
                    name: s.name.clone(),
                    base: r.base,
                    effort: r.effort,
                })
        })
        .collect();

    let moves: Vec<MoveLink> = match hydration {
        Hydration::WithoutMoves => Vec::new(),
        Hydration::WithMoves => tables
            .pokemon_moves
            .iter()
            .filter(|r| r.pokemon_id == row.id)
            .filter_map(|r| {
                tables.moves.iter().find(|m| m.id == r.move_id).map(|m| MoveLink {
                    name: m.name.clone(),
                    level_learned: r.level_learned,
                    learn_method: r.learn_method.clone(),
                    power: m.power,
                    pp: m.pp,
                    priority: m.priority,
                    accuracy: m.accuracy,
                    category: m.category.clone(),
                    type_name: m.type_name.clone(),
                })
            })
            .collect(),
    };

    PokemonRecord {
        id: row.id,
        dex_number: row.dex_number,
        name: row.name.clone(),
        height: row.height,
        weight: row.weight,
        sprite_url: row.sprite_url.clone(),
        fetched_at: row.fetched_at.clone(),
        types,
        abilities,
        stats,
        moves,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::domain::TypeSlot;

    fn base_record(dex: u32, name: &str) -> NormalizedPokemon {
        NormalizedPokemon {
            dex_number: DexId::new(dex).unwrap(),
            name: name.parse().unwrap(),
            height: Some(7),
            weight: Some(69),
            sprite_url: None,
            types: Some(vec![TypeSlot {
                name: "grass".parse().unwrap(),
                slot: 1,
            }]),
            abilities: None,
            stats: None,
            moves: None,
        }
    }

    #[test]
    fn upsert_assigns_surrogate_keys_once() {
        let store = RecordStore::new();
        let first = store.upsert_pokemon(&base_record(1, "bulbasaur")).unwrap();
        let second = store.upsert_pokemon(&base_record(1, "bulbasaur")).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.pokemon_count(), 1);
    }

    #[test]
    fn upsert_rejects_name_collision_across_dex_numbers() {
        let store = RecordStore::new();
        store.upsert_pokemon(&base_record(1, "bulbasaur")).unwrap();
        let err = store
            .upsert_pokemon(&base_record(2, "bulbasaur"))
            .unwrap_err();
        assert_matches!(err, DexError::PersistFailed(_));
    }

    #[test]
    fn insert_lookup_conflicts_on_duplicate_name() {
        let store = RecordStore::new();
        let name: EntityName = "grass".parse().unwrap();
        store.insert_lookup(LookupClass::Type, &name).unwrap();
        let err = store.insert_lookup(LookupClass::Type, &name).unwrap_err();
        assert_matches!(err, DexError::LookupConflict(_));
        assert_eq!(store.lookup_count(LookupClass::Type), 1);
    }

    #[test]
    fn lookup_tables_are_independent_per_class() {
        let store = RecordStore::new();
        let name: EntityName = "speed".parse().unwrap();
        store.insert_lookup(LookupClass::Stat, &name).unwrap();
        assert!(store.find_lookup(LookupClass::Type, &name).is_none());
        assert!(store.find_lookup(LookupClass::Stat, &name).is_some());
    }

    #[test]
    fn replace_relations_drops_old_members() {
        let store = RecordStore::new();
        let pokemon_id = store.upsert_pokemon(&base_record(1, "bulbasaur")).unwrap();
        let grass = store
            .insert_lookup(LookupClass::Type, &"grass".parse().unwrap())
            .unwrap();
        let poison = store
            .insert_lookup(LookupClass::Type, &"poison".parse().unwrap())
            .unwrap();

        store.replace_relations(
            pokemon_id,
            &[RelationClass::Type],
            vec![
                Relation::Type {
                    type_id: grass,
                    slot: 1,
                },
                Relation::Type {
                    type_id: poison,
                    slot: 2,
                },
            ],
        );
        store.replace_relations(
            pokemon_id,
            &[RelationClass::Type],
            vec![Relation::Type {
                type_id: grass,
                slot: 1,
            }],
        );

        let record = store
            .find_pokemon(DexId::new(1).unwrap(), Hydration::WithoutMoves)
            .unwrap();
        assert_eq!(record.types.len(), 1);
        assert_eq!(record.types[0].name.as_str(), "grass");
    }

    #[test]
    fn replace_relations_leaves_unlisted_classes_untouched() {
        let store = RecordStore::new();
        let pokemon_id = store.upsert_pokemon(&base_record(1, "bulbasaur")).unwrap();
        let grass = store
            .insert_lookup(LookupClass::Type, &"grass".parse().unwrap())
            .unwrap();
        let overgrow = store
            .insert_lookup(LookupClass::Ability, &"overgrow".parse().unwrap())
            .unwrap();

        store.replace_relations(
            pokemon_id,
            &[RelationClass::Type, RelationClass::Ability],
            vec![
                Relation::Type {
                    type_id: grass,
                    slot: 1,
                },
                Relation::Ability {
                    ability_id: overgrow,
                    slot: 1,
                    hidden: false,
                },
            ],
        );
        store.replace_relations(
            pokemon_id,
            &[RelationClass::Type],
            vec![Relation::Type {
                type_id: grass,
                slot: 1,
            }],
        );

        let record = store
            .find_pokemon(DexId::new(1).unwrap(), Hydration::WithoutMoves)
            .unwrap();
        assert_eq!(record.abilities.len(), 1);
    }

    #[test]
    fn find_many_dedups_and_sorts() {
        let store = RecordStore::new();
        store.upsert_pokemon(&base_record(4, "charmander")).unwrap();
        store.upsert_pokemon(&base_record(1, "bulbasaur")).unwrap();
        let ids = vec![
            DexId::new(4).unwrap(),
            DexId::new(1).unwrap(),
            DexId::new(4).unwrap(),
            DexId::new(9).unwrap(),
        ];
        let records = store.find_many(&ids, Hydration::WithoutMoves);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].dex_number.value(), 1);
        assert_eq!(records[1].dex_number.value(), 4);
    }
}
