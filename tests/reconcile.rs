use std::sync::Mutex;

use dexsync::domain::{
    AbilitySlot, DexId, EntityName, Item, MoveData, MoveDetails, Nature, NormalizedMove,
    NormalizedPokemon, StatLine, TypeSlot,
};
use dexsync::error::DexError;
use dexsync::pokeapi::PokeApiClient;
use dexsync::reconcile::Reconciler;
use dexsync::store::{LookupClass, RecordStore};

#[derive(Default)]
struct MockPokeApi {
    move_fetches: Mutex<usize>,
}

impl PokeApiClient for MockPokeApi {
    fn fetch_pokemon(&self, _dex: DexId) -> Result<NormalizedPokemon, DexError> {
        Err(DexError::UpstreamHttp("not implemented".to_string()))
    }

    fn fetch_pokemon_by_name(&self, _name: &EntityName) -> Result<NormalizedPokemon, DexError> {
        Err(DexError::UpstreamHttp("not implemented".to_string()))
    }

    fn fetch_move(&self, name: &EntityName) -> Result<MoveData, DexError> {
        *self.move_fetches.lock().unwrap() += 1;
        Ok(MoveData {
            dex_number: Some(DexId::new(33).unwrap()),
            name: name.clone(),
            power: Some(40),
            pp: Some(35),
            priority: Some(0),
            accuracy: Some(100),
            category: Some("physical".to_string()),
            type_name: Some("normal".parse().unwrap()),
        })
    }

    fn fetch_nature(&self, _dex: DexId) -> Result<Nature, DexError> {
        Err(DexError::UpstreamHttp("not implemented".to_string()))
    }

    fn fetch_item(&self, _dex: DexId) -> Result<Item, DexError> {
        Err(DexError::UpstreamHttp("not implemented".to_string()))
    }
}

fn bulbasaur(types: &[(&str, u8)]) -> NormalizedPokemon {
    NormalizedPokemon {
        dex_number: DexId::new(1).unwrap(),
        name: "bulbasaur".parse().unwrap(),
        height: Some(7),
        weight: Some(69),
        sprite_url: None,
        types: Some(
            types
                .iter()
                .map(|(name, slot)| TypeSlot {
                    name: name.parse().unwrap(),
                    slot: *slot,
                })
                .collect(),
        ),
        abilities: Some(vec![AbilitySlot {
            name: "overgrow".parse().unwrap(),
            slot: 1,
            hidden: false,
        }]),
        stats: Some(vec![StatLine {
            name: "hp".parse().unwrap(),
            base: 45,
            effort: 0,
        }]),
        moves: None,
    }
}

fn fetched_move(name: &str, level: u16) -> NormalizedMove {
    let name: EntityName = name.parse().unwrap();
    NormalizedMove {
        name: name.clone(),
        level_learned: Some(level),
        learn_method: Some("level-up".to_string()),
        details: MoveDetails::Fetched(MoveData {
            dex_number: None,
            name,
            power: Some(45),
            pp: Some(25),
            priority: Some(0),
            accuracy: Some(100),
            category: Some("physical".to_string()),
            type_name: Some("grass".parse().unwrap()),
        }),
    }
}

#[test]
fn relation_replacement_removes_old_members() {
    let store = RecordStore::new();
    let client = MockPokeApi::default();
    let engine = Reconciler::new(&store, &client);

    engine
        .upsert_pokemon(&bulbasaur(&[("grass", 1), ("poison", 2)]))
        .unwrap();
    let record = engine.upsert_pokemon(&bulbasaur(&[("grass", 1)])).unwrap();

    assert_eq!(record.types.len(), 1);
    assert_eq!(record.types[0].name.as_str(), "grass");
    // the poison lookup row survives replacement
    assert_eq!(store.lookup_count(LookupClass::Type), 2);
}

#[test]
fn reconcile_is_idempotent() {
    let store = RecordStore::new();
    let client = MockPokeApi::default();
    let engine = Reconciler::new(&store, &client);

    let incoming = bulbasaur(&[("grass", 1), ("poison", 2)]);
    let first = engine.upsert_pokemon(&incoming).unwrap();
    let second = engine.upsert_pokemon(&incoming).unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.types.len(), 2);
    assert_eq!(second.abilities.len(), 1);
    assert_eq!(second.stats.len(), 1);
    assert_eq!(store.pokemon_count(), 1);
    assert_eq!(store.lookup_count(LookupClass::Type), 2);
}

#[test]
fn absent_relation_class_is_left_untouched() {
    let store = RecordStore::new();
    let client = MockPokeApi::default();
    let engine = Reconciler::new(&store, &client);

    engine
        .upsert_pokemon(&bulbasaur(&[("grass", 1), ("poison", 2)]))
        .unwrap();

    let mut scalars_only = bulbasaur(&[]);
    scalars_only.types = None;
    scalars_only.abilities = None;
    scalars_only.stats = None;
    let record = engine.upsert_pokemon(&scalars_only).unwrap();

    assert_eq!(record.types.len(), 2);
    assert_eq!(record.abilities.len(), 1);
}

#[test]
fn concurrent_get_or_create_yields_one_lookup_row() {
    let store = RecordStore::new();
    let client = MockPokeApi::default();
    let name: EntityName = "grass".parse().unwrap();

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                let engine = Reconciler::new(&store, &client);
                engine
                    .get_or_create_lookup(LookupClass::Type, &name)
                    .unwrap();
            });
        }
    });

    assert_eq!(store.lookup_count(LookupClass::Type), 1);
}

#[test]
fn degraded_move_persists_placeholder_without_backfill() {
    let store = RecordStore::new();
    let client = MockPokeApi::default();
    let engine = Reconciler::new(&store, &client);

    let name: EntityName = "hyper-beam".parse().unwrap();
    let mut incoming = bulbasaur(&[("grass", 1)]);
    incoming.moves = Some(vec![NormalizedMove {
        name: name.clone(),
        level_learned: None,
        learn_method: None,
        details: MoveDetails::Degraded(MoveData::placeholder(&name)),
    }]);
    engine.upsert_pokemon(&incoming).unwrap();

    let row = store.find_move(&name).unwrap();
    assert_eq!(row.category.as_deref(), Some("status"));
    assert_eq!(row.type_name.as_ref().unwrap().as_str(), "normal");
    assert!(row.power.is_none());
    assert_eq!(*client.move_fetches.lock().unwrap(), 0);
}

#[test]
fn incomplete_cached_move_is_backfilled_once() {
    let store = RecordStore::new();
    let client = MockPokeApi::default();
    let engine = Reconciler::new(&store, &client);

    let name: EntityName = "tackle".parse().unwrap();
    store
        .insert_move(&MoveData {
            dex_number: None,
            name: name.clone(),
            power: None,
            pp: None,
            priority: None,
            accuracy: None,
            category: None,
            type_name: None,
        })
        .unwrap();

    let mut incoming = bulbasaur(&[("grass", 1)]);
    incoming.moves = Some(vec![NormalizedMove {
        name: name.clone(),
        level_learned: Some(1),
        learn_method: Some("level-up".to_string()),
        details: MoveDetails::Fetched(MoveData {
            dex_number: None,
            name: name.clone(),
            power: None,
            pp: None,
            priority: None,
            accuracy: None,
            category: None,
            type_name: None,
        }),
    }]);
    engine.upsert_pokemon(&incoming).unwrap();

    assert_eq!(*client.move_fetches.lock().unwrap(), 1);
    let row = store.find_move(&name).unwrap();
    assert_eq!(row.pp, Some(35));
    assert_eq!(row.category.as_deref(), Some("physical"));
}

#[test]
fn complete_move_skips_backfill() {
    let store = RecordStore::new();
    let client = MockPokeApi::default();
    let engine = Reconciler::new(&store, &client);

    let mut incoming = bulbasaur(&[("grass", 1)]);
    incoming.moves = Some(vec![fetched_move("vine-whip", 3)]);
    let record = engine.upsert_pokemon(&incoming).unwrap();

    assert_eq!(record.moves.len(), 1);
    assert_eq!(record.moves[0].pp, Some(25));
    assert_eq!(*client.move_fetches.lock().unwrap(), 0);
}
