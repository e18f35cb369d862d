use std::fs;

use dexsync::pokeapi::{parse_move, parse_pokemon};

#[test]
fn parse_pokemon_payload() {
    let raw = fs::read_to_string("tests/fixtures/pokemon_bulbasaur.json").unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let parsed = parse_pokemon(&value).unwrap();

    assert_eq!(parsed.base.dex_number.value(), 1);
    assert_eq!(parsed.base.name.as_str(), "bulbasaur");
    assert_eq!(parsed.base.height, Some(7));
    assert_eq!(parsed.base.weight, Some(69));
    assert!(
        parsed
            .base
            .sprite_url
            .as_deref()
            .unwrap()
            .ends_with("/1.png")
    );

    let types = parsed.base.types.as_ref().unwrap();
    assert_eq!(types.len(), 2);
    assert_eq!(types[0].name.as_str(), "grass");
    assert_eq!(types[0].slot, 1);

    let abilities = parsed.base.abilities.as_ref().unwrap();
    assert_eq!(abilities.len(), 2);
    assert!(abilities[1].hidden);

    let stats = parsed.base.stats.as_ref().unwrap();
    assert_eq!(stats.len(), 3);
    assert_eq!(stats[2].name.as_str(), "speed");
    assert_eq!(stats[2].effort, 1);
}

#[test]
fn parse_pokemon_dedups_moves_first_occurrence_wins() {
    let raw = fs::read_to_string("tests/fixtures/pokemon_bulbasaur.json").unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let parsed = parse_pokemon(&value).unwrap();

    // tackle appears twice in the payload with different learn methods
    assert_eq!(parsed.moves.len(), 2);
    let tackle = parsed
        .moves
        .iter()
        .find(|m| m.name.as_str() == "tackle")
        .unwrap();
    assert_eq!(tackle.level_learned, Some(1));
    assert_eq!(tackle.learn_method.as_deref(), Some("level-up"));
}

#[test]
fn parse_move_payload() {
    let value = serde_json::json!({
        "id": 33,
        "name": "tackle",
        "power": 40,
        "pp": 35,
        "priority": 0,
        "accuracy": 100,
        "damage_class": { "name": "physical" },
        "type": { "name": "normal" }
    });
    let data = parse_move(&value).unwrap();
    assert_eq!(data.dex_number.unwrap().value(), 33);
    assert_eq!(data.name.as_str(), "tackle");
    assert_eq!(data.power, Some(40));
    assert_eq!(data.pp, Some(35));
    assert_eq!(data.category.as_deref(), Some("physical"));
    assert_eq!(data.type_name.as_ref().unwrap().as_str(), "normal");
}

#[test]
fn parse_move_tolerates_null_detail_fields() {
    let value = serde_json::json!({
        "id": 347,
        "name": "calm-mind",
        "power": null,
        "pp": 20,
        "priority": 0,
        "accuracy": null,
        "damage_class": { "name": "status" },
        "type": { "name": "psychic" }
    });
    let data = parse_move(&value).unwrap();
    assert!(data.power.is_none());
    assert!(data.accuracy.is_none());
    assert_eq!(data.pp, Some(20));
}
