use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;

use crate::domain::{
    AbilitySlot, DexId, EntityName, Item, MoveData, MoveDetails, Nature, NormalizedMove,
    NormalizedPokemon, StatLine, TypeSlot,
};
use crate::error::DexError;

pub const DEFAULT_BASE_URL: &str = "https://pokeapi.co/api/v2";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const AGENT: &str = concat!("dexsync/", env!("CARGO_PKG_VERSION"));

/// Retry budget for transient upstream failures. `max_retries` counts the
/// retries after the first attempt; the delay doubles per attempt.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }

    /// Runs `op`, retrying transient failures with exponential backoff.
    /// Permanent failures and budget exhaustion surface the last error.
    pub fn run<T, F>(&self, mut op: F) -> Result<T, DexError>
    where
        F: FnMut() -> Result<T, DexError>,
    {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    let delay = self.delay(attempt);
                    tracing::debug!(attempt, ?delay, %err, "retrying after transient failure");
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Read-only upstream catalog access. Implementations never touch the store.
pub trait PokeApiClient: Send + Sync {
    fn fetch_pokemon(&self, dex: DexId) -> Result<NormalizedPokemon, DexError>;
    fn fetch_pokemon_by_name(&self, name: &EntityName) -> Result<NormalizedPokemon, DexError>;
    fn fetch_move(&self, name: &EntityName) -> Result<MoveData, DexError>;
    fn fetch_nature(&self, dex: DexId) -> Result<Nature, DexError>;
    fn fetch_item(&self, dex: DexId) -> Result<Item, DexError>;
}

impl<C: PokeApiClient + ?Sized> PokeApiClient for &C {
    fn fetch_pokemon(&self, dex: DexId) -> Result<NormalizedPokemon, DexError> {
        (**self).fetch_pokemon(dex)
    }

    fn fetch_pokemon_by_name(&self, name: &EntityName) -> Result<NormalizedPokemon, DexError> {
        (**self).fetch_pokemon_by_name(name)
    }

    fn fetch_move(&self, name: &EntityName) -> Result<MoveData, DexError> {
        (**self).fetch_move(name)
    }

    fn fetch_nature(&self, dex: DexId) -> Result<Nature, DexError> {
        (**self).fetch_nature(dex)
    }

    fn fetch_item(&self, dex: DexId) -> Result<Item, DexError> {
        (**self).fetch_item(dex)
    }
}

pub struct PokeApiHttpClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl PokeApiHttpClient {
    pub fn new() -> Result<Self, DexError> {
        Self::with_settings(DEFAULT_BASE_URL, DEFAULT_TIMEOUT, RetryPolicy::default())
    }

    pub fn with_settings(
        base_url: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, DexError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(AGENT));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| DexError::UpstreamHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    fn get_json(&self, path: &str) -> Result<serde_json::Value, DexError> {
        let url = format!("{}/{}", self.base_url, path);
        self.retry.run(|| {
            let response = self.client.get(&url).send().map_err(classify_reqwest)?;
            let status = response.status();
            if !status.is_success() {
                return Err(DexError::UpstreamStatus {
                    status: status.as_u16(),
                    message: url.clone(),
                });
            }
            response
                .json::<serde_json::Value>()
                .map_err(|err| DexError::UpstreamDecode(err.to_string()))
        })
    }

    /// Fetches the parent record, then resolves each unique referenced move.
    /// A move sub-fetch that fails after retries degrades to the placeholder;
    /// the parent fetch itself never fails on a sub-fetch.
    fn fetch_pokemon_payload(&self, path: &str) -> Result<NormalizedPokemon, DexError> {
        let value = self.get_json(path)?;
        let parsed = parse_pokemon(&value)?;
        let moves = parsed
            .moves
            .into_iter()
            .map(|reference| {
                let details = match self.fetch_move(&reference.name) {
                    Ok(data) => MoveDetails::Fetched(data),
                    Err(err) => {
                        tracing::warn!(move_name = %reference.name, %err, "move fetch degraded to placeholder");
                        MoveDetails::Degraded(MoveData::placeholder(&reference.name))
                    }
                };
                NormalizedMove {
                    name: reference.name,
                    level_learned: reference.level_learned,
                    learn_method: reference.learn_method,
                    details,
                }
            })
            .collect();
        Ok(NormalizedPokemon {
            moves: Some(moves),
            ..parsed.base
        })
    }
}

impl PokeApiClient for PokeApiHttpClient {
    fn fetch_pokemon(&self, dex: DexId) -> Result<NormalizedPokemon, DexError> {
        self.fetch_pokemon_payload(&format!("pokemon/{dex}"))
    }

    fn fetch_pokemon_by_name(&self, name: &EntityName) -> Result<NormalizedPokemon, DexError> {
        self.fetch_pokemon_payload(&format!("pokemon/{name}"))
    }

    fn fetch_move(&self, name: &EntityName) -> Result<MoveData, DexError> {
        let value = self.get_json(&format!("move/{name}"))?;
        parse_move(&value)
    }

    fn fetch_nature(&self, dex: DexId) -> Result<Nature, DexError> {
        let value = self.get_json(&format!("nature/{dex}"))?;
        parse_nature(&value)
    }

    fn fetch_item(&self, dex: DexId) -> Result<Item, DexError> {
        let value = self.get_json(&format!("item/{dex}"))?;
        parse_item(&value)
    }
}

fn classify_reqwest(err: reqwest::Error) -> DexError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        DexError::UpstreamTransient(err.to_string())
    } else {
        DexError::UpstreamHttp(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireTypeSlot {
    slot: u8,
    #[serde(rename = "type")]
    type_ref: NamedRef,
}

#[derive(Debug, Deserialize)]
struct WireAbilitySlot {
    slot: u8,
    is_hidden: bool,
    ability: NamedRef,
}

#[derive(Debug, Deserialize)]
struct WireStat {
    base_stat: u16,
    effort: u16,
    stat: NamedRef,
}

#[derive(Debug, Deserialize)]
struct WireVersionGroupDetail {
    level_learned_at: Option<u16>,
    move_learn_method: Option<NamedRef>,
}

#[derive(Debug, Deserialize)]
struct WireMoveEntry {
    #[serde(rename = "move")]
    move_ref: NamedRef,
    #[serde(default)]
    version_group_details: Vec<WireVersionGroupDetail>,
}

#[derive(Debug, Deserialize)]
struct WireSprites {
    front_default: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WirePokemon {
    id: u32,
    name: String,
    height: Option<u32>,
    weight: Option<u32>,
    sprites: Option<WireSprites>,
    #[serde(default)]
    types: Vec<WireTypeSlot>,
    #[serde(default)]
    abilities: Vec<WireAbilitySlot>,
    #[serde(default)]
    stats: Vec<WireStat>,
    #[serde(default)]
    moves: Vec<WireMoveEntry>,
}

#[derive(Debug, Deserialize)]
struct WireDamageClass {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireMove {
    id: u32,
    name: String,
    power: Option<u16>,
    pp: Option<u16>,
    priority: Option<i16>,
    accuracy: Option<u16>,
    damage_class: Option<WireDamageClass>,
    #[serde(rename = "type")]
    type_ref: Option<NamedRef>,
}

#[derive(Debug, Deserialize)]
struct WireNature {
    id: u32,
    name: String,
    increased_stat: Option<NamedRef>,
    decreased_stat: Option<NamedRef>,
}

#[derive(Debug, Deserialize)]
struct WireItemSprites {
    default: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireItem {
    id: u32,
    name: String,
    sprites: Option<WireItemSprites>,
}

/// Move reference on a parent payload, before the detail sub-fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveReference {
    pub name: EntityName,
    pub level_learned: Option<u16>,
    pub learn_method: Option<String>,
}

/// Parent payload split into the base record and its move references.
#[derive(Debug)]
pub struct ParsedPokemon {
    pub base: NormalizedPokemon,
    pub moves: Vec<MoveReference>,
}

/// Maps a raw pokemon payload into the internal field set. Moves are
/// deduplicated by name, first occurrence wins; learn metadata comes from the
/// first version-group entry.
pub fn parse_pokemon(value: &serde_json::Value) -> Result<ParsedPokemon, DexError> {
    let wire: WirePokemon = serde_json::from_value(value.clone())
        .map_err(|err| DexError::UpstreamDecode(err.to_string()))?;
    let dex_number = DexId::new(wire.id)?;
    let name: EntityName = wire.name.parse()?;

    let types = wire
        .types
        .iter()
        .map(|t| {
            Ok(TypeSlot {
                name: t.type_ref.name.parse()?,
                slot: t.slot,
            })
        })
        .collect::<Result<Vec<_>, DexError>>()?;
    let abilities = wire
        .abilities
        .iter()
        .map(|a| {
            Ok(AbilitySlot {
                name: a.ability.name.parse()?,
                slot: a.slot,
                hidden: a.is_hidden,
            })
        })
        .collect::<Result<Vec<_>, DexError>>()?;
    let stats = wire
        .stats
        .iter()
        .map(|s| {
            Ok(StatLine {
                name: s.stat.name.parse()?,
                base: s.base_stat,
                effort: s.effort,
            })
        })
        .collect::<Result<Vec<_>, DexError>>()?;

    let mut moves: Vec<MoveReference> = Vec::new();
    for entry in &wire.moves {
        let move_name: EntityName = entry.move_ref.name.parse()?;
        if moves.iter().any(|m| m.name == move_name) {
            continue;
        }
        let detail = entry.version_group_details.first();
        moves.push(MoveReference {
            name: move_name,
            level_learned: detail.and_then(|d| d.level_learned_at),
            learn_method: detail.and_then(|d| d.move_learn_method.as_ref().map(|m| m.name.clone())),
        });
    }

    Ok(ParsedPokemon {
        base: NormalizedPokemon {
            dex_number,
            name,
            height: wire.height,
            weight: wire.weight,
            sprite_url: wire.sprites.and_then(|s| s.front_default),
            types: Some(types),
            abilities: Some(abilities),
            stats: Some(stats),
            moves: None,
        },
        moves,
    })
}

pub fn parse_move(value: &serde_json::Value) -> Result<MoveData, DexError> {
    let wire: WireMove = serde_json::from_value(value.clone())
        .map_err(|err| DexError::UpstreamDecode(err.to_string()))?;
    Ok(MoveData {
        dex_number: Some(DexId::new(wire.id)?),
        name: wire.name.parse()?,
        power: wire.power,
        pp: wire.pp,
        priority: wire.priority,
        accuracy: wire.accuracy,
        category: wire.damage_class.map(|d| d.name),
        type_name: wire
            .type_ref
            .map(|t| t.name.parse())
            .transpose()?,
    })
}

pub fn parse_nature(value: &serde_json::Value) -> Result<Nature, DexError> {
    let wire: WireNature = serde_json::from_value(value.clone())
        .map_err(|err| DexError::UpstreamDecode(err.to_string()))?;
    Ok(Nature {
        dex_number: DexId::new(wire.id)?,
        name: wire.name.parse()?,
        increased_stat: wire
            .increased_stat
            .map(|s| s.name)
            .unwrap_or_else(|| "unknown".to_string()),
        decreased_stat: wire
            .decreased_stat
            .map(|s| s.name)
            .unwrap_or_else(|| "unknown".to_string()),
    })
}

pub fn parse_item(value: &serde_json::Value) -> Result<Item, DexError> {
    let wire: WireItem = serde_json::from_value(value.clone())
        .map_err(|err| DexError::UpstreamDecode(err.to_string()))?;
    Ok(Item {
        dex_number: DexId::new(wire.id)?,
        name: wire.name.parse()?,
        sprite: wire.sprites.and_then(|s| s.default),
    })
}
