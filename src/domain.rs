use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DexError;

/// Upstream catalog id (the national dex number for Pokémon, the numeric id
/// for moves, natures, and items).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DexId(u32);

impl DexId {
    pub fn new(value: u32) -> Result<Self, DexError> {
        if value == 0 {
            return Err(DexError::InvalidDexId(value.to_string()));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DexId {
    type Err = DexError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parsed = value
            .trim()
            .parse::<u32>()
            .map_err(|_| DexError::InvalidDexId(value.to_string()))?;
        Self::new(parsed)
    }
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").unwrap())
}

/// Case-insensitive secondary lookup key. Stored lowercase; PokeAPI names are
/// lowercase ASCII words joined by hyphens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityName(String);

impl EntityName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn known(value: &'static str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for EntityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityName {
    type Err = DexError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        if !name_pattern().is_match(&normalized) {
            return Err(DexError::InvalidEntityName(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// Key accepted by the read path: a dex number or a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PokemonKey {
    Dex(DexId),
    Name(EntityName),
}

impl FromStr for PokemonKey {
    type Err = DexError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.chars().all(|ch| ch.is_ascii_digit()) && !trimmed.is_empty() {
            Ok(PokemonKey::Dex(trimmed.parse()?))
        } else {
            Ok(PokemonKey::Name(trimmed.parse()?))
        }
    }
}

/// Include shape for store reads: list views skip the move relation, detail
/// views hydrate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hydration {
    WithMoves,
    WithoutMoves,
}

/// Move detail fields consumed from the upstream move endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveData {
    pub dex_number: Option<DexId>,
    pub name: EntityName,
    pub power: Option<u16>,
    pub pp: Option<u16>,
    pub priority: Option<i16>,
    pub accuracy: Option<u16>,
    pub category: Option<String>,
    pub type_name: Option<EntityName>,
}

impl MoveData {
    /// Documented placeholder used when the move detail fetch fails after the
    /// retry budget: category "status", type "normal", no numeric fields.
    pub fn placeholder(name: &EntityName) -> Self {
        Self {
            dex_number: None,
            name: name.clone(),
            power: None,
            pp: None,
            priority: None,
            accuracy: None,
            category: Some("status".to_string()),
            type_name: Some(EntityName::known("normal")),
        }
    }
}

/// Outcome of a best-effort move sub-fetch. `Degraded` carries the
/// placeholder so callers can tell filled-in defaults from genuine data.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveDetails {
    Fetched(MoveData),
    Degraded(MoveData),
}

impl MoveDetails {
    pub fn data(&self) -> &MoveData {
        match self {
            MoveDetails::Fetched(data) | MoveDetails::Degraded(data) => data,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, MoveDetails::Degraded(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeSlot {
    pub name: EntityName,
    pub slot: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AbilitySlot {
    pub name: EntityName,
    pub slot: u8,
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatLine {
    pub name: EntityName,
    pub base: u16,
    pub effort: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMove {
    pub name: EntityName,
    pub level_learned: Option<u16>,
    pub learn_method: Option<String>,
    pub details: MoveDetails,
}

/// Upstream payload mapped into the subsystem's internal field set. A `None`
/// relation class means "absent from this record" and leaves the stored set
/// untouched on reconcile; `Some(vec![])` replaces it with the empty set.
#[derive(Debug, Clone)]
pub struct NormalizedPokemon {
    pub dex_number: DexId,
    pub name: EntityName,
    pub height: Option<u32>,
    pub weight: Option<u32>,
    pub sprite_url: Option<String>,
    pub types: Option<Vec<TypeSlot>>,
    pub abilities: Option<Vec<AbilitySlot>>,
    pub stats: Option<Vec<StatLine>>,
    pub moves: Option<Vec<NormalizedMove>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeLink {
    pub name: EntityName,
    pub slot: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbilityLink {
    pub name: EntityName,
    pub slot: u8,
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatLink {
    pub name: EntityName,
    pub base: u16,
    pub effort: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveLink {
    pub name: EntityName,
    pub level_learned: Option<u16>,
    pub learn_method: Option<String>,
    pub power: Option<u16>,
    pub pp: Option<u16>,
    pub priority: Option<i16>,
    pub accuracy: Option<u16>,
    pub category: Option<String>,
    pub type_name: Option<EntityName>,
}

/// Hydrated view of a cached Pokémon: the base row plus its relation sets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PokemonRecord {
    pub id: u32,
    pub dex_number: DexId,
    pub name: EntityName,
    pub height: Option<u32>,
    pub weight: Option<u32>,
    pub sprite_url: Option<String>,
    pub fetched_at: String,
    pub types: Vec<TypeLink>,
    pub abilities: Vec<AbilityLink>,
    pub stats: Vec<StatLink>,
    pub moves: Vec<MoveLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nature {
    pub dex_number: DexId,
    pub name: EntityName,
    pub increased_stat: String,
    pub decreased_stat: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub dex_number: DexId,
    pub name: EntityName,
    pub sprite: Option<String>,
}
