use crate::domain::PokemonRecord;

/// A cached record is servable when every checked relation class is
/// populated. A base row that was persisted but never had its relations
/// committed has empty sets and must be refreshed.
pub fn is_complete(record: &PokemonRecord, require_moves: bool) -> bool {
    let base =
        !record.types.is_empty() && !record.abilities.is_empty() && !record.stats.is_empty();
    if require_moves {
        base && !record.moves.is_empty()
    } else {
        base
    }
}
