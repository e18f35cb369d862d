use serde::Serialize;

use crate::app::ClearResult;
use crate::domain::{Item, Nature, PokemonRecord};
use crate::error::DexError;

/// Pretty-JSON printer for CLI results.
pub struct JsonOutput;

impl JsonOutput {
    pub fn print_record(record: &PokemonRecord) -> Result<(), DexError> {
        Self::print(record)
    }

    pub fn print_records(records: &[PokemonRecord]) -> Result<(), DexError> {
        Self::print(&records)
    }

    pub fn print_nature(nature: &Nature) -> Result<(), DexError> {
        Self::print(nature)
    }

    pub fn print_item(item: &Item) -> Result<(), DexError> {
        Self::print(item)
    }

    pub fn print_clear(result: &ClearResult) -> Result<(), DexError> {
        Self::print(result)
    }

    pub fn render<T: Serialize>(value: &T) -> Result<String, DexError> {
        serde_json::to_string_pretty(value).map_err(|err| DexError::OutputEncode(err.to_string()))
    }

    fn print<T: Serialize>(value: &T) -> Result<(), DexError> {
        println!("{}", Self::render(value)?);
        Ok(())
    }
}
