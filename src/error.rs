use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DexError {
    #[error("invalid dex number: {0}")]
    InvalidDexId(String),

    #[error("invalid entity name: {0}")]
    InvalidEntityName(String),

    #[error("transient PokeAPI failure: {0}")]
    UpstreamTransient(String),

    #[error("PokeAPI request failed: {0}")]
    UpstreamHttp(String),

    #[error("PokeAPI returned status {status}: {message}")]
    UpstreamStatus { status: u16, message: String },

    #[error("malformed PokeAPI payload: {0}")]
    UpstreamDecode(String),

    #[error("pokemon not found: {0}")]
    PokemonNotFound(String),

    #[error("failed to persist record: {0}")]
    PersistFailed(String),

    #[error("uniqueness conflict on {0}")]
    LookupConflict(String),

    #[error("lookup row for {0} missing after uniqueness conflict")]
    LookupInconsistent(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("failed to encode output: {0}")]
    OutputEncode(String),
}

impl DexError {
    /// Transient failures are eligible for retry; everything else propagates
    /// immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DexError::UpstreamTransient(_)
                | DexError::UpstreamStatus {
                    status: 429 | 500 | 502 | 503 | 504,
                    ..
                }
        )
    }
}
