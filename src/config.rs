use std::fs;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::Deserialize;

use crate::error::DexError;
use crate::pokeapi::{self, RetryPolicy};

const DEFAULT_CONFIG_FILE: &str = "dexsync.json";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// On-disk config shape. Every field is optional; absent fields fall back to
/// documented defaults.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub base_delay_ms: Option<u64>,
    #[serde(default)]
    pub snapshot: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub snapshot_path: Utf8PathBuf,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolves the effective config. An explicitly named file must exist;
    /// the default file is optional and its absence means all-defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, DexError> {
        let (file, required) = match path {
            Some(explicit) => (Utf8PathBuf::from(explicit), true),
            None => (Utf8PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        let config = if file.as_std_path().exists() {
            Self::read(&file)?
        } else if required {
            return Err(DexError::ConfigRead(file));
        } else {
            Config::default()
        };
        Ok(Self::with_defaults(config))
    }

    fn read(path: &Utf8Path) -> Result<Config, DexError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| DexError::ConfigRead(path.to_path_buf()))?;
        serde_json::from_str(&content).map_err(|err| DexError::ConfigParse(err.to_string()))
    }

    fn with_defaults(config: Config) -> ResolvedConfig {
        ResolvedConfig {
            base_url: config
                .base_url
                .unwrap_or_else(|| pokeapi::DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            retry: RetryPolicy {
                max_retries: config.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
                base_delay: Duration::from_millis(
                    config.base_delay_ms.unwrap_or(DEFAULT_BASE_DELAY_MS),
                ),
            },
            snapshot_path: config.snapshot.unwrap_or_else(default_snapshot_path),
        }
    }
}

fn default_snapshot_path() -> Utf8PathBuf {
    BaseDirs::new()
        .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.cache_dir().to_path_buf()).ok())
        .map(|cache| cache.join("dexsync").join("store.json"))
        .unwrap_or_else(|| Utf8PathBuf::from("store.json"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn missing_default_file_resolves_to_defaults() {
        let resolved = ConfigLoader::resolve(None).unwrap();
        assert_eq!(resolved.base_url, pokeapi::DEFAULT_BASE_URL);
        assert_eq!(resolved.timeout, Duration::from_secs(10));
        assert_eq!(resolved.retry.max_retries, 3);
        assert_eq!(resolved.retry.base_delay, Duration::from_millis(1000));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = ConfigLoader::resolve(Some("/nonexistent/dexsync.json")).unwrap_err();
        assert_matches!(err, DexError::ConfigRead(_));
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"max_retries": 1, "base_delay_ms": 50}}"#).unwrap();
        let resolved = ConfigLoader::resolve(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(resolved.retry.max_retries, 1);
        assert_eq!(resolved.retry.base_delay, Duration::from_millis(50));
        assert_eq!(resolved.base_url, pokeapi::DEFAULT_BASE_URL);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "not json").unwrap();
        let err = ConfigLoader::resolve(Some(file.path().to_str().unwrap())).unwrap_err();
        assert_matches!(err, DexError::ConfigParse(_));
    }
}
