//! Configuration parsing and validation.
//!
//! Seismograph reads a TOML file with two sections:
//!
//! ```toml
//! [store]
//! endpoint = "sqlite:./data/seismograph.sqlite"
//! timeout_secs = 60
//!
//! [ingest]
//! buffer_size = 100
//! ```
//!
//! Collector deployments spell these `storeEndpoint`, `storeTimeout` and
//! `bufferSize`; both spellings are accepted.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use seismograph_core::batch::DEFAULT_BUFFER_SIZE;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// `sqlite:<path>` or a bare file path.
    #[serde(alias = "storeEndpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs", alias = "storeTimeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_buffer_size", alias = "bufferSize")]
    pub buffer_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}
fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

impl Config {
    /// Configuration for a store at `endpoint` with default settings.
    pub fn for_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            store: StoreConfig {
                endpoint: endpoint.into(),
                timeout_secs: default_timeout_secs(),
            },
            ingest: IngestConfig::default(),
        }
    }

    /// Filesystem path of the SQLite database named by the endpoint.
    pub fn db_path(&self) -> PathBuf {
        let endpoint = self.store.endpoint.trim();
        let path = endpoint
            .strip_prefix("sqlite://")
            .or_else(|| endpoint.strip_prefix("sqlite:"))
            .unwrap_or(endpoint);
        PathBuf::from(path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.store.timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.store.endpoint.trim().is_empty() {
            bail!("store.endpoint must not be empty");
        }
        if self.store.timeout_secs == 0 {
            bail!("store.timeout_secs must be > 0");
        }
        if self.ingest.buffer_size == 0 {
            bail!("ingest.buffer_size must be > 0");
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let config = parse_config("[store]\nendpoint = \"sqlite:./data/s.sqlite\"\n").unwrap();
        assert_eq!(config.store.timeout_secs, 60);
        assert_eq!(config.ingest.buffer_size, 100);
        assert_eq!(config.db_path(), PathBuf::from("./data/s.sqlite"));
    }

    #[test]
    fn accepts_collector_spelling() {
        let config = parse_config(
            "[store]\nstoreEndpoint = \"/tmp/s.sqlite\"\nstoreTimeout = 5\n\n[ingest]\nbufferSize = 7\n",
        )
        .unwrap();
        assert_eq!(config.store.timeout_secs, 5);
        assert_eq!(config.ingest.buffer_size, 7);
        assert_eq!(config.db_path(), PathBuf::from("/tmp/s.sqlite"));
    }

    #[test]
    fn rejects_zero_buffer() {
        let err = parse_config("[store]\nendpoint = \"x.sqlite\"\n\n[ingest]\nbuffer_size = 0\n")
            .unwrap_err();
        assert!(err.to_string().contains("buffer_size"));
    }

    #[test]
    fn rejects_empty_endpoint() {
        assert!(parse_config("[store]\nendpoint = \"  \"\n").is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        assert!(parse_config("[store]\nendpoint = \"x.sqlite\"\ntimeout_secs = 0\n").is_err());
    }
}
