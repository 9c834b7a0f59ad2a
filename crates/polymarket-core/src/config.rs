//! Configuration management for the sweep bot.

use crate::{Error, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Default location of the persisted paper-trade document.
pub const DEFAULT_PAPER_HISTORY_PATH: &str = "data/paper_history.json";

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub polymarket: PolymarketConfig,
    pub paper: PaperStoreConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PolymarketConfig {
    pub clob_url: Option<String>,
}

/// Where and how often paper-trade history is persisted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaperStoreConfig {
    pub history_path: PathBuf,
    /// Cadence of the background writer; bursts inside one tick coalesce.
    pub flush_interval_ms: u64,
}

impl Default for PaperStoreConfig {
    fn default() -> Self {
        Self {
            history_path: PathBuf::from(DEFAULT_PAPER_HISTORY_PATH),
            flush_interval_ms: 1_000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let flush_interval_ms = match env::var("PAPER_FLUSH_INTERVAL_MS") {
            Ok(raw) => raw.parse().map_err(|_| Error::Config {
                message: format!("PAPER_FLUSH_INTERVAL_MS is not an integer: {raw}"),
            })?,
            Err(_) => PaperStoreConfig::default().flush_interval_ms,
        };

        Ok(Self {
            polymarket: PolymarketConfig {
                clob_url: env::var("POLYMARKET_CLOB_URL").ok(),
            },
            paper: PaperStoreConfig {
                history_path: env::var("PAPER_HISTORY_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_PAPER_HISTORY_PATH)),
                flush_interval_ms,
            },
        })
    }

    /// Load layered configuration: an optional file, overridden by
    /// `SWEEP_`-prefixed environment variables (`SWEEP_PAPER__HISTORY_PATH`).
    pub fn load(path: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("SWEEP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
