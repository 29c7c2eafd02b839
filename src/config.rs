//! Configuration management for GiveChain

use crate::blockchain::MAX_DIFFICULTY;
use crate::error::ChainError;
use crate::miner::MiningLimits;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Required number of leading zero hex digits in every block hash.
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
    #[serde(default = "default_max_mining_attempts")]
    pub max_mining_attempts: u64,
    #[serde(
        default = "default_mining_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub mining_timeout: Duration,
    /// Full read-mine-write cycles attempted before a store conflict surfaces.
    #[serde(default = "default_max_append_retries")]
    pub max_append_retries: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            max_mining_attempts: default_max_mining_attempts(),
            mining_timeout: default_mining_timeout(),
            max_append_retries: default_max_append_retries(),
        }
    }
}

impl LedgerConfig {
    pub fn with_difficulty(difficulty: u32) -> Self {
        Self {
            difficulty,
            ..Self::default()
        }
    }

    pub fn mining_limits(&self) -> MiningLimits {
        MiningLimits::new(self.max_mining_attempts, self.mining_timeout)
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(ChainError::ConfigError(format!(
                "ledger.difficulty must be at most {}",
                MAX_DIFFICULTY
            )));
        }
        if self.max_append_retries == 0 {
            return Err(ChainError::ConfigError(
                "ledger.max_append_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

/// Parses a config document and validates critical values.
pub fn parse_config(config_str: &str) -> Result<Config, ChainError> {
    let config: Config = toml::from_str(config_str)
        .map_err(|e| ChainError::ConfigError(format!("Invalid {}: {}", CONFIG_FILE, e)))?;

    if config.database.path.is_empty() {
        return Err(ChainError::ConfigError(format!(
            "database.path must be set in {}",
            CONFIG_FILE
        )));
    }
    config.ledger.validate()?;

    Ok(config)
}

/// Loads `config.toml` from the working directory, falling back to defaults
/// when it is absent. `PORT` overrides `server.port`.
pub fn load_config() -> Result<Config, ChainError> {
    let config_str = fs::read_to_string(CONFIG_FILE).unwrap_or_default();
    let mut config = parse_config(&config_str)?;

    if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
        config.server.port = port;
    }

    Ok(config)
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "./data/ledger.db".to_string()
}

fn default_difficulty() -> u32 {
    2
}

fn default_max_mining_attempts() -> u64 {
    50_000_000
}

fn default_mining_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_append_retries() -> u32 {
    3
}
