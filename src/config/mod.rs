//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to layer config sources: {0}")]
    LayerError(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Which document store backs the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSONL files under `data_dir`
    #[default]
    Jsonl,
    /// Process-local, lost on exit
    Memory,
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,
}

/// Game API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsuConfig {
    /// Base URL of the v1 API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    "https://osu.ppy.sh/api".to_string()
}

fn default_api_key_env() -> String {
    "OSU_API_KEY".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for OsuConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl OsuConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

/// Ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Scores below this are left out of side totals and score records
    #[serde(default = "default_ignore_threshold")]
    pub ignore_threshold: u64,

    /// Player ids always left out (referees, spectators)
    #[serde(default)]
    pub ignore_player_ids: Vec<String>,

    /// How many Pool Meta documents `determine_pool` scans
    #[serde(default = "default_pool_scan_limit")]
    pub pool_scan_limit: usize,

    /// Skip head-to-head maps with a warning instead of failing
    #[serde(default)]
    pub skip_unsupported_maps: bool,
}

fn default_ignore_threshold() -> u64 {
    1000
}

fn default_pool_scan_limit() -> usize {
    100
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            ignore_threshold: default_ignore_threshold(),
            ignore_player_ids: Vec::new(),
            pool_scan_limit: default_pool_scan_limit(),
            skip_unsupported_maps: false,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub osu: OsuConfig,

    #[serde(default)]
    pub ingest: IngestConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            storage: StorageSettings::default(),
            osu: OsuConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load an optional TOML file, then apply `STK__SECTION__KEY` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix("STK")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("ingest.ignore_player_ids"),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.osu.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "osu! API timeout must be greater than 0".to_string(),
            ));
        }

        if self.ingest.pool_scan_limit == 0 {
            return Err(ConfigError::ValidationError(
                "Pool scan limit must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
