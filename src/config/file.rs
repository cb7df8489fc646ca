//! TOML configuration file loading
//!
//! Supports `~/.config/meshbot/config.toml` as a persistent config
//! source. All fields are optional — the file is a partial overlay on
//! top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// Mesh transport configuration
    #[serde(default)]
    pub transport: TransportFileConfig,

    /// LLM configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Relay behavior (channel, message sizing, pacing)
    #[serde(default)]
    pub relay: RelayFileConfig,

    /// Weather tool defaults
    #[serde(default)]
    pub weather: WeatherFileConfig,

    /// Storage locations
    #[serde(default)]
    pub storage: StorageFileConfig,
}

/// Mesh transport configuration
#[derive(Debug, Default, Deserialize)]
pub struct TransportFileConfig {
    /// Connection kind ("tcp" or "mock")
    pub kind: Option<String>,

    /// Companion bridge host (tcp)
    pub host: Option<String>,

    /// Companion bridge port (tcp)
    pub port: Option<u16>,

    /// Node name to advertise on the mesh
    pub node_name: Option<String>,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "gpt-4o-mini")
    pub model: Option<String>,

    /// OpenAI-compatible API base URL override
    pub base_url: Option<String>,

    /// API key (prefer the LLM_API_KEY env var over this)
    pub api_key: Option<String>,

    /// Response token cap
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    pub temperature: Option<f64>,
}

/// Relay behavior configuration
#[derive(Debug, Default, Deserialize)]
pub struct RelayFileConfig {
    /// Channel the bot listens on for mentions
    pub listen_channel: Option<u8>,

    /// Hard character cap per wire message
    pub max_message_length: Option<usize>,

    /// Mandatory pause between transmissions, in seconds
    pub inter_chunk_delay_secs: Option<f64>,

    /// Retry budget per chunk
    pub max_retries: Option<u32>,
}

/// Weather tool defaults
#[derive(Debug, Default, Deserialize)]
pub struct WeatherFileConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub forecast_days: Option<u8>,
}

/// Storage locations
#[derive(Debug, Default, Deserialize)]
pub struct StorageFileConfig {
    /// Data directory (database, system prompt)
    pub data_dir: Option<PathBuf>,
}

impl ConfigFile {
    /// Load and parse a TOML config file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let parsed = toml::from_str(&raw)?;
        Ok(parsed)
    }
}
