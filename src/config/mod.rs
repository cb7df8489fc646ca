//! Configuration management for the mesh relay gateway
//!
//! Resolution order: built-in defaults, then the TOML config file, then
//! environment variables. CLI flags are applied last by `main`.

pub mod file;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::delivery::{
    DEFAULT_INTER_CHUNK_DELAY_SECS, DEFAULT_MAX_RETRIES, DEFAULT_MESSAGE_LIMIT, DeliveryConfig,
};
use crate::{Error, Result};

use file::ConfigFile;

/// How to reach the companion radio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// In-memory mock, for development and tests
    Mock,
    /// TCP connection to a companion bridge
    Tcp,
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "tcp" => Ok(Self::Tcp),
            "serial" | "ble" => Err(Error::Config(format!(
                "transport kind '{s}' is not supported; connect the radio through the tcp bridge"
            ))),
            other => Err(Error::Config(format!("unknown transport kind '{other}'"))),
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mock => write!(f, "mock"),
            Self::Tcp => write!(f, "tcp"),
        }
    }
}

/// Mesh transport configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Connection kind
    pub kind: TransportKind,

    /// Companion bridge host (tcp)
    pub host: Option<String>,

    /// Companion bridge port (tcp)
    pub port: u16,

    /// Node name to advertise on the mesh
    pub node_name: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::Mock,
            host: None,
            port: 12345,
            node_name: Some("MeshBot".to_string()),
        }
    }
}

/// LLM configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model identifier for chat completions
    pub model: String,

    /// OpenAI-compatible API base URL
    pub base_url: Option<String>,

    /// API key
    pub api_key: Option<SecretString>,

    /// Response token cap
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key: None,
            max_tokens: 500,
            temperature: 0.7,
        }
    }
}

/// Relay behavior configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Channel the bot listens on for mentions
    pub listen_channel: u8,

    /// Hard character cap per wire message, including position suffixes
    pub max_message_length: usize,

    /// Mandatory pause between transmissions, in seconds
    pub inter_chunk_delay_secs: f64,

    /// Retry budget per chunk
    pub max_retries: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_channel: 0,
            max_message_length: DEFAULT_MESSAGE_LIMIT,
            inter_chunk_delay_secs: DEFAULT_INTER_CHUNK_DELAY_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl RelayConfig {
    /// Delivery tuning derived from this relay configuration
    #[must_use]
    pub fn delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig {
            limit: self.max_message_length,
            inter_chunk_delay: Duration::from_secs_f64(self.inter_chunk_delay_secs.max(0.0)),
            max_retries: self.max_retries,
        }
    }
}

/// Weather tool defaults
#[derive(Debug, Clone, Default)]
pub struct WeatherConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub forecast_days: u8,
}

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Mesh transport configuration
    pub transport: TransportConfig,

    /// LLM configuration
    pub llm: LlmConfig,

    /// Relay behavior
    pub relay: RelayConfig,

    /// Weather tool defaults
    pub weather: WeatherConfig,

    /// Data directory (database, system prompt)
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            llm: LlmConfig::default(),
            relay: RelayConfig::default(),
            weather: WeatherConfig {
                forecast_days: 3,
                ..WeatherConfig::default()
            },
            data_dir: default_data_dir(),
        }
    }
}

impl Config {
    /// Load configuration: defaults, then config file, then environment
    ///
    /// With an explicit `path` the file must exist; otherwise the default
    /// location is used when present and skipped when not.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read/parsed or validation fails
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        let file = match path {
            Some(path) => Some(ConfigFile::load(path)?),
            None => match default_config_path() {
                Some(path) if path.exists() => Some(ConfigFile::load(&path)?),
                _ => None,
            },
        };

        if let Some(file) = file {
            config.apply_file(file)?;
        }
        config.apply_env()?;
        config.validate()?;

        Ok(config)
    }

    /// Overlay values from a parsed config file
    fn apply_file(&mut self, file: ConfigFile) -> Result<()> {
        if let Some(kind) = file.transport.kind {
            self.transport.kind = kind.parse()?;
        }
        if file.transport.host.is_some() {
            self.transport.host = file.transport.host;
        }
        if let Some(port) = file.transport.port {
            self.transport.port = port;
        }
        if file.transport.node_name.is_some() {
            self.transport.node_name = file.transport.node_name;
        }

        if let Some(model) = file.llm.model {
            self.llm.model = model;
        }
        if file.llm.base_url.is_some() {
            self.llm.base_url = file.llm.base_url;
        }
        if let Some(api_key) = file.llm.api_key {
            self.llm.api_key = Some(SecretString::from(api_key));
        }
        if let Some(max_tokens) = file.llm.max_tokens {
            self.llm.max_tokens = max_tokens;
        }
        if let Some(temperature) = file.llm.temperature {
            self.llm.temperature = temperature;
        }

        if let Some(listen_channel) = file.relay.listen_channel {
            self.relay.listen_channel = listen_channel;
        }
        if let Some(max_message_length) = file.relay.max_message_length {
            self.relay.max_message_length = max_message_length;
        }
        if let Some(delay) = file.relay.inter_chunk_delay_secs {
            self.relay.inter_chunk_delay_secs = delay;
        }
        if let Some(max_retries) = file.relay.max_retries {
            self.relay.max_retries = max_retries;
        }

        if file.weather.latitude.is_some() {
            self.weather.latitude = file.weather.latitude;
        }
        if file.weather.longitude.is_some() {
            self.weather.longitude = file.weather.longitude;
        }
        if let Some(days) = file.weather.forecast_days {
            self.weather.forecast_days = days;
        }

        if let Some(data_dir) = file.storage.data_dir {
            self.data_dir = data_dir;
        }

        Ok(())
    }

    /// Overlay values from environment variables
    fn apply_env(&mut self) -> Result<()> {
        if let Ok(kind) = std::env::var("MESHBOT_TRANSPORT") {
            self.transport.kind = kind.parse()?;
        }
        if let Ok(host) = std::env::var("MESHBOT_HOST") {
            self.transport.host = Some(host);
        }
        if let Ok(port) = std::env::var("MESHBOT_PORT") {
            self.transport.port = port
                .parse()
                .map_err(|_| Error::Config(format!("invalid MESHBOT_PORT '{port}'")))?;
        }
        if let Ok(name) = std::env::var("MESHBOT_NODE_NAME") {
            self.transport.node_name = Some(name);
        }

        if let Ok(model) = std::env::var("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Ok(base_url) = std::env::var("LLM_BASE_URL") {
            self.llm.base_url = Some(base_url);
        }
        if let Ok(api_key) = std::env::var("LLM_API_KEY") {
            self.llm.api_key = Some(SecretString::from(api_key));
        }

        if let Ok(channel) = std::env::var("LISTEN_CHANNEL") {
            self.relay.listen_channel = channel
                .parse()
                .map_err(|_| Error::Config(format!("invalid LISTEN_CHANNEL '{channel}'")))?;
        }
        if let Ok(length) = std::env::var("MAX_MESSAGE_LENGTH") {
            self.relay.max_message_length = length
                .parse()
                .map_err(|_| Error::Config(format!("invalid MAX_MESSAGE_LENGTH '{length}'")))?;
        }

        if let Ok(lat) = std::env::var("WEATHER_LATITUDE") {
            self.weather.latitude = Some(
                lat.parse()
                    .map_err(|_| Error::Config(format!("invalid WEATHER_LATITUDE '{lat}'")))?,
            );
        }
        if let Ok(lon) = std::env::var("WEATHER_LONGITUDE") {
            self.weather.longitude = Some(
                lon.parse()
                    .map_err(|_| Error::Config(format!("invalid WEATHER_LONGITUDE '{lon}'")))?,
            );
        }

        Ok(())
    }

    /// Check invariants the rest of the gateway relies on
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first violated rule
    pub fn validate(&self) -> Result<()> {
        if self.transport.kind == TransportKind::Tcp && self.transport.host.is_none() {
            return Err(Error::Config(
                "tcp transport requires a host (transport.host or MESHBOT_HOST)".to_string(),
            ));
        }

        // The segmenter needs room for content next to a " (99/99)" suffix
        if self.relay.max_message_length <= 8 {
            return Err(Error::Config(format!(
                "relay.max_message_length {} cannot fit a chunk position suffix",
                self.relay.max_message_length
            )));
        }

        if self.relay.inter_chunk_delay_secs < 0.0 {
            return Err(Error::Config(
                "relay.inter_chunk_delay_secs must not be negative".to_string(),
            ));
        }

        if self.llm.api_key.is_none() && self.llm.base_url.is_none() {
            return Err(Error::Config(
                "LLM API key required: set LLM_API_KEY (or configure llm.base_url for a local endpoint)"
                    .to_string(),
            ));
        }

        if self.weather.latitude.is_some() != self.weather.longitude.is_some() {
            return Err(Error::Config(
                "weather.latitude and weather.longitude must be set together".to_string(),
            ));
        }

        Ok(())
    }
}

/// Default config file path (`~/.config/meshbot/config.toml`)
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "meshbot")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Default data directory (`~/.local/share/meshbot` or platform equivalent)
#[must_use]
pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "meshbot")
        .map_or_else(|| PathBuf::from("data"), |dirs| dirs.data_dir().to_path_buf())
}
