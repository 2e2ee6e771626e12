use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::{Path, PathBuf};

use crate::audio::AudioFormat;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Root directory for per-paragraph audio files
    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,

    /// Root directory for exported books
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// SQLite database location; the platform data dir when absent
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Speech synthesis config
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Export config
    #[serde(default)]
    pub export: ExportConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Speech backend type
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpeechProviderKind {
    // @provider: OpenAI-compatible /audio/speech endpoint
    #[default]
    OpenAI,
    // @provider: Offline silent-audio backend
    Mock,
}

impl SpeechProviderKind {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::Mock => "Mock",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::OpenAI => "openai".to_string(),
            Self::Mock => "mock".to_string(),
        }
    }
}

impl std::fmt::Display for SpeechProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for SpeechProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "mock" => Ok(Self::Mock),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Audio container requested from the backend
    #[serde(default = "default_response_format")]
    pub response_format: String,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: SpeechProviderKind) -> Self {
        match provider_type {
            SpeechProviderKind::OpenAI => Self {
                provider_type: "openai".to_string(),
                model: default_openai_model(),
                api_key: String::new(),
                endpoint: default_openai_endpoint(),
                timeout_secs: default_timeout_secs(),
                response_format: default_response_format(),
            },
            SpeechProviderKind::Mock => Self {
                provider_type: "mock".to_string(),
                model: String::new(),
                api_key: String::new(),
                endpoint: String::new(),
                timeout_secs: default_timeout_secs(),
                response_format: "wav".to_string(),
            },
        }
    }
}

/// Speech synthesis configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SynthesisConfig {
    /// Default speech provider
    #[serde(default)]
    pub provider: SpeechProviderKind,

    /// Available speech providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Default voice id, resolved by the provider
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Maximum number of paragraphs synthesized at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Rounds the driver runs to pick up failed paragraphs
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Attempts per provider call, including the first one
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base backoff in milliseconds, doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl SynthesisConfig {
    /// Get the configuration block of a provider type
    pub fn get_provider_config(&self, provider_type: &SpeechProviderKind) -> Option<&ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        self.available_providers.iter()
            .find(|p| p.provider_type == provider_str)
    }

    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(&self.provider)
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.api_key.clone())
            .unwrap_or_default()
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.endpoint.is_empty() {
                return provider_config.endpoint.clone();
            }
        }

        match self.provider {
            SpeechProviderKind::OpenAI => default_openai_endpoint(),
            SpeechProviderKind::Mock => String::new(),
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            provider: SpeechProviderKind::default(),
            available_providers: vec![
                ProviderConfig::new(SpeechProviderKind::OpenAI),
                ProviderConfig::new(SpeechProviderKind::Mock),
            ],
            voice: default_voice(),
            max_concurrent: default_max_concurrent(),
            max_rounds: default_max_rounds(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Export configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExportConfig {
    /// Output audio container
    #[serde(default)]
    pub format: AudioFormat,

    /// Target sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Target channel count
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Bitrate for lossy formats, ffmpeg syntax
    #[serde(default = "default_bitrate")]
    pub bitrate: String,

    /// A segment closes once it reaches this many minutes
    #[serde(default = "default_min_group_minutes")]
    pub min_group_minutes: u64,

    /// Advisory segment length, reported only
    #[serde(default = "default_target_group_minutes")]
    pub target_group_minutes: u64,

    /// Whether to zip the export directory
    #[serde(default = "default_true")]
    pub create_archive: bool,
}

impl ExportConfig {
    pub fn min_group_ms(&self) -> u64 {
        self.min_group_minutes * 60_000
    }

    pub fn target_group_ms(&self) -> u64 {
        self.target_group_minutes * 60_000
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: AudioFormat::default(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            bitrate: default_bitrate(),
            min_group_minutes: default_min_group_minutes(),
            target_group_minutes: default_target_group_minutes(),
            create_archive: true,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_audio_dir() -> PathBuf {
    PathBuf::from("audio")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_response_format() -> String {
    "mp3".to_string()
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "tts-1".to_string()
}

fn default_voice() -> String {
    "alloy".to_string()
}

fn default_max_concurrent() -> usize {
    5
}

fn default_max_rounds() -> u32 {
    3
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    2000 // 2s, 4s, 8s ...
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_channels() -> u16 {
    1
}

fn default_bitrate() -> String {
    "64k".to_string()
}

fn default_min_group_minutes() -> u64 {
    25
}

fn default_target_group_minutes() -> u64 {
    40
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load the configuration from a JSON file, writing a default one when it doesn't exist
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to open config file: {:?}", path))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            return Ok(config);
        }

        warn!("Config file not found at {:?}, creating default config.", path);
        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write default config to file: {:?}", path))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        let synthesis = &self.synthesis;
        if synthesis.max_concurrent == 0 {
            return Err(anyhow!("synthesis.max_concurrent must be at least 1"));
        }
        if synthesis.max_rounds == 0 {
            return Err(anyhow!("synthesis.max_rounds must be at least 1"));
        }
        if synthesis.retry_count == 0 {
            return Err(anyhow!("synthesis.retry_count must be at least 1"));
        }
        if synthesis.voice.trim().is_empty() {
            return Err(anyhow!("synthesis.voice must not be empty"));
        }

        if synthesis.provider == SpeechProviderKind::OpenAI {
            if synthesis.get_api_key().is_empty() {
                return Err(anyhow!("Speech API key is required for OpenAI provider"));
            }
            let endpoint = synthesis.get_endpoint();
            url::Url::parse(&endpoint)
                .with_context(|| format!("Invalid OpenAI endpoint: {}", endpoint))?;
        }

        let export = &self.export;
        if export.sample_rate == 0 {
            return Err(anyhow!("export.sample_rate must be positive"));
        }
        if !(1..=2).contains(&export.channels) {
            return Err(anyhow!("export.channels must be 1 or 2, got {}", export.channels));
        }
        if export.min_group_minutes == 0 {
            return Err(anyhow!("export.min_group_minutes must be positive"));
        }
        if export.target_group_minutes < export.min_group_minutes {
            warn!(
                "export.target_group_minutes ({}) is below min_group_minutes ({})",
                export.target_group_minutes, export.min_group_minutes
            );
        }

        Ok(())
    }

    /// Resolved database location
    pub fn resolved_database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => crate::database::DatabaseConnection::default_database_path(),
        }
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            audio_dir: default_audio_dir(),
            output_dir: default_output_dir(),
            database_path: None,
            synthesis: SynthesisConfig::default(),
            export: ExportConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
