/*!
 * Speech backends.
 *
 * This module contains the speech synthesis capability and its backends:
 * - OpenAI: OpenAI-compatible `/audio/speech` endpoint
 * - Mock: offline backend writing silent WAV audio, for dry runs and tests
 *
 * Backends are looked up by name in an explicit `ProviderRegistry` built from
 * the configuration.
 */

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use crate::app_config::SynthesisConfig;
use crate::database::WordTiming;
use crate::errors::SynthesisError;

pub mod retry;
pub mod openai;
pub mod mock;

pub use mock::MockSpeechProvider;
pub use openai::OpenAiSpeech;
pub use retry::RetryPolicy;

/// A voice offered by a backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceInfo {
    /// Short id accepted on the command line
    pub id: String,
    /// Full voice key sent to the backend
    pub key: String,
    pub locale: String,
    pub gender: String,
}

impl VoiceInfo {
    pub fn new(id: &str, key: &str, locale: &str, gender: &str) -> Self {
        Self {
            id: id.to_string(),
            key: key.to_string(),
            locale: locale.to_string(),
            gender: gender.to_string(),
        }
    }
}

/// Result of one successful synthesis call; the audio itself is on disk
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynthesisOutput {
    /// Bytes written to the destination file
    pub bytes_written: u64,
    /// Word boundaries, when the backend reports them
    pub word_timings: Option<Vec<WordTiming>>,
}

/// Common trait for all speech backends
///
/// Implementations apply their own retry policy: a returned error is final.
#[async_trait]
pub trait SpeechProvider: Send + Sync + Debug {
    /// Registry name
    fn name(&self) -> &str;

    /// Voices this backend accepts
    fn supported_voices(&self) -> Vec<VoiceInfo>;

    /// File extension of the audio this backend writes
    fn audio_extension(&self) -> &str;

    /// Map a short voice id to the backend's voice key; unknown ids pass through
    fn resolve_voice(&self, voice: &str) -> String {
        self.supported_voices()
            .into_iter()
            .find(|v| v.id.eq_ignore_ascii_case(voice))
            .map(|v| v.key)
            .unwrap_or_else(|| voice.to_string())
    }

    /// Synthesize `text` with `voice`, streaming the audio into `dest`
    ///
    /// On success `dest` exists and is non-empty. On error the file may be
    /// missing or partial.
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        dest: &Path,
    ) -> Result<SynthesisOutput, SynthesisError>;
}

/// Name to backend lookup
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn SpeechProvider>>,
    default_name: String,
}

impl ProviderRegistry {
    /// Create an empty registry whose default backend is `default_name`
    pub fn new(default_name: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_name: default_name.into(),
        }
    }

    /// Build every usable backend listed in the configuration
    pub fn from_config(config: &SynthesisConfig) -> Result<Self> {
        let mut registry = Self::new(config.provider.to_lowercase_string());
        let retry = RetryPolicy::from_config(config);

        for provider_config in &config.available_providers {
            match provider_config.provider_type.as_str() {
                "openai" => {
                    if provider_config.api_key.is_empty() {
                        debug!("Skipping OpenAI backend: no API key configured");
                        continue;
                    }
                    registry.register(Arc::new(OpenAiSpeech::from_config(provider_config, retry)?));
                }
                "mock" => {
                    registry.register(Arc::new(MockSpeechProvider::new().with_retry(retry)));
                }
                other => warn!("Ignoring unknown speech provider type: {}", other),
            }
        }

        if !registry.providers.contains_key(&registry.default_name) {
            return Err(anyhow!(
                "Default speech provider '{}' is not available (configured: {})",
                registry.default_name,
                registry.names().join(", ")
            ));
        }

        Ok(registry)
    }

    /// Add or replace a backend under its own name
    pub fn register(&mut self, provider: Arc<dyn SpeechProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Backend by name, or the default one for `None`
    pub fn get(&self, name: Option<&str>) -> Result<Arc<dyn SpeechProvider>> {
        let name = name.unwrap_or(&self.default_name).to_lowercase();
        self.providers.get(&name).cloned().ok_or_else(|| {
            anyhow!(
                "Unknown speech provider '{}'. Available: {}",
                name,
                self.names().join(", ")
            )
        })
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}
