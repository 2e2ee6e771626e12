/*!
 * OpenAI-compatible speech client.
 *
 * Sends `POST {endpoint}/audio/speech` and streams the response body into
 * the destination file chunk by chunk. The endpoint reports no word
 * boundaries, so captions for this backend use proportional timing.
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::app_config::ProviderConfig;
use crate::errors::{ProviderError, SynthesisError};
use crate::providers::{RetryPolicy, SpeechProvider, SynthesisOutput, VoiceInfo};

const VOICES: [&str; 9] = [
    "alloy", "ash", "coral", "echo", "fable", "onyx", "nova", "sage", "shimmer",
];

/// Request body of the speech endpoint
#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

/// OpenAI speech client
#[derive(Debug)]
pub struct OpenAiSpeech {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    response_format: String,
    retry: RetryPolicy,
}

impl OpenAiSpeech {
    /// Create a new client
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        response_format: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            response_format: response_format.into(),
            retry,
        })
    }

    /// Create a client from a provider configuration block
    pub fn from_config(config: &ProviderConfig, retry: RetryPolicy) -> Result<Self> {
        let endpoint = if config.endpoint.is_empty() {
            "https://api.openai.com/v1"
        } else {
            config.endpoint.as_str()
        };
        let model = if config.model.is_empty() { "tts-1" } else { config.model.as_str() };

        Self::new(
            endpoint,
            config.api_key.clone(),
            model,
            config.response_format.clone(),
            Duration::from_secs(config.timeout_secs),
            retry,
        )
    }

    fn speech_url(&self) -> String {
        format!("{}/audio/speech", self.endpoint)
    }

    /// One request, streamed to disk
    async fn attempt(&self, text: &str, voice: &str, dest: &Path) -> Result<u64, ProviderError> {
        let body = SpeechRequest {
            model: &self.model,
            input: text,
            voice,
            response_format: &self.response_format,
        };

        let mut response = self
            .client
            .post(self.speech_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    ProviderError::ConnectionError(e.to_string())
                } else {
                    ProviderError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    ProviderError::AuthenticationError(message)
                }
                StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimitExceeded(message),
                _ => ProviderError::ApiError {
                    status_code: status.as_u16(),
                    message,
                },
            });
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written: u64 = 0;
        loop {
            let chunk: Option<Bytes> = response
                .chunk()
                .await
                .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;
            let Some(chunk) = chunk else { break };
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if written == 0 {
            let _ = tokio::fs::remove_file(dest).await;
            return Err(ProviderError::EmptyAudio);
        }

        Ok(written)
    }
}

#[async_trait]
impl SpeechProvider for OpenAiSpeech {
    fn name(&self) -> &str {
        "openai"
    }

    fn supported_voices(&self) -> Vec<VoiceInfo> {
        VOICES
            .iter()
            .map(|v| VoiceInfo::new(v, v, "multilingual", "neutral"))
            .collect()
    }

    fn audio_extension(&self) -> &str {
        &self.response_format
    }

    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        dest: &Path,
    ) -> Result<SynthesisOutput, SynthesisError> {
        let voice = self.resolve_voice(voice);
        if !VOICES.contains(&voice.as_str()) {
            return Err(SynthesisError::UnknownVoice(voice));
        }

        let label = format!("OpenAI speech ({} chars)", text.chars().count());
        let bytes_written = self
            .retry
            .run(&label, |_| self.attempt(text, &voice, dest))
            .await?;

        debug!("Wrote {} bytes of audio to {:?}", bytes_written, dest);
        Ok(SynthesisOutput {
            bytes_written,
            word_timings: None,
        })
    }
}
