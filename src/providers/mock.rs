/*!
 * Mock speech backend for dry runs and testing.
 *
 * Writes a silent 16-bit mono WAV whose length is proportional to the text,
 * so duration probing, merging and captioning all see real audio. It can be
 * told to:
 * - fail permanently for texts containing a marker
 * - fail transiently a number of times for texts containing a marker
 * - take a fixed latency per call
 * - report word timings
 *
 * Request count and peak in-flight calls are shared across clones.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::database::WordTiming;
use crate::errors::{ProviderError, SynthesisError};
use crate::providers::{RetryPolicy, SpeechProvider, SynthesisOutput, VoiceInfo};

/// Length of generated audio per character
pub const MOCK_MS_PER_CHAR: u64 = 60;

/// Sample rate of generated audio
pub const MOCK_SAMPLE_RATE: u32 = 16000;

/// Transient failure budget for one marker
#[derive(Debug)]
struct FlakyRule {
    marker: String,
    remaining: usize,
}

/// Mock speech provider
#[derive(Debug, Clone)]
pub struct MockSpeechProvider {
    latency: Duration,
    emit_word_timings: bool,
    fail_markers: Vec<String>,
    flaky: Arc<Mutex<Vec<FlakyRule>>>,
    retry: RetryPolicy,
    request_count: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl Default for MockSpeechProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight gauge when a call ends, however it ends
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockSpeechProvider {
    /// Create a mock that always succeeds instantly
    pub fn new() -> Self {
        Self {
            latency: Duration::ZERO,
            emit_word_timings: false,
            fail_markers: Vec::new(),
            flaky: Arc::new(Mutex::new(Vec::new())),
            retry: RetryPolicy::new(3, Duration::from_millis(1)),
            request_count: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleep this long inside every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Report one timing per whitespace-separated word
    pub fn with_word_timings(mut self) -> Self {
        self.emit_word_timings = true;
        self
    }

    /// Reject every text containing `marker`
    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_markers.push(marker.into());
        self
    }

    /// Fail `times` calls with a connection error for texts containing `marker`
    pub fn flaky_on(self, marker: impl Into<String>, times: usize) -> Self {
        self.flaky.lock().push(FlakyRule {
            marker: marker.into(),
            remaining: times,
        });
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Backend calls made so far, retries included
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous calls observed
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Duration of the audio generated for `text`
    pub fn audio_duration_ms(text: &str) -> u64 {
        text.chars().count() as u64 * MOCK_MS_PER_CHAR
    }

    fn word_timings(text: &str) -> Vec<WordTiming> {
        let mut offset: i64 = 0;
        text.split_whitespace()
            .map(|word| {
                let duration = Self::audio_duration_ms(word) as i64;
                let timing = WordTiming {
                    text: word.to_string(),
                    offset_ms: offset,
                    duration_ms: duration,
                };
                // words are separated by one character of silence
                offset += duration + MOCK_MS_PER_CHAR as i64;
                timing
            })
            .collect()
    }

    fn write_silence(dest: &Path, duration_ms: u64) -> Result<u64, ProviderError> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: MOCK_SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let samples = duration_ms * MOCK_SAMPLE_RATE as u64 / 1000;
        let mut writer = hound::WavWriter::create(dest, spec)
            .map_err(|e| ProviderError::RequestFailed(format!("WAV create failed: {}", e)))?;
        for _ in 0..samples {
            writer
                .write_sample(0i16)
                .map_err(|e| ProviderError::RequestFailed(format!("WAV write failed: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| ProviderError::RequestFailed(format!("WAV finalize failed: {}", e)))?;
        Ok(std::fs::metadata(dest)?.len())
    }

    async fn attempt(&self, text: &str, dest: &Path) -> Result<u64, ProviderError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(&self.in_flight);
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.fail_markers.iter().any(|m| text.contains(m.as_str())) {
            return Err(ProviderError::ApiError {
                status_code: 400,
                message: "Mock provider rejected the text".to_string(),
            });
        }

        {
            let mut flaky = self.flaky.lock();
            if let Some(rule) = flaky
                .iter_mut()
                .find(|r| r.remaining > 0 && text.contains(r.marker.as_str()))
            {
                rule.remaining -= 1;
                return Err(ProviderError::ConnectionError("Mock connection reset".to_string()));
            }
        }

        let dest = dest.to_path_buf();
        let duration_ms = Self::audio_duration_ms(text);
        tokio::task::spawn_blocking(move || Self::write_silence(&dest, duration_ms))
            .await
            .map_err(|e| ProviderError::RequestFailed(format!("WAV writer panicked: {}", e)))?
    }
}

#[async_trait]
impl SpeechProvider for MockSpeechProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn supported_voices(&self) -> Vec<VoiceInfo> {
        vec![
            VoiceInfo::new("xiaoxiao", "zh-CN-XiaoxiaoNeural", "zh-CN", "female"),
            VoiceInfo::new("yunxi", "zh-CN-YunxiNeural", "zh-CN", "male"),
            VoiceInfo::new("xiaoyi", "zh-CN-XiaoyiNeural", "zh-CN", "female"),
            VoiceInfo::new("yunjian", "zh-CN-YunjianNeural", "zh-CN", "male"),
        ]
    }

    fn audio_extension(&self) -> &str {
        "wav"
    }

    async fn synthesize(
        &self,
        text: &str,
        _voice: &str,
        dest: &Path,
    ) -> Result<SynthesisOutput, SynthesisError> {
        let bytes_written = self.retry.run("Mock speech", |_| self.attempt(text, dest)).await?;

        Ok(SynthesisOutput {
            bytes_written,
            word_timings: self.emit_word_timings.then(|| Self::word_timings(text)),
        })
    }
}
