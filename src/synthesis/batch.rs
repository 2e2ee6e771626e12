/*!
 * Batch speech synthesis.
 *
 * Every paragraph moves `processing` then `completed` or `failed`. A failure
 * is recorded on its own paragraph and never aborts the batch.
 */

use log::{debug, error, warn};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::audio::probe_duration_ms;
use crate::database::{ParagraphRecord, ParagraphStore, TtsStatus, TtsUpdate};
use crate::providers::SpeechProvider;
use crate::synthesis::pool::WorkerPool;
use crate::text_utils;

/// Called with `(done, total)` after each paragraph
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Counts of one batch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Synthesizes paragraphs concurrently and records the result of each
#[derive(Clone)]
pub struct BatchSynthesizer {
    provider: Arc<dyn SpeechProvider>,
    store: Arc<dyn ParagraphStore>,
    audio_dir: PathBuf,
}

impl BatchSynthesizer {
    pub fn new(
        provider: Arc<dyn SpeechProvider>,
        store: Arc<dyn ParagraphStore>,
        audio_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            provider,
            store,
            audio_dir: audio_dir.into(),
        }
    }

    /// Where the audio of `paragraph` is written
    pub fn audio_path_for(&self, paragraph: &ParagraphRecord) -> PathBuf {
        self.audio_dir
            .join(format!("book_{}", paragraph.book_id))
            .join(format!("p_{}.{}", paragraph.id, self.provider.audio_extension()))
    }

    /// Synthesize `paragraphs` with at most `max_concurrent` provider calls in flight
    pub async fn run(
        &self,
        paragraphs: Vec<ParagraphRecord>,
        voice: &str,
        max_concurrent: usize,
    ) -> BatchOutcome {
        self.run_with_progress(paragraphs, voice, max_concurrent, None).await
    }

    pub async fn run_with_progress(
        &self,
        paragraphs: Vec<ParagraphRecord>,
        voice: &str,
        max_concurrent: usize,
        progress: Option<ProgressCallback>,
    ) -> BatchOutcome {
        let total = paragraphs.len();
        if total == 0 {
            return BatchOutcome::default();
        }

        let pool = WorkerPool::new(max_concurrent);
        let done = Arc::new(AtomicUsize::new(0));
        let voice = self.provider.resolve_voice(voice);
        debug!(
            "Synthesizing {} paragraph(s) with {} ({} workers, voice {})",
            total,
            self.provider.name(),
            pool.capacity(),
            voice
        );

        let results = pool
            .run_all(paragraphs, move |paragraph| {
                let worker = self.clone();
                let voice = voice.clone();
                let done = done.clone();
                let progress = progress.clone();
                async move {
                    let ok = worker.process_paragraph(paragraph, &voice).await;
                    let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(callback) = progress {
                        callback(finished, total);
                    }
                    ok
                }
            })
            .await;

        let completed = results.iter().filter(|ok| **ok).count();
        BatchOutcome {
            total,
            completed,
            failed: total - completed,
        }
    }

    /// Process one paragraph, returning whether it ended `completed`
    async fn process_paragraph(&self, paragraph: ParagraphRecord, voice: &str) -> bool {
        if paragraph.tts_status == TtsStatus::Completed {
            debug!("Paragraph {} already completed, skipping", paragraph.id);
            return true;
        }

        if let Err(e) = self
            .store
            .update_paragraph_tts(paragraph.id, TtsUpdate::processing())
            .await
        {
            error!("Failed to mark paragraph {} as processing: {:#}", paragraph.id, e);
            return false;
        }

        let text = text_utils::clean_for_speech(&paragraph.content);
        let update = if text.is_empty() {
            // Nothing to speak: zero-length, no audio
            TtsUpdate::completed(None, 0, None)
        } else {
            self.synthesize_text(&paragraph, &text, voice).await
        };

        let completed = update.status == TtsStatus::Completed;
        if let Err(e) = self.store.update_paragraph_tts(paragraph.id, update).await {
            error!("Failed to record synthesis result of paragraph {}: {:#}", paragraph.id, e);
            return false;
        }
        completed
    }

    async fn synthesize_text(&self, paragraph: &ParagraphRecord, text: &str, voice: &str) -> TtsUpdate {
        let dest = self.audio_path_for(paragraph);

        let output = match self.provider.synthesize(text, voice, &dest).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Paragraph {} failed: {}", paragraph.id, e);
                return TtsUpdate::failed(e.to_string());
            }
        };

        let probe_path = dest.clone();
        let measured = tokio::task::spawn_blocking(move || probe_duration_ms(&probe_path))
            .await
            .ok()
            .flatten();
        let duration_ms = match measured {
            Some(ms) => ms as i64,
            None => {
                warn!(
                    "Could not measure audio of paragraph {}, using estimate of {} ms",
                    paragraph.id, paragraph.estimated_duration_ms
                );
                paragraph.estimated_duration_ms
            }
        };

        let word_timings = output
            .word_timings
            .filter(|timings| !timings.is_empty())
            .and_then(|timings| match serde_json::to_string(&timings) {
                Ok(json) => Some(json),
                Err(e) => {
                    warn!("Dropping word timings of paragraph {}: {}", paragraph.id, e);
                    None
                }
            });

        TtsUpdate::completed(
            Some(dest.to_string_lossy().into_owned()),
            duration_ms,
            word_timings,
        )
    }
}
