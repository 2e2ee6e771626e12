/*!
 * Multi-round synthesis of one book.
 *
 * Round 1 takes everything not yet completed, which also resumes rows left
 * in `processing` by a killed run. Later rounds retry `pending` and
 * `failed` rows only.
 */

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::database::{ParagraphStore, Repository, TtsStatus};
use crate::providers::SpeechProvider;
use crate::synthesis::batch::{BatchOutcome, BatchSynthesizer, ProgressCallback};

/// Result of synthesizing a book
#[derive(Debug, Clone, Default, Serialize)]
pub struct SynthesisReport {
    /// Outcome of each round that ran
    pub rounds: Vec<BatchOutcome>,
    pub completed: i64,
    pub total: i64,
    /// Completion percentage stored on the book
    pub progress: f64,
}

impl SynthesisReport {
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

pub struct SynthesisDriver {
    repository: Arc<Repository>,
    batch: BatchSynthesizer,
}

impl SynthesisDriver {
    pub fn new(
        repository: Arc<Repository>,
        provider: Arc<dyn SpeechProvider>,
        audio_dir: impl Into<PathBuf>,
    ) -> Self {
        let batch = BatchSynthesizer::new(provider, repository.clone(), audio_dir);
        Self { repository, batch }
    }

    pub async fn synthesize_book(
        &self,
        book_id: i64,
        voice: &str,
        max_concurrent: usize,
        max_rounds: usize,
        progress: Option<ProgressCallback>,
    ) -> Result<SynthesisReport> {
        let mut rounds = Vec::new();

        for round in 1..=max_rounds.max(1) {
            let paragraphs = if round == 1 {
                self.repository.unfinished_paragraphs(book_id).await
            } else {
                self.repository
                    .paragraphs_with_status(book_id, &[TtsStatus::Pending, TtsStatus::Failed])
                    .await
            }
            .with_context(|| format!("Failed to load paragraphs of book {}", book_id))?;

            if paragraphs.is_empty() {
                break;
            }

            info!("Round {}: synthesizing {} paragraph(s) of book {}", round, paragraphs.len(), book_id);
            let outcome = self
                .batch
                .run_with_progress(paragraphs, voice, max_concurrent, progress.clone())
                .await;
            info!(
                "Round {} finished: {} completed, {} failed",
                round, outcome.completed, outcome.failed
            );
            rounds.push(outcome);

            if outcome.failed == 0 {
                break;
            }
        }

        let progress = self
            .repository
            .refresh_tts_progress(book_id)
            .await
            .context("Failed to refresh synthesis progress")?;
        let counts = self.repository.status_counts(book_id).await?;

        Ok(SynthesisReport {
            rounds,
            completed: counts.completed,
            total: counts.total(),
            progress,
        })
    }
}
