/*!
 * Integration tests for batch synthesis and the round driver
 */

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use bookcast::database::{ParagraphStore, Repository, TtsStatus};
use bookcast::providers::MockSpeechProvider;
use bookcast::synthesis::{BatchOutcome, BatchSynthesizer, SynthesisDriver};

use crate::common;

/// Test the batch outcome and the concurrency cap with two permanent failures
#[tokio::test]
async fn test_batch_withTwoRejectedOfFive_shouldReportCountsAndRespectCap() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let repo = Arc::new(Repository::new_in_memory()?);
    let book = common::seed_book(
        &repo,
        "Batch",
        &[&["one fine.", "two REJECT.", "three fine.", "four REJECT.", "five fine."]],
    )
    .await?;
    let provider = Arc::new(
        MockSpeechProvider::new()
            .failing_on("REJECT")
            .with_latency(Duration::from_millis(20)),
    );
    let batch = BatchSynthesizer::new(provider.clone(), repo.clone(), temp_dir.path());

    let outcome = batch.run(repo.book_paragraphs(book.id).await?, "xiaoxiao", 2).await;

    assert_eq!(outcome, BatchOutcome { total: 5, completed: 3, failed: 2 });
    assert!(provider.peak_in_flight() <= 2);
    assert_eq!(provider.peak_in_flight(), 2);

    let stored = repo.book_paragraphs(book.id).await?;
    let failed: Vec<i64> = stored
        .iter()
        .filter(|p| p.tts_status == TtsStatus::Failed)
        .map(|p| p.paragraph_index)
        .collect();
    assert_eq!(failed, vec![2, 4]);
    assert!(stored
        .iter()
        .filter(|p| p.tts_status == TtsStatus::Completed)
        .all(|p| p.audio_duration_ms.unwrap_or(0) > 0 && p.audio_path.is_some()));
    Ok(())
}

/// Test that re-running a batch does not call the backend for completed rows
#[tokio::test]
async fn test_batch_rerun_shouldSkipCompletedParagraphs() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let repo = Arc::new(Repository::new_in_memory()?);
    let book = common::seed_book(&repo, "Rerun", &[&["alpha.", "beta."]]).await?;
    let provider = Arc::new(MockSpeechProvider::new());
    let batch = BatchSynthesizer::new(provider.clone(), repo.clone(), temp_dir.path());

    batch.run(repo.book_paragraphs(book.id).await?, "yunxi", 4).await;
    let outcome = batch.run(repo.book_paragraphs(book.id).await?, "yunxi", 4).await;

    assert_eq!(outcome.completed, 2);
    assert_eq!(provider.request_count(), 2);
    Ok(())
}

/// Test that a transient backend outage is recovered by a later round
#[tokio::test]
async fn test_driver_withOutageOnFirstRound_shouldCompleteBook() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let repo = Arc::new(Repository::new_in_memory()?);
    let book = common::seed_book(&repo, "Outage", &[&["steady.", "shaky part."], &["steady again."]]).await?;
    // Three failures exhaust the mock's three attempts once, then it recovers
    let provider = Arc::new(MockSpeechProvider::new().flaky_on("shaky", 3));
    let driver = SynthesisDriver::new(repo.clone(), provider, temp_dir.path());

    let report = driver.synthesize_book(book.id, "xiaoxiao", 2, 3, None).await?;

    assert!(report.is_complete());
    assert_eq!(report.rounds.len(), 2);
    assert_eq!(report.rounds[0].failed, 1);
    assert_eq!(report.rounds[1], BatchOutcome { total: 1, completed: 1, failed: 0 });
    let book = repo.get_book(book.id).await?.unwrap();
    assert!((book.tts_progress - 100.0).abs() < f64::EPSILON);
    Ok(())
}
