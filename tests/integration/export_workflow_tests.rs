/*!
 * Integration tests for grouping, merging and exporting books
 */

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bookcast::app_config::ExportConfig;
use bookcast::audio::{AudioFormat, AudioMerger, MergeSettings};
use bookcast::database::{BookRecord, ParagraphStore, Repository, TtsUpdate};
use bookcast::export::ExportOrchestrator;

use crate::common;

const MINUTE: i64 = 60_000;

fn wav_export_config() -> ExportConfig {
    ExportConfig {
        format: AudioFormat::Wav,
        ..ExportConfig::default()
    }
}

fn wav_merger() -> AudioMerger {
    AudioMerger::new(MergeSettings {
        format: AudioFormat::Wav,
        ..MergeSettings::default()
    })
}

/// Mark every paragraph of a chapter completed with a short real file and the given duration
async fn complete_chapters(repo: &Repository, book: &BookRecord, audio_dir: &Path, minutes: &[i64]) -> Result<()> {
    let chapters = repo.book_chapters(book.id).await?;
    for (chapter, minutes) in chapters.iter().zip(minutes) {
        for paragraph in repo.chapter_paragraphs(chapter.id).await? {
            let path = common::write_wav(&audio_dir.join(format!("p_{}.wav", paragraph.id)), 100)?;
            let update = TtsUpdate::completed(Some(path.to_string_lossy().into_owned()), minutes * MINUTE, None);
            repo.update_paragraph_tts(paragraph.id, update).await?;
        }
    }
    Ok(())
}

fn folder_names(dir: &Path) -> Result<Vec<String>> {
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    Ok(names)
}

/// Test that 10, 10 and 30 minute chapters land in a single chapters1-3 segment
#[tokio::test]
async fn test_export_withTenTenThirtyMinutes_shouldProduceOneSegment() -> Result<()> {
    common::init_test_logger();
    let temp_dir = common::create_temp_dir()?;
    let audio_dir = temp_dir.path().join("audio");
    let repo = Arc::new(Repository::new_in_memory()?);
    let book = common::seed_book(&repo, "Long Haul", &[&["Opening line."], &["Middle line."], &["Closing line."]]).await?;
    complete_chapters(&repo, &book, &audio_dir, &[10, 10, 30]).await?;
    let exporter = ExportOrchestrator::new(repo.clone(), wav_export_config(), temp_dir.path().join("out"), &audio_dir);

    let result = exporter.export(&book).await?;

    assert!(result.success);
    assert_eq!(result.total_segments, 1);
    assert_eq!(result.segments[0].folder, "chapters1-3");
    assert_eq!(result.segments[0].chapter_indices, vec![1, 2, 3]);
    assert_eq!(result.segments[0].duration_ms, 50 * MINUTE);
    assert_eq!(folder_names(&result.output_dir)?, vec!["chapters1-3"]);

    let segment_dir = result.output_dir.join("chapters1-3");
    assert!(segment_dir.join("chapters1-3.wav").is_file());
    let lrc = std::fs::read_to_string(segment_dir.join("chapters1-3.lrc"))?;
    assert_eq!(
        lrc,
        "[ti:Long Haul]\n[00:00.00]Opening line.\n[10:00.00]Middle line.\n[20:00.00]Closing line.\n"
    );
    Ok(())
}

/// Test that a second export reproduces identical captions and folders
#[tokio::test]
async fn test_export_runTwice_shouldBeIdempotent() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let audio_dir = temp_dir.path().join("audio");
    let repo = Arc::new(Repository::new_in_memory()?);
    let book = common::seed_book(
        &repo,
        "Twice",
        &[&["A. B. C."], &["D!"], &["E? F."], &["G."]],
    )
    .await?;
    complete_chapters(&repo, &book, &audio_dir, &[26, 1, 30, 2]).await?;
    let exporter = ExportOrchestrator::new(repo.clone(), wav_export_config(), temp_dir.path().join("out"), &audio_dir);

    let first = exporter.export(&book).await?;
    let first_folders = folder_names(&first.output_dir)?;
    let first_captions: Vec<Vec<u8>> = first
        .segments
        .iter()
        .map(|s| std::fs::read(s.caption_path.as_ref().unwrap()))
        .collect::<std::io::Result<_>>()?;

    let second = exporter.export(&book).await?;
    let second_captions: Vec<Vec<u8>> = second
        .segments
        .iter()
        .map(|s| std::fs::read(s.caption_path.as_ref().unwrap()))
        .collect::<std::io::Result<_>>()?;

    // 26 | 1 + 30 | 2 folded into the previous group
    assert_eq!(first_folders, vec!["chapters1", "chapters2-4"]);
    assert_eq!(folder_names(&second.output_dir)?, first_folders);
    assert_eq!(first_captions, second_captions);
    assert!(second.archive.as_ref().is_some_and(|p| p.is_file()));
    Ok(())
}

/// Test that a stale segment folder from an earlier export is cleared
#[tokio::test]
async fn test_export_withStaleFolder_shouldRemoveIt() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let audio_dir = temp_dir.path().join("audio");
    let repo = Arc::new(Repository::new_in_memory()?);
    let book = common::seed_book(&repo, "Fresh", &[&["Only."]]).await?;
    complete_chapters(&repo, &book, &audio_dir, &[1]).await?;
    let exporter = ExportOrchestrator::new(repo.clone(), wav_export_config(), temp_dir.path().join("out"), &audio_dir);
    common::create_test_file(&exporter.book_output_dir(&book), "chapters9/old.lrc", "stale")?;

    let result = exporter.export(&book).await?;

    assert_eq!(folder_names(&result.output_dir)?, vec!["chapters1"]);
    Ok(())
}

/// Test that a book without chapters fails with a message instead of an error
#[tokio::test]
async fn test_export_withoutChapters_shouldReportFailure() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let repo = Arc::new(Repository::new_in_memory()?);
    let book = common::seed_book(&repo, "Empty", &[]).await?;
    let exporter = ExportOrchestrator::new(repo.clone(), wav_export_config(), temp_dir.path().join("out"), temp_dir.path());

    let result = exporter.export(&book).await?;

    assert!(!result.success);
    assert_eq!(result.message, "no chapters to export");
    assert_eq!(result.total_segments, 0);
    Ok(())
}

/// Test that merging only missing files fails and writes nothing
#[tokio::test]
async fn test_merge_withOnlyNonexistentPaths_shouldReturnFalse() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let output = temp_dir.path().join("merged.wav");
    let inputs = vec![temp_dir.path().join("nope1.wav"), temp_dir.path().join("nope2.mp3")];

    assert!(!wav_merger().merge(&inputs, &output).await);
    assert!(!output.exists());
    Ok(())
}

/// Test that one readable file among broken ones is enough
#[tokio::test]
async fn test_merge_withOneValidAmongInvalid_shouldReturnTrue() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let valid = common::write_wav(&temp_dir.path().join("ok.wav"), 300)?;
    let corrupt = common::create_test_file(temp_dir.path(), "bad.wav", "RIFF but not really")?;
    let output = temp_dir.path().join("merged.wav");
    let inputs: Vec<PathBuf> = vec![temp_dir.path().join("missing.wav"), valid, corrupt];

    assert!(wav_merger().merge(&inputs, &output).await);

    let reader = hound::WavReader::open(&output)?;
    assert_eq!(reader.spec().sample_rate, 16000);
    assert_eq!(reader.duration(), 300 * 16);
    Ok(())
}
