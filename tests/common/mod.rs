/*!
 * Common test utilities for the bookcast test suite
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use bookcast::app_config::{Config, SpeechProviderKind};
use bookcast::audio::AudioFormat;
use bookcast::database::{BookRecord, ParagraphRecord, Repository};

/// Route library logs to the test harness; repeated calls are harmless
pub fn init_test_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Writes a silent 16 kHz mono WAV of `ms` milliseconds
pub fn write_wav(path: &Path, ms: u32) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for _ in 0..16 * ms {
        writer.write_sample(0i16)?;
    }
    writer.finalize()?;
    Ok(path.to_path_buf())
}

/// Config that synthesizes offline and exports WAV below `root`
pub fn mock_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.audio_dir = root.join("audio");
    config.output_dir = root.join("output");
    config.database_path = Some(root.join("bookcast.db"));
    config.synthesis.provider = SpeechProviderKind::Mock;
    config.export.format = AudioFormat::Wav;
    config
}

/// Store a book whose chapters hold the given paragraph texts
pub async fn seed_book(repo: &Repository, title: &str, chapters: &[&[&str]]) -> Result<BookRecord> {
    let book = BookRecord::new(title.to_string(), String::new(), String::new(), String::new());
    let book_id = repo.create_book(&book).await?;

    for (i, texts) in chapters.iter().enumerate() {
        let chapter_id = repo
            .create_chapter(book_id, i as i64 + 1, &format!("Chapter {}", i + 1))
            .await?;
        let records = texts
            .iter()
            .enumerate()
            .map(|(j, text)| ParagraphRecord::new(book_id, chapter_id, j as i64 + 1, text.to_string()))
            .collect();
        repo.insert_paragraphs(records).await?;
    }
    repo.refresh_book_stats(book_id).await?;

    repo.get_book(book_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("seeded book {} vanished", book_id))
}
