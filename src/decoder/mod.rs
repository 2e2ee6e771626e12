/*!
 * Book decoding and import.
 *
 * A `BookDecoder` yields book metadata and a lazy sequence of chapters.
 * The sequence restarts only by calling `chapters()` again. `import_book`
 * consumes it chapter by chapter into the repository.
 */

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use std::path::Path;

use crate::database::{BookRecord, ParagraphRecord, ParagraphStore, Repository};
use crate::errors::DecodeError;

pub mod text;

pub use text::{split_into_paragraphs, TextDecoder};

/// Extensions handled by `decoder_for_path`
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["txt", "md", "markdown"];

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BookMetadata {
    pub title: String,
    pub author: String,
}

/// One chapter with its paragraphs in reading order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedChapter {
    pub title: String,
    pub paragraphs: Vec<String>,
}

pub trait BookDecoder: Send + Sync {
    fn metadata(&self) -> BookMetadata;

    /// Chapters from the start of the book
    fn chapters(&self) -> Box<dyn Iterator<Item = Result<DecodedChapter, DecodeError>> + Send + '_>;
}

/// Pick a decoder by file extension
pub fn decoder_for_path(path: &Path) -> Result<Box<dyn BookDecoder>, DecodeError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(Box::new(TextDecoder::open(path)?))
    } else if ext.is_empty() {
        Err(DecodeError::UnsupportedFormat(path.display().to_string()))
    } else {
        Err(DecodeError::UnsupportedFormat(format!(".{}", ext)))
    }
}

/// What an import produced
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub book_id: i64,
    pub title: String,
    pub chapters: usize,
    pub paragraphs: usize,
    /// The same file content had been imported before
    pub already_imported: bool,
}

/// Store a decoded book; a decode error removes the partial book again
pub async fn import_book(
    repo: &Repository,
    decoder: &dyn BookDecoder,
    source_path: &str,
    source_hash: &str,
) -> Result<ImportSummary> {
    let metadata = decoder.metadata();
    let book = BookRecord::new(
        metadata.title.clone(),
        metadata.author.clone(),
        source_path.to_string(),
        source_hash.to_string(),
    );
    let book_id = repo.create_book(&book).await?;

    match store_chapters(repo, decoder, book_id).await {
        Ok((chapters, paragraphs)) => {
            repo.refresh_book_stats(book_id).await?;
            info!(
                "Imported '{}' as book {}: {} chapter(s), {} paragraph(s)",
                metadata.title, book_id, chapters, paragraphs
            );
            Ok(ImportSummary {
                book_id,
                title: metadata.title,
                chapters,
                paragraphs,
                already_imported: false,
            })
        }
        Err(e) => {
            if let Err(cleanup) = repo.delete_book(book_id).await {
                warn!("Could not remove partially imported book {}: {:#}", book_id, cleanup);
            }
            Err(e)
        }
    }
}

async fn store_chapters(
    repo: &Repository,
    decoder: &dyn BookDecoder,
    book_id: i64,
) -> Result<(usize, usize)> {
    let mut chapter_index = 0i64;
    let mut paragraph_total = 0usize;
    let mut cursor_ms = 0i64;

    for chapter in decoder.chapters() {
        let chapter = chapter.context("Failed to decode chapter")?;
        if chapter.paragraphs.is_empty() {
            continue;
        }

        chapter_index += 1;
        let chapter_id = repo.create_chapter(book_id, chapter_index, &chapter.title).await?;

        let records: Vec<ParagraphRecord> = chapter
            .paragraphs
            .into_iter()
            .enumerate()
            .map(|(i, content)| {
                let mut record = ParagraphRecord::new(book_id, chapter_id, i as i64 + 1, content);
                record.start_time_ms = cursor_ms;
                record.end_time_ms = cursor_ms + record.estimated_duration_ms;
                cursor_ms = record.end_time_ms;
                record
            })
            .collect();

        paragraph_total += records.len();
        repo.insert_paragraphs(records).await?;
        repo.refresh_chapter_stats(chapter_id).await?;
    }

    Ok((chapter_index as usize, paragraph_total))
}

/// Import a file unless the same content is already in the repository
pub async fn import_file(repo: &Repository, path: &Path) -> Result<ImportSummary> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read book file: {:?}", path))?;
    let hash = Repository::hash_content(&bytes);

    if let Some(existing) = repo.find_book_by_hash(&hash).await? {
        info!("{:?} was already imported as book {}", path, existing.id);
        return Ok(ImportSummary {
            book_id: existing.id,
            title: existing.title,
            chapters: existing.total_chapters as usize,
            paragraphs: existing.total_paragraphs as usize,
            already_imported: true,
        });
    }

    let decoder = decoder_for_path(path)?;
    import_book(repo, decoder.as_ref(), &path.to_string_lossy(), &hash).await
}
