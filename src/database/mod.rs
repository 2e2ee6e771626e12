/*!
 * Database module for persistent storage of books, chapters and paragraphs.
 *
 * This module provides SQLite-based persistence for:
 * - Imported books with aggregate statistics
 * - Chapters in reading order
 * - Paragraphs with their synthesis state, audio reference and word timings
 *
 * The synthesis and export stages only see the narrow `ParagraphStore`
 * trait; `Repository` is the SQLite implementation.
 */

pub mod schema;
pub mod connection;
pub mod repository;
pub mod models;

use anyhow::Result;
use async_trait::async_trait;

pub use connection::DatabaseConnection;
pub use models::{
    BookRecord, ChapterRecord, ParagraphRecord, StatusCounts, TtsStatus, TtsUpdate, WordTiming,
};
pub use repository::Repository;

/// Paragraph storage consumed by the synthesis and export stages
#[async_trait]
pub trait ParagraphStore: Send + Sync {
    /// All paragraphs of a book in (chapter index, paragraph index) order
    async fn book_paragraphs(&self, book_id: i64) -> Result<Vec<ParagraphRecord>>;

    /// Paragraphs of one chapter in index order
    async fn chapter_paragraphs(&self, chapter_id: i64) -> Result<Vec<ParagraphRecord>>;

    /// Paragraphs of a book whose status is one of `statuses`, in reading order
    async fn paragraphs_with_status(
        &self,
        book_id: i64,
        statuses: &[TtsStatus],
    ) -> Result<Vec<ParagraphRecord>>;

    /// Paragraphs of a book not yet completed, in reading order
    async fn unfinished_paragraphs(&self, book_id: i64) -> Result<Vec<ParagraphRecord>> {
        self.paragraphs_with_status(
            book_id,
            &[TtsStatus::Pending, TtsStatus::Processing, TtsStatus::Failed],
        )
        .await
    }

    /// Write the synthesis state of one paragraph
    async fn update_paragraph_tts(&self, paragraph_id: i64, update: TtsUpdate) -> Result<()>;

    /// Chapters of a book in index order
    async fn book_chapters(&self, book_id: i64) -> Result<Vec<ChapterRecord>>;

    /// Recompute a chapter's paragraph count and estimated duration
    async fn refresh_chapter_stats(&self, chapter_id: i64) -> Result<()>;
}
