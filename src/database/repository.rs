/*!
 * Repository layer for database operations.
 *
 * This module provides a high-level API for all database operations,
 * abstracting away the SQL details and providing type-safe access.
 */

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::debug;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::Path;

use super::connection::DatabaseConnection;
use super::models::{
    BookRecord, ChapterRecord, ParagraphRecord, StatusCounts, TtsStatus, TtsUpdate,
};
use super::ParagraphStore;
use crate::text_utils;

const BOOK_COLUMNS: &str = "id, title, author, source_path, source_hash, total_chapters, \
    total_paragraphs, estimated_duration_ms, tts_progress, created_at, updated_at";

const CHAPTER_COLUMNS: &str =
    "id, book_id, chapter_index, title, paragraph_count, estimated_duration_ms";

const PARAGRAPH_COLUMNS: &str = "p.id, p.book_id, p.chapter_id, p.paragraph_index, p.content, \
    p.char_count, p.estimated_duration_ms, p.audio_duration_ms, p.start_time_ms, p.end_time_ms, \
    p.tts_status, p.tts_error, p.audio_path, p.word_timings";

fn parse_book_row(row: &rusqlite::Row) -> rusqlite::Result<BookRecord> {
    Ok(BookRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        source_path: row.get(3)?,
        source_hash: row.get(4)?,
        total_chapters: row.get(5)?,
        total_paragraphs: row.get(6)?,
        estimated_duration_ms: row.get(7)?,
        tts_progress: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn parse_chapter_row(row: &rusqlite::Row) -> rusqlite::Result<ChapterRecord> {
    Ok(ChapterRecord {
        id: row.get(0)?,
        book_id: row.get(1)?,
        chapter_index: row.get(2)?,
        title: row.get(3)?,
        paragraph_count: row.get(4)?,
        estimated_duration_ms: row.get(5)?,
    })
}

fn parse_paragraph_row(row: &rusqlite::Row) -> rusqlite::Result<ParagraphRecord> {
    Ok(ParagraphRecord {
        id: row.get(0)?,
        book_id: row.get(1)?,
        chapter_id: row.get(2)?,
        paragraph_index: row.get(3)?,
        content: row.get(4)?,
        char_count: row.get(5)?,
        estimated_duration_ms: row.get(6)?,
        audio_duration_ms: row.get(7)?,
        start_time_ms: row.get(8)?,
        end_time_ms: row.get(9)?,
        tts_status: row
            .get::<_, String>(10)?
            .parse()
            .unwrap_or(TtsStatus::Pending),
        tts_error: row.get(11)?,
        audio_path: row.get(12)?,
        word_timings: row.get(13)?,
    })
}

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository backed by the database file at `path`
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new(path)?))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    /// SHA256 of a source file, used to detect re-imports
    pub fn hash_content(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        format!("{:x}", hasher.finalize())
    }

    // =========================================================================
    // Book Operations
    // =========================================================================

    /// Insert a book, returning its ID
    pub async fn create_book(&self, book: &BookRecord) -> Result<i64> {
        let book = book.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO books (
                        title, author, source_path, source_hash, total_chapters,
                        total_paragraphs, estimated_duration_ms, tts_progress, created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    "#,
                    params![
                        book.title,
                        book.author,
                        book.source_path,
                        book.source_hash,
                        book.total_chapters,
                        book.total_paragraphs,
                        book.estimated_duration_ms,
                        book.tts_progress,
                        book.created_at,
                        book.updated_at,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
    }

    /// Get a book by ID
    pub async fn get_book(&self, book_id: i64) -> Result<Option<BookRecord>> {
        self.db
            .execute_async(move |conn| {
                let book = conn
                    .query_row(
                        &format!("SELECT {} FROM books WHERE id = ?1", BOOK_COLUMNS),
                        [book_id],
                        parse_book_row,
                    )
                    .optional()?;
                Ok(book)
            })
            .await
    }

    /// Find the most recent book imported from identical content
    pub async fn find_book_by_hash(&self, source_hash: &str) -> Result<Option<BookRecord>> {
        let source_hash = source_hash.to_string();

        self.db
            .execute_async(move |conn| {
                let book = conn
                    .query_row(
                        &format!(
                            "SELECT {} FROM books WHERE source_hash = ?1 ORDER BY id DESC LIMIT 1",
                            BOOK_COLUMNS
                        ),
                        [source_hash],
                        parse_book_row,
                    )
                    .optional()?;
                Ok(book)
            })
            .await
    }

    /// List all books, newest first
    pub async fn list_books(&self) -> Result<Vec<BookRecord>> {
        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM books ORDER BY id DESC",
                    BOOK_COLUMNS
                ))?;
                let books = stmt
                    .query_map([], parse_book_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(books)
            })
            .await
    }

    /// Delete a book and all related data
    pub async fn delete_book(&self, book_id: i64) -> Result<bool> {
        self.db
            .execute_async(move |conn| {
                // Due to CASCADE, deleting the book deletes chapters and paragraphs
                let deleted = conn.execute("DELETE FROM books WHERE id = ?1", [book_id])?;
                Ok(deleted > 0)
            })
            .await
    }

    /// Recompute chapter/paragraph totals and the estimated duration of a book
    pub async fn refresh_book_stats(&self, book_id: i64) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    UPDATE books SET
                        total_chapters = (SELECT COUNT(*) FROM chapters WHERE book_id = ?1),
                        total_paragraphs = (SELECT COUNT(*) FROM paragraphs WHERE book_id = ?1),
                        estimated_duration_ms = (
                            SELECT COALESCE(SUM(estimated_duration_ms), 0) FROM paragraphs WHERE book_id = ?1
                        ),
                        updated_at = ?2
                    WHERE id = ?1
                    "#,
                    params![book_id, now],
                )?;
                Ok(())
            })
            .await
    }

    /// Store and return the completed percentage of a book's paragraphs
    pub async fn refresh_tts_progress(&self, book_id: i64) -> Result<f64> {
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                let progress = Self::status_counts_sync(conn, book_id)?.progress();
                conn.execute(
                    "UPDATE books SET tts_progress = ?1, updated_at = ?2 WHERE id = ?3",
                    params![progress, now, book_id],
                )?;
                debug!("Book {} TTS progress: {:.1}%", book_id, progress);
                Ok(progress)
            })
            .await
    }

    /// Paragraph counts per status
    pub async fn status_counts(&self, book_id: i64) -> Result<StatusCounts> {
        self.db
            .execute_async(move |conn| Self::status_counts_sync(conn, book_id))
            .await
    }

    fn status_counts_sync(conn: &Connection, book_id: i64) -> Result<StatusCounts> {
        let mut stmt = conn.prepare(
            "SELECT tts_status, COUNT(*) FROM paragraphs WHERE book_id = ?1 GROUP BY tts_status",
        )?;
        let rows = stmt.query_map([book_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = StatusCounts::default();
        for row in rows {
            let (status, count) = row?;
            match status.parse::<TtsStatus>() {
                Ok(TtsStatus::Pending) => counts.pending += count,
                Ok(TtsStatus::Processing) => counts.processing += count,
                Ok(TtsStatus::Completed) => counts.completed += count,
                Ok(TtsStatus::Failed) => counts.failed += count,
                Err(_) => counts.pending += count,
            }
        }
        Ok(counts)
    }

    // =========================================================================
    // Chapter Operations
    // =========================================================================

    /// Insert a chapter, returning its ID
    pub async fn create_chapter(&self, book_id: i64, chapter_index: i64, title: &str) -> Result<i64> {
        let title = title.to_string();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "INSERT INTO chapters (book_id, chapter_index, title) VALUES (?1, ?2, ?3)",
                    params![book_id, chapter_index, title],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
    }

    // =========================================================================
    // Paragraph Operations
    // =========================================================================

    /// Insert paragraphs in one transaction
    pub async fn insert_paragraphs(&self, paragraphs: Vec<ParagraphRecord>) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .transaction_async(move |tx| {
                let mut stmt = tx.prepare(
                    r#"
                    INSERT INTO paragraphs (
                        book_id, chapter_id, paragraph_index, content, char_count,
                        estimated_duration_ms, audio_duration_ms, start_time_ms, end_time_ms,
                        tts_status, tts_error, audio_path, word_timings, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                    "#,
                )?;

                for p in paragraphs {
                    stmt.execute(params![
                        p.book_id,
                        p.chapter_id,
                        p.paragraph_index,
                        p.content,
                        p.char_count,
                        p.estimated_duration_ms,
                        p.audio_duration_ms,
                        p.start_time_ms,
                        p.end_time_ms,
                        p.tts_status.to_string(),
                        p.tts_error,
                        p.audio_path,
                        p.word_timings,
                        now,
                    ])?;
                }

                Ok(())
            })
            .await
    }

    /// Get a paragraph by ID
    pub async fn get_paragraph(&self, paragraph_id: i64) -> Result<Option<ParagraphRecord>> {
        self.db
            .execute_async(move |conn| {
                let paragraph = conn
                    .query_row(
                        &format!("SELECT {} FROM paragraphs p WHERE p.id = ?1", PARAGRAPH_COLUMNS),
                        [paragraph_id],
                        parse_paragraph_row,
                    )
                    .optional()?;
                Ok(paragraph)
            })
            .await
    }

    /// Replace a paragraph's text: re-estimate and reset it to pending
    pub async fn update_paragraph_content(&self, paragraph_id: i64, content: &str) -> Result<()> {
        let content = content.to_string();
        let char_count = text_utils::char_count(&content) as i64;
        let estimated = text_utils::estimate_duration_ms(&content) as i64;
        let now = chrono::Utc::now().to_rfc3339();

        let chapter_id = self
            .db
            .execute_async(move |conn| {
                let updated = conn.execute(
                    r#"
                    UPDATE paragraphs SET
                        content = ?1, char_count = ?2, estimated_duration_ms = ?3,
                        end_time_ms = start_time_ms + ?3,
                        tts_status = 'pending', tts_error = NULL, audio_path = NULL,
                        audio_duration_ms = NULL, word_timings = NULL, updated_at = ?4
                    WHERE id = ?5
                    "#,
                    params![content, char_count, estimated, now, paragraph_id],
                )?;
                if updated == 0 {
                    return Err(anyhow!("Paragraph {} not found", paragraph_id));
                }
                let chapter_id: i64 = conn.query_row(
                    "SELECT chapter_id FROM paragraphs WHERE id = ?1",
                    [paragraph_id],
                    |row| row.get(0),
                )?;
                Ok(chapter_id)
            })
            .await?;

        self.refresh_chapter_stats(chapter_id).await
    }

    fn query_paragraphs(
        conn: &Connection,
        sql: &str,
        values: Vec<rusqlite::types::Value>,
    ) -> Result<Vec<ParagraphRecord>> {
        let mut stmt = conn.prepare(sql)?;
        let paragraphs = stmt
            .query_map(params_from_iter(values.iter()), parse_paragraph_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(paragraphs)
    }
}

#[async_trait]
impl ParagraphStore for Repository {
    async fn book_paragraphs(&self, book_id: i64) -> Result<Vec<ParagraphRecord>> {
        self.db
            .execute_async(move |conn| {
                Self::query_paragraphs(
                    conn,
                    &format!(
                        "SELECT {} FROM paragraphs p JOIN chapters c ON c.id = p.chapter_id \
                         WHERE p.book_id = ?1 ORDER BY c.chapter_index, p.paragraph_index",
                        PARAGRAPH_COLUMNS
                    ),
                    vec![book_id.into()],
                )
            })
            .await
    }

    async fn chapter_paragraphs(&self, chapter_id: i64) -> Result<Vec<ParagraphRecord>> {
        self.db
            .execute_async(move |conn| {
                Self::query_paragraphs(
                    conn,
                    &format!(
                        "SELECT {} FROM paragraphs p WHERE p.chapter_id = ?1 ORDER BY p.paragraph_index",
                        PARAGRAPH_COLUMNS
                    ),
                    vec![chapter_id.into()],
                )
            })
            .await
    }

    async fn paragraphs_with_status(
        &self,
        book_id: i64,
        statuses: &[TtsStatus],
    ) -> Result<Vec<ParagraphRecord>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (0..statuses.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM paragraphs p JOIN chapters c ON c.id = p.chapter_id \
             WHERE p.book_id = ?1 AND p.tts_status IN ({}) \
             ORDER BY c.chapter_index, p.paragraph_index",
            PARAGRAPH_COLUMNS, placeholders
        );
        let mut values: Vec<rusqlite::types::Value> = vec![book_id.into()];
        values.extend(statuses.iter().map(|s| rusqlite::types::Value::Text(s.to_string())));

        self.db
            .execute_async(move |conn| Self::query_paragraphs(conn, &sql, values))
            .await
    }

    async fn update_paragraph_tts(&self, paragraph_id: i64, update: TtsUpdate) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                let updated = conn.execute(
                    r#"
                    UPDATE paragraphs SET
                        tts_status = ?1, audio_path = ?2, audio_duration_ms = ?3,
                        word_timings = ?4, tts_error = ?5, updated_at = ?6
                    WHERE id = ?7
                    "#,
                    params![
                        update.status.to_string(),
                        update.audio_path,
                        update.audio_duration_ms,
                        update.word_timings,
                        update.error,
                        now,
                        paragraph_id,
                    ],
                )?;
                if updated == 0 {
                    return Err(anyhow!("Paragraph {} not found", paragraph_id));
                }
                Ok(())
            })
            .await
    }

    async fn book_chapters(&self, book_id: i64) -> Result<Vec<ChapterRecord>> {
        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM chapters WHERE book_id = ?1 ORDER BY chapter_index",
                    CHAPTER_COLUMNS
                ))?;
                let chapters = stmt
                    .query_map([book_id], parse_chapter_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(chapters)
            })
            .await
    }

    async fn refresh_chapter_stats(&self, chapter_id: i64) -> Result<()> {
        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    UPDATE chapters SET
                        paragraph_count = (SELECT COUNT(*) FROM paragraphs WHERE chapter_id = ?1),
                        estimated_duration_ms = (
                            SELECT COALESCE(SUM(estimated_duration_ms), 0) FROM paragraphs WHERE chapter_id = ?1
                        )
                    WHERE id = ?1
                    "#,
                    [chapter_id],
                )?;
                Ok(())
            })
            .await
    }
}
