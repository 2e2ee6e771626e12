/*!
 * Database entity models and DTOs.
 *
 * These structures map directly to database tables and provide
 * type-safe access to persisted data.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::CaptionError;
use crate::text_utils;

/// Synthesis status of a paragraph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtsStatus {
    /// Awaiting synthesis
    Pending,
    /// Claimed by a synthesis worker
    Processing,
    /// Audio written and measured
    Completed,
    /// Synthesis failed, error stored
    Failed,
}

impl fmt::Display for TtsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TtsStatus::Pending => write!(f, "pending"),
            TtsStatus::Processing => write!(f, "processing"),
            TtsStatus::Completed => write!(f, "completed"),
            TtsStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for TtsStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TtsStatus::Pending),
            "processing" => Ok(TtsStatus::Processing),
            "completed" => Ok(TtsStatus::Completed),
            "failed" => Ok(TtsStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid tts status: {}", s)),
        }
    }
}

/// Backend-reported word boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordTiming {
    /// Text fragment
    pub text: String,
    /// Offset from paragraph start in milliseconds
    pub offset_ms: i64,
    /// Duration in milliseconds
    pub duration_ms: i64,
}

/// Book record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookRecord {
    /// Database ID
    pub id: i64,
    pub title: String,
    pub author: String,
    /// Path of the imported source file
    pub source_path: String,
    /// SHA256 of the source file content
    pub source_hash: String,
    pub total_chapters: i64,
    pub total_paragraphs: i64,
    /// Sum of paragraph estimates
    pub estimated_duration_ms: i64,
    /// Completed paragraphs in percent
    pub tts_progress: f64,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
    /// Last update timestamp (ISO 8601)
    pub updated_at: String,
}

impl BookRecord {
    /// Create a new book record (without database ID)
    pub fn new(title: String, author: String, source_path: String, source_hash: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: 0, // Will be assigned by database
            title,
            author,
            source_path,
            source_hash,
            total_chapters: 0,
            total_paragraphs: 0,
            estimated_duration_ms: 0,
            tts_progress: 0.0,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Chapter record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterRecord {
    /// Database ID
    pub id: i64,
    pub book_id: i64,
    /// 1-based position in the book
    pub chapter_index: i64,
    pub title: String,
    pub paragraph_count: i64,
    pub estimated_duration_ms: i64,
}

/// Paragraph record, the unit of synthesis and captioning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParagraphRecord {
    /// Database ID
    pub id: i64,
    pub book_id: i64,
    pub chapter_id: i64,
    /// 1-based position in the chapter
    pub paragraph_index: i64,
    pub content: String,
    pub char_count: i64,
    /// Always derived from `content`
    pub estimated_duration_ms: i64,
    /// Measured after synthesis, authoritative when present
    pub audio_duration_ms: Option<i64>,
    /// Cumulative estimated start within the book
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub tts_status: TtsStatus,
    pub tts_error: Option<String>,
    pub audio_path: Option<String>,
    /// JSON array of `WordTiming`
    pub word_timings: Option<String>,
}

impl ParagraphRecord {
    /// Create a new pending paragraph (without database ID)
    pub fn new(book_id: i64, chapter_id: i64, paragraph_index: i64, content: String) -> Self {
        let char_count = text_utils::char_count(&content) as i64;
        let estimated_duration_ms = text_utils::estimate_duration_ms(&content) as i64;
        Self {
            id: 0, // Will be assigned by database
            book_id,
            chapter_id,
            paragraph_index,
            content,
            char_count,
            estimated_duration_ms,
            audio_duration_ms: None,
            start_time_ms: 0,
            end_time_ms: estimated_duration_ms,
            tts_status: TtsStatus::Pending,
            tts_error: None,
            audio_path: None,
            word_timings: None,
        }
    }

    /// Actual duration when measured, else the estimate
    pub fn resolved_duration_ms(&self) -> i64 {
        self.audio_duration_ms.unwrap_or(self.estimated_duration_ms)
    }

    /// Parse stored word timings; `Ok(None)` when absent or empty
    pub fn parse_word_timings(&self) -> Result<Option<Vec<WordTiming>>, CaptionError> {
        match self.word_timings.as_deref() {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => {
                let timings: Vec<WordTiming> = serde_json::from_str(raw)?;
                Ok(if timings.is_empty() { None } else { Some(timings) })
            }
        }
    }
}

/// Terminal or intermediate synthesis state written for one paragraph
#[derive(Debug, Clone, PartialEq)]
pub struct TtsUpdate {
    pub status: TtsStatus,
    pub audio_path: Option<String>,
    pub audio_duration_ms: Option<i64>,
    pub word_timings: Option<String>,
    pub error: Option<String>,
}

impl TtsUpdate {
    /// Paragraph claimed by a worker
    pub fn processing() -> Self {
        Self {
            status: TtsStatus::Processing,
            audio_path: None,
            audio_duration_ms: None,
            word_timings: None,
            error: None,
        }
    }

    /// Audio written; `audio_path` is `None` for paragraphs with nothing to speak
    pub fn completed(audio_path: Option<String>, duration_ms: i64, word_timings: Option<String>) -> Self {
        Self {
            status: TtsStatus::Completed,
            audio_path,
            audio_duration_ms: Some(duration_ms),
            word_timings,
            error: None,
        }
    }

    /// Synthesis failed with the given message
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: TtsStatus::Failed,
            audio_path: None,
            audio_duration_ms: None,
            word_timings: None,
            error: Some(error.into()),
        }
    }
}

/// Paragraph counts per status for one book
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

impl StatusCounts {
    pub fn total(&self) -> i64 {
        self.pending + self.processing + self.completed + self.failed
    }

    /// Completion percentage
    pub fn progress(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.completed as f64 / total as f64) * 100.0
    }
}

impl fmt::Display for StatusCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "completed {}/{} (pending {}, processing {}, failed {})",
            self.completed,
            self.total(),
            self.pending,
            self.processing,
            self.failed
        )
    }
}
