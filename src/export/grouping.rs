/*!
 * Chapter to segment grouping.
 *
 * Chapters accumulate into a group until it reaches the minimum duration.
 * A short tail is folded into the previous group when one exists. Chapters
 * are never split and empty chapters are dropped.
 */

use serde::Serialize;

use crate::database::{ChapterRecord, ParagraphRecord};

/// A chapter together with its paragraphs in reading order
#[derive(Debug, Clone)]
pub struct ChapterContent {
    pub chapter: ChapterRecord,
    pub paragraphs: Vec<ParagraphRecord>,
}

impl ChapterContent {
    pub fn duration_ms(&self) -> i64 {
        self.paragraphs.iter().map(|p| p.resolved_duration_ms().max(0)).sum()
    }
}

/// Contiguous chapters merged into one output segment
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportGroup {
    pub chapter_indices: Vec<i64>,
    #[serde(skip)]
    pub paragraphs: Vec<ParagraphRecord>,
    pub duration_ms: i64,
}

impl ExportGroup {
    pub fn is_empty(&self) -> bool {
        self.chapter_indices.is_empty()
    }

    fn push(&mut self, content: ChapterContent) {
        self.duration_ms += content.duration_ms();
        self.chapter_indices.push(content.chapter.chapter_index);
        self.paragraphs.extend(content.paragraphs);
    }

    fn absorb(&mut self, other: ExportGroup) {
        self.chapter_indices.extend(other.chapter_indices);
        self.paragraphs.extend(other.paragraphs);
        self.duration_ms += other.duration_ms;
    }

    /// `chapters<N>` for one chapter, `chapters<first>-<last>` for a span
    pub fn folder_name(&self) -> String {
        match (self.chapter_indices.first(), self.chapter_indices.last()) {
            (Some(first), Some(last)) if first == last => format!("chapters{}", first),
            (Some(first), Some(last)) => format!("chapters{}-{}", first, last),
            _ => "chapters".to_string(),
        }
    }
}

/// Group `chapters` (in reading order) into segments of at least `min_ms`
pub fn group_chapters(chapters: Vec<ChapterContent>, min_ms: i64) -> Vec<ExportGroup> {
    let mut groups: Vec<ExportGroup> = Vec::new();
    let mut current = ExportGroup::default();

    for content in chapters {
        if content.paragraphs.is_empty() {
            continue;
        }
        current.push(content);
        if current.duration_ms >= min_ms {
            groups.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        match groups.last_mut() {
            Some(last) if current.duration_ms < min_ms => last.absorb(current),
            _ => groups.push(current),
        }
    }

    groups
}
