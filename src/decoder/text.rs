/*!
 * Plain text and Markdown books.
 *
 * Markdown splits chapters at `#` and `##` headings. Plain text splits at
 * heading lines such as `第十二章 ...` or `Chapter 12 ...`. A file without
 * headings is one chapter named after the file.
 */

use encoding_rs::{Encoding, GB18030, UTF_8};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::decoder::{BookDecoder, BookMetadata, DecodedChapter};
use crate::errors::DecodeError;

/// Title of the content before the first Markdown heading
const MARKDOWN_PREFACE_TITLE: &str = "Preface";

/// Title of the content before the first plain-text heading
const TEXT_OPENING_TITLE: &str = "Opening";

/// Shortest paragraph kept on its own, in characters
const MIN_PARAGRAPH_CHARS: usize = 2;

static MARKDOWN_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#{1,2}\s+").expect("valid heading regex"));

static TEXT_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(第[一二三四五六七八九十百千零〇0-9]+[章节卷集部篇回]|chapter\s+(\d+|[ivxlc]+)\b)")
        .expect("valid chapter regex")
});

static BROKEN_DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\.\s*\n\s*(\d+)").expect("valid decimal regex"));

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("valid paragraph regex"));

static REFERENCE_ONLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\(\[（【]\d+[\)\]）】]$").expect("valid reference regex")
});

static SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[。！？.!?]").expect("valid punctuation regex"));

/// Split chapter text into paragraphs.
///
/// Paragraphs are separated by blank lines and whitespace-collapsed. A
/// decimal broken across lines is rejoined first. Fragments that are only a
/// bracketed number, or shorter than four characters without sentence
/// punctuation, are appended to the previous paragraph.
pub fn split_into_paragraphs(text: &str) -> Vec<String> {
    let text = text.replace("\r\n", "\n");
    let text = BROKEN_DECIMAL.replace_all(&text, "$1.$2");

    let mut result: Vec<String> = Vec::new();
    for block in PARAGRAPH_BREAK.split(&text) {
        let cleaned = block.split_whitespace().collect::<Vec<_>>().join(" ");
        if cleaned.is_empty() {
            continue;
        }

        let chars = cleaned.chars().count();
        let fragment = REFERENCE_ONLY.is_match(&cleaned)
            || (chars < 4 && !SENTENCE_END.is_match(&cleaned));

        match result.last_mut() {
            Some(previous) if fragment => {
                previous.push(' ');
                previous.push_str(&cleaned);
            }
            _ if chars >= MIN_PARAGRAPH_CHARS => result.push(cleaned),
            _ => {}
        }
    }
    result
}

/// Read text by its BOM, otherwise as UTF-8, then GB18030 (a superset of GBK)
fn decode_text(bytes: &[u8], path: &Path) -> Result<String, DecodeError> {
    let encoding_error = || DecodeError::Encoding(path.to_path_buf());

    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return encoding
            .decode_without_bom_handling_and_without_replacement(&bytes[bom_len..])
            .map(|text| text.into_owned())
            .ok_or_else(encoding_error);
    }

    // Without a byte order mark, strict UTF-8 first and then the GBK family
    for encoding in [UTF_8, GB18030] {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            if encoding != UTF_8 {
                debug!("Decoded {:?} as {}", path, encoding.name());
            }
            return Ok(text.into_owned());
        }
    }
    Err(encoding_error())
}

/// Decoder for `.txt` and `.md` files
#[derive(Debug, Clone)]
pub struct TextDecoder {
    path: PathBuf,
    content: String,
    /// Chapter titles with the byte range of their body in `content`
    sections: Vec<(String, Range<usize>)>,
}

impl TextDecoder {
    pub fn open(path: &Path) -> Result<Self, DecodeError> {
        let bytes = std::fs::read(path)?;
        let content = decode_text(&bytes, path)?;
        Ok(Self::from_content(path, content))
    }

    /// Decoder over in-memory content; `path` decides Markdown handling and the fallback title
    pub fn from_content(path: &Path, content: String) -> Self {
        let markdown = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("markdown"));

        let mut sections = if markdown {
            Self::scan_sections(&content, MARKDOWN_PREFACE_TITLE, |line| {
                MARKDOWN_HEADING
                    .find(line)
                    .map(|m| line[m.end()..].trim().to_string())
            })
        } else {
            Self::scan_sections(&content, TEXT_OPENING_TITLE, |line| {
                TEXT_HEADING.is_match(line).then(|| line.trim().to_string())
            })
        };

        if sections.is_empty() {
            sections.push((Self::file_title(path), 0..content.len()));
        }

        Self {
            path: path.to_path_buf(),
            content,
            sections,
        }
    }

    fn file_title(path: &Path) -> String {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Untitled".to_string())
    }

    /// Cut `content` at heading lines; empty when no heading is found
    fn scan_sections<F>(content: &str, leading_title: &str, heading: F) -> Vec<(String, Range<usize>)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut sections = Vec::new();
        let mut title = leading_title.to_string();
        let mut body_start = 0;
        let mut found = false;
        let mut offset = 0;

        for line in content.split_inclusive('\n') {
            let line_start = offset;
            offset += line.len();

            if let Some(next_title) = heading(line.trim_end_matches(['\r', '\n'])) {
                found = true;
                if !content[body_start..line_start].trim().is_empty() {
                    sections.push((title, body_start..line_start));
                }
                title = next_title;
                body_start = offset;
            }
        }

        if !found {
            return Vec::new();
        }
        sections.push((title, body_start..content.len()));
        sections
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn chapter_count(&self) -> usize {
        self.sections.len()
    }
}

impl BookDecoder for TextDecoder {
    fn metadata(&self) -> BookMetadata {
        BookMetadata {
            title: Self::file_title(&self.path),
            author: String::new(),
        }
    }

    fn chapters(&self) -> Box<dyn Iterator<Item = Result<DecodedChapter, DecodeError>> + Send + '_> {
        Box::new(self.sections.iter().map(|(title, range)| {
            Ok(DecodedChapter {
                title: title.clone(),
                paragraphs: split_into_paragraphs(&self.content[range.clone()]),
            })
        }))
    }
}
