/*!
 * LRC caption generation.
 *
 * A running cursor starts at zero. Paragraphs with word timings emit one line
 * per timed fragment and advance the cursor by their resolved duration; the
 * rest are split into sentences, each emitted at the cursor, which then moves
 * on by the sentence's character share of the paragraph duration.
 */

use log::warn;

use crate::database::ParagraphRecord;
use crate::text_utils;

/// One timestamped caption line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionLine {
    pub time_ms: i64,
    pub text: String,
}

impl CaptionLine {
    pub fn to_lrc(&self) -> String {
        format!("{}{}", format_timestamp(self.time_ms), self.text)
    }
}

/// `[MM:SS.CC]` for a millisecond offset
pub fn format_timestamp(ms: i64) -> String {
    let ms = ms.max(0);
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let centis = (ms % 1000) / 10;
    format!("[{:02}:{:02}.{:02}]", minutes, seconds, centis)
}

/// Collapse internal whitespace so a fragment stays on one line
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Timed lines for `paragraphs`, in order
pub fn caption_lines(paragraphs: &[ParagraphRecord]) -> Vec<CaptionLine> {
    let mut lines = Vec::new();
    let mut cursor: i64 = 0;

    for paragraph in paragraphs {
        let duration = paragraph.resolved_duration_ms().max(0);

        let timings = match paragraph.parse_word_timings() {
            Ok(timings) => timings,
            Err(e) => {
                warn!(
                    "Paragraph {} has unreadable word timings, using sentence timing: {}",
                    paragraph.id, e
                );
                None
            }
        };

        if let Some(timings) = timings {
            for timing in timings {
                let text = single_line(&timing.text);
                if text.is_empty() {
                    continue;
                }
                lines.push(CaptionLine {
                    time_ms: cursor + timing.offset_ms.max(0),
                    text,
                });
            }
            cursor += duration;
            continue;
        }

        let sentences = text_utils::split_sentences(&paragraph.content);
        let total_chars: i64 = sentences
            .iter()
            .map(|s| text_utils::char_count(s) as i64)
            .sum();
        if total_chars == 0 {
            cursor += duration;
            continue;
        }

        // Each sentence advances the cursor by its own truncated share
        for sentence in sentences {
            let chars = text_utils::char_count(&sentence) as i64;
            let text = single_line(&sentence);
            if !text.is_empty() {
                lines.push(CaptionLine { time_ms: cursor, text });
            }
            cursor += duration * chars / total_chars;
        }
    }

    lines
}

/// Render an LRC document with optional `[ti:]`/`[ar:]` headers
pub fn generate(paragraphs: &[ParagraphRecord], title: &str, author: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    if !title.trim().is_empty() {
        out.push(format!("[ti:{}]", single_line(title)));
    }
    if !author.trim().is_empty() {
        out.push(format!("[ar:{}]", single_line(author)));
    }
    out.extend(caption_lines(paragraphs).iter().map(CaptionLine::to_lrc));

    if out.is_empty() {
        return String::new();
    }
    let mut text = out.join("\n");
    text.push('\n');
    text
}
